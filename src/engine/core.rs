//! Engine lifecycle: pool construction, health checks, session creation.

use crate::config::{DatabaseConfig, DatabaseKind};
use crate::engine::pool::DbPool;
use crate::engine::session::{Session, SessionInfo, SessionRegistry};
use crate::error::{EngineKitError, EngineResult};
use crate::monitor::{Monitor, NoOpMonitor, PoolStats};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Outcome of a health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    Stopped,
}

/// Result of [`DatabaseEngine::health_check`].
#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    /// Round-trip latency of the probe. Absent when the engine is stopped.
    pub latency_ms: Option<f64>,
    pub error: Option<String>,
    /// When the probe actually ran. Cached replies keep the original value.
    pub checked_at: DateTime<Utc>,
    /// True when this reply was served from the cache.
    pub cached: bool,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

enum EngineState {
    Stopped,
    Starting,
    Started(DbPool),
}

/// One database engine: owns the connection pool and the session registry.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
pub struct DatabaseEngine {
    config: DatabaseConfig,
    monitor: Arc<dyn Monitor>,
    state: RwLock<EngineState>,
    sessions: SessionRegistry,
    health: Mutex<Option<HealthReport>>,
}

impl std::fmt::Debug for DatabaseEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseEngine")
            .field("config", &self.config.masked_url())
            .finish_non_exhaustive()
    }
}

impl DatabaseEngine {
    /// Create a stopped engine with a no-op monitor. The configuration is
    /// validated here; call [`DatabaseEngine::start`] to open the pool.
    pub fn new(config: DatabaseConfig) -> EngineResult<Self> {
        Self::with_monitor(config, Arc::new(NoOpMonitor))
    }

    /// Create a stopped engine reporting to the given monitor.
    pub fn with_monitor(config: DatabaseConfig, monitor: Arc<dyn Monitor>) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            monitor,
            state: RwLock::new(EngineState::Stopped),
            sessions: SessionRegistry::new(),
            health: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub fn kind(&self) -> DatabaseKind {
        self.config.kind
    }

    pub(crate) fn monitor(&self) -> &Arc<dyn Monitor> {
        &self.monitor
    }

    pub async fn is_started(&self) -> bool {
        matches!(&*self.state.read().await, EngineState::Started(_))
    }

    /// Open the connection pool. Idempotent when already started.
    pub async fn start(&self) -> EngineResult<()> {
        {
            let mut state = self.state.write().await;
            match &*state {
                EngineState::Started(_) => {
                    debug!(url = %self.config.masked_url(), "Engine already started");
                    return Ok(());
                }
                EngineState::Starting => {
                    return Err(EngineKitError::Initialization {
                        message: "engine is already starting".into(),
                        source: None,
                    });
                }
                EngineState::Stopped => *state = EngineState::Starting,
            }
        }

        info!(url = %self.config.masked_url(), "Starting engine");
        match DbPool::connect(&self.config).await {
            Ok(pool) => {
                let server_version = pool.server_version().await;
                {
                    let mut state = self.state.write().await;
                    if !matches!(&*state, EngineState::Starting) {
                        // stop() landed while the pool was being opened
                        drop(state);
                        pool.close().await;
                        warn!(url = %self.config.masked_url(), "Engine stopped during start");
                        return Err(EngineKitError::Initialization {
                            message: "engine was stopped while starting".into(),
                            source: None,
                        });
                    }
                    *state = EngineState::Started(pool);
                }
                info!(
                    url = %self.config.masked_url(),
                    server_version = ?server_version,
                    max_connections = self.config.pool.max_connections(),
                    "Engine started"
                );
                Ok(())
            }
            Err(e) => {
                *self.state.write().await = EngineState::Stopped;
                warn!(url = %self.config.masked_url(), error = %e, "Engine start failed");
                Err(e)
            }
        }
    }

    /// Close the pool and clear tracked sessions and the health cache.
    /// Idempotent when already stopped.
    pub async fn stop(&self) {
        let previous = {
            let mut state = self.state.write().await;
            std::mem::replace(&mut *state, EngineState::Stopped)
        };
        if let EngineState::Started(pool) = previous {
            pool.close().await;
            info!(url = %self.config.masked_url(), "Engine stopped");
        }
        self.sessions.clear();
        *self.health.lock().await = None;
    }

    pub(crate) async fn pool(&self, operation: &str) -> EngineResult<DbPool> {
        match &*self.state.read().await {
            EngineState::Started(pool) => Ok(pool.clone()),
            _ => Err(EngineKitError::not_started(operation)),
        }
    }

    /// Begin a new session on a dedicated transaction.
    pub async fn session(&self) -> EngineResult<Session> {
        self.open_session(false).await
    }

    /// Begin a session whose changes are always rolled back.
    pub async fn readonly_session(&self) -> EngineResult<Session> {
        self.open_session(true).await
    }

    async fn open_session(&self, read_only: bool) -> EngineResult<Session> {
        let pool = self.pool("create session").await?;
        let tx = pool.begin().await?;
        let session = Session::new(
            tx,
            pool.kind(),
            read_only,
            self.sessions.clone(),
            Arc::clone(&self.monitor),
        );
        self.monitor
            .record_session_count(self.sessions.count(), pool.kind());
        Ok(session)
    }

    /// Probe connectivity with a `SELECT 1` round trip.
    ///
    /// Results are cached for `health_check_ttl_secs`; a cached reply keeps
    /// the original `checked_at` and sets `cached`.
    pub async fn health_check(&self) -> HealthReport {
        let ttl = self.config.pool.health_check_ttl();
        let mut cache = self.health.lock().await;
        if let Some(entry) = &*cache {
            let age = Utc::now().signed_duration_since(entry.checked_at);
            if age.to_std().is_ok_and(|age| age < ttl) {
                let mut reply = entry.clone();
                reply.cached = true;
                return reply;
            }
        }

        let report = match self.pool("health check").await {
            Err(_) => HealthReport {
                status: HealthStatus::Stopped,
                latency_ms: None,
                error: Some("engine is not started".into()),
                checked_at: Utc::now(),
                cached: false,
            },
            Ok(pool) => {
                let started = Instant::now();
                match pool.ping().await {
                    Ok(()) => HealthReport {
                        status: HealthStatus::Healthy,
                        latency_ms: Some(started.elapsed().as_secs_f64() * 1000.0),
                        error: None,
                        checked_at: Utc::now(),
                        cached: false,
                    },
                    Err(e) => {
                        warn!(error = %e, "Health check failed");
                        self.monitor.record_error(e.kind_label(), pool.kind());
                        HealthReport {
                            status: HealthStatus::Unhealthy,
                            latency_ms: Some(started.elapsed().as_secs_f64() * 1000.0),
                            error: Some(e.to_string()),
                            checked_at: Utc::now(),
                            cached: false,
                        }
                    }
                }
            }
        };

        // A stopped engine has nothing worth caching.
        if report.status != HealthStatus::Stopped {
            *cache = Some(report.clone());
        }
        report
    }

    /// Snapshot of the pool, forwarded to the monitor.
    pub async fn pool_stats(&self) -> EngineResult<PoolStats> {
        let pool = self.pool("collect pool stats").await?;
        let stats = pool.stats(self.config.pool.max_connections());
        self.monitor.record_pool_stats(&stats, pool.kind());
        Ok(stats)
    }

    /// Metadata for all live sessions.
    pub fn active_sessions(&self) -> Vec<SessionInfo> {
        self.sessions.list()
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.count()
    }
}
