//! Engine manager: construction, the process-wide singleton, and lifecycle
//! orchestration on top of [`DatabaseEngine`].
//!
//! The manager can be constructed directly and passed around, or obtained
//! through [`EngineManager::global`] for applications that want one shared
//! engine per process.

use crate::config::DatabaseConfig;
use crate::engine::core::DatabaseEngine;
use crate::engine::session::Session;
use crate::engine::unit_of_work::ExecutionPolicy;
use crate::error::{EngineKitError, EngineResult};
use crate::monitor::{Monitor, NoOpMonitor};
use futures_util::future::BoxFuture;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Options for [`EngineManager::initialize`].
pub struct InitOptions {
    /// Start the engine immediately. Defaults to true.
    pub auto_start: bool,
    /// Replace an existing engine instead of failing with
    /// `AlreadyInitialized`.
    pub force: bool,
    /// Monitor for the new engine. Defaults to [`NoOpMonitor`].
    pub monitor: Option<Arc<dyn Monitor>>,
}

impl Default for InitOptions {
    fn default() -> Self {
        Self {
            auto_start: true,
            force: false,
            monitor: None,
        }
    }
}

impl std::fmt::Debug for InitOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitOptions")
            .field("auto_start", &self.auto_start)
            .field("force", &self.force)
            .field("has_monitor", &self.monitor.is_some())
            .finish()
    }
}

impl InitOptions {
    pub fn with_auto_start(mut self, auto_start: bool) -> Self {
        self.auto_start = auto_start;
        self
    }

    pub fn with_force(mut self) -> Self {
        self.force = true;
        self
    }

    pub fn with_monitor(mut self, monitor: Arc<dyn Monitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }
}

/// Owns at most one [`DatabaseEngine`] and controls its lifecycle.
#[derive(Debug, Default)]
pub struct EngineManager {
    engine: RwLock<Option<Arc<DatabaseEngine>>>,
    resetting: AtomicBool,
}

static GLOBAL: OnceLock<EngineManager> = OnceLock::new();

impl EngineManager {
    /// Create an empty manager for dependency injection.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide manager instance.
    pub fn global() -> &'static EngineManager {
        GLOBAL.get_or_init(EngineManager::new)
    }

    /// Build an engine from the configuration and install it.
    ///
    /// Fails with `AlreadyInitialized` when an engine is already installed,
    /// unless `options.force` is set, in which case the previous engine is
    /// stopped and replaced. With `auto_start` (the default) the engine is
    /// started before being installed; a start failure leaves the manager
    /// uninitialized.
    pub async fn initialize(
        &self,
        config: DatabaseConfig,
        options: InitOptions,
    ) -> EngineResult<Arc<DatabaseEngine>> {
        let mut slot = self.engine.write().await;
        if slot.is_some() && !options.force {
            return Err(EngineKitError::AlreadyInitialized);
        }
        if let Some(previous) = slot.take() {
            info!(url = %previous.config().masked_url(), "Replacing engine");
            previous.stop().await;
        }

        let monitor = options
            .monitor
            .unwrap_or_else(|| Arc::new(NoOpMonitor));
        let engine = Arc::new(DatabaseEngine::with_monitor(config, monitor)?);
        if options.auto_start {
            engine.start().await?;
        }
        *slot = Some(Arc::clone(&engine));
        info!(url = %engine.config().masked_url(), "Manager initialized");
        Ok(engine)
    }

    pub async fn is_initialized(&self) -> bool {
        self.engine.read().await.is_some()
    }

    /// The managed engine.
    pub async fn engine(&self) -> EngineResult<Arc<DatabaseEngine>> {
        self.engine
            .read()
            .await
            .clone()
            .ok_or_else(|| EngineKitError::not_initialized("call initialize() first"))
    }

    /// Stop the managed engine without removing it. Idempotent; a later
    /// `engine().start()` brings it back.
    pub async fn stop(&self) {
        if let Some(engine) = self.engine.read().await.clone() {
            engine.stop().await;
        }
    }

    /// Stop and remove the managed engine. Idempotent.
    pub async fn reset(&self) -> EngineResult<()> {
        if self.resetting.swap(true, Ordering::SeqCst) {
            return Err(EngineKitError::Reset {
                message: "reset already in progress".into(),
            });
        }
        let engine = self.engine.write().await.take();
        if let Some(engine) = engine {
            engine.stop().await;
            info!("Manager reset");
        } else {
            debug!("Manager reset with no engine installed");
        }
        self.resetting.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Replace the configuration, keeping the current monitor. The old
    /// engine is stopped; the new one starts when `restart` is set.
    pub async fn reload(
        &self,
        config: DatabaseConfig,
        restart: bool,
    ) -> EngineResult<Arc<DatabaseEngine>> {
        let mut slot = self.engine.write().await;
        let monitor = slot
            .as_ref()
            .map(|e| Arc::clone(e.monitor()))
            .unwrap_or_else(|| Arc::new(NoOpMonitor));
        if let Some(previous) = slot.take() {
            previous.stop().await;
        }

        let engine = Arc::new(DatabaseEngine::with_monitor(config, monitor)?);
        if restart {
            engine.start().await?;
        }
        *slot = Some(Arc::clone(&engine));
        info!(url = %engine.config().masked_url(), restart, "Configuration reloaded");
        Ok(engine)
    }

    /// Run a unit of work on the managed engine.
    pub async fn run<T, F>(&self, policy: ExecutionPolicy, work: F) -> EngineResult<T>
    where
        T: Send,
        F: for<'s> FnMut(&'s mut Session) -> BoxFuture<'s, EngineResult<T>> + Send,
    {
        let engine = self.engine().await?;
        engine.run(policy, work).await
    }
}
