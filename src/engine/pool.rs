//! Database-specific connection pools.
//!
//! [`DbPool`] wraps the concrete sqlx pool types (MySqlPool, PgPool,
//! SqlitePool) to keep full type support instead of going through AnyPool.

use crate::config::{DatabaseConfig, DatabaseKind};
use crate::engine::session::DbTransaction;
use crate::error::{EngineKitError, EngineResult};
use crate::monitor::PoolStats;
use sqlx::{
    MySqlPool, PgPool, SqlitePool, mysql::MySqlConnectOptions, mysql::MySqlPoolOptions,
    postgres::PgPoolOptions, sqlite::SqliteConnectOptions, sqlite::SqlitePoolOptions,
};
use std::str::FromStr;
use tracing::{debug, warn};

/// Database-specific connection pool.
#[derive(Debug, Clone)]
pub(crate) enum DbPool {
    MySql(MySqlPool),
    Postgres(PgPool),
    Sqlite(SqlitePool),
}

impl DbPool {
    /// Build a pool from the configuration. Failures wrap the driver error
    /// in an `Initialization` variant.
    pub(crate) async fn connect(config: &DatabaseConfig) -> EngineResult<Self> {
        let url = config.connection_url()?;
        let pool_cfg = &config.pool;
        let init_err = |e: sqlx::Error| {
            EngineKitError::initialization(
                format!("failed to connect to {}", config.masked_url()),
                e,
            )
        };

        match config.kind {
            DatabaseKind::MySql => {
                let options = MySqlConnectOptions::from_str(&url)
                    .map_err(init_err)?
                    .charset("utf8mb4");
                let pool = MySqlPoolOptions::new()
                    .max_connections(pool_cfg.max_connections())
                    .acquire_timeout(pool_cfg.acquire_timeout())
                    .max_lifetime(pool_cfg.max_lifetime())
                    .test_before_acquire(pool_cfg.test_before_acquire)
                    .connect_with(options)
                    .await
                    .map_err(init_err)?;
                Ok(DbPool::MySql(pool))
            }
            DatabaseKind::Postgres => {
                let pool = PgPoolOptions::new()
                    .max_connections(pool_cfg.max_connections())
                    .acquire_timeout(pool_cfg.acquire_timeout())
                    .max_lifetime(pool_cfg.max_lifetime())
                    .test_before_acquire(pool_cfg.test_before_acquire)
                    .connect(&url)
                    .await
                    .map_err(init_err)?;
                Ok(DbPool::Postgres(pool))
            }
            DatabaseKind::Sqlite => {
                let options = SqliteConnectOptions::from_str(&url)
                    .map_err(init_err)?
                    .create_if_missing(true);
                let pool = SqlitePoolOptions::new()
                    .max_connections(pool_cfg.max_connections())
                    .acquire_timeout(pool_cfg.acquire_timeout())
                    .max_lifetime(pool_cfg.max_lifetime())
                    .test_before_acquire(pool_cfg.test_before_acquire)
                    .connect_with(options)
                    .await
                    .map_err(init_err)?;
                Ok(DbPool::Sqlite(pool))
            }
        }
    }

    pub(crate) fn kind(&self) -> DatabaseKind {
        match self {
            DbPool::MySql(_) => DatabaseKind::MySql,
            DbPool::Postgres(_) => DatabaseKind::Postgres,
            DbPool::Sqlite(_) => DatabaseKind::Sqlite,
        }
    }

    pub(crate) async fn close(&self) {
        match self {
            DbPool::MySql(pool) => pool.close().await,
            DbPool::Postgres(pool) => pool.close().await,
            DbPool::Sqlite(pool) => pool.close().await,
        }
    }

    /// Begin a transaction on a dedicated connection.
    pub(crate) async fn begin(&self) -> EngineResult<DbTransaction> {
        match self {
            DbPool::MySql(pool) => Ok(DbTransaction::MySql(pool.begin().await?)),
            DbPool::Postgres(pool) => Ok(DbTransaction::Postgres(pool.begin().await?)),
            DbPool::Sqlite(pool) => Ok(DbTransaction::Sqlite(pool.begin().await?)),
        }
    }

    /// One `SELECT 1` round trip.
    pub(crate) async fn ping(&self) -> EngineResult<()> {
        match self {
            DbPool::MySql(pool) => {
                sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await?;
            }
            DbPool::Postgres(pool) => {
                sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(pool).await?;
            }
            DbPool::Sqlite(pool) => {
                sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await?;
            }
        }
        Ok(())
    }

    /// Point-in-time pool snapshot. `max` comes from the configured cap.
    pub(crate) fn stats(&self, max: u32) -> PoolStats {
        let (size, idle) = match self {
            DbPool::MySql(pool) => (pool.size(), pool.num_idle()),
            DbPool::Postgres(pool) => (pool.size(), pool.num_idle()),
            DbPool::Sqlite(pool) => (pool.size(), pool.num_idle()),
        };
        let idle = u32::try_from(idle).unwrap_or(u32::MAX);
        PoolStats {
            size,
            idle,
            active: size.saturating_sub(idle),
            max,
        }
    }

    /// Server version string, best effort.
    pub(crate) async fn server_version(&self) -> Option<String> {
        let query = match self {
            DbPool::Sqlite(_) => "SELECT sqlite_version()",
            _ => "SELECT version()",
        };
        let result = match self {
            DbPool::MySql(pool) => {
                sqlx::query_scalar::<_, String>(query).fetch_one(pool).await
            }
            DbPool::Postgres(pool) => {
                sqlx::query_scalar::<_, String>(query).fetch_one(pool).await
            }
            DbPool::Sqlite(pool) => {
                sqlx::query_scalar::<_, String>(query).fetch_one(pool).await
            }
        };
        match result {
            Ok(version) => {
                debug!(version = %version, "Got server version");
                Some(version)
            }
            Err(e) => {
                warn!(error = %e, "Failed to get server version");
                None
            }
        }
    }
}
