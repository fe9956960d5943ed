//! sqlx Engine Kit
//!
//! A convenience layer over sqlx for SQL databases (SQLite, PostgreSQL,
//! MySQL): engine and pool lifecycle, policy-driven units of work (plain,
//! transactional, read-only, retrying), session tracking, pluggable
//! monitoring, and schema-migration helpers.
//!
//! ```ignore
//! use sqlx_engine_kit::{DatabaseConfig, DatabaseEngine, ExecutionPolicy};
//!
//! let engine = DatabaseEngine::new(DatabaseConfig::sqlite("app.db"))?;
//! engine.start().await?;
//!
//! let users = engine
//!     .run(ExecutionPolicy::ReadOnly, |session| {
//!         Box::pin(async move { session.fetch_all("SELECT * FROM users", &[]).await })
//!     })
//!     .await?;
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod migrate;
pub mod monitor;

pub use config::{DatabaseConfig, DatabaseKind, PoolConfig};
pub use engine::{
    DatabaseEngine, EngineManager, ExecutionPolicy, HealthReport, HealthStatus, InitOptions,
    JsonRow, QueryParam, RetryPolicy, Session, SessionInfo, with_readonly_session,
    with_retry_session, with_session, with_transaction,
};
pub use error::{EngineKitError, EngineResult, RetryableKind, TransactionErrorKind};
pub use migrate::{MigrationInfo, MigrationRunner};
pub use monitor::{LogMonitor, Monitor, NoOpMonitor, PoolStats, QueryKind};
