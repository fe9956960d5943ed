//! Schema migration helpers on top of sqlx's migrator.
//!
//! [`MigrationRunner`] applies and reverts migrations through a started
//! engine's pool. Migration files follow sqlx conventions
//! (`<VERSION>_<DESCRIPTION>.sql`, optional `.up.sql`/`.down.sql` pairs);
//! there is no diffing or autogeneration here.

use crate::engine::DatabaseEngine;
use crate::engine::pool::DbPool;
use crate::error::{EngineKitError, EngineResult};
use sqlx::migrate::{MigrationType, Migrator};
use std::path::Path;
use tracing::info;

/// One local migration, as read from the source directory.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct MigrationInfo {
    pub version: i64,
    pub description: String,
}

/// Applies sqlx migrations through a [`DatabaseEngine`].
#[derive(Debug)]
pub struct MigrationRunner {
    migrator: Migrator,
}

impl MigrationRunner {
    /// Wrap an existing migrator, typically from the `sqlx::migrate!` macro.
    pub fn new(migrator: Migrator) -> Self {
        Self { migrator }
    }

    /// Load migrations from a directory at runtime.
    pub async fn from_path(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let migrator = Migrator::new(path).await.map_err(|e| {
            EngineKitError::Migration {
                message: format!("failed to load migrations from {}: {e}", path.display()),
                source: Some(Box::new(e)),
            }
        })?;
        Ok(Self { migrator })
    }

    /// Apply all pending migrations. The engine must be started.
    pub async fn run(&self, engine: &DatabaseEngine) -> EngineResult<()> {
        let pool = engine.pool("run migrations").await?;
        match &pool {
            DbPool::MySql(pool) => self.migrator.run(pool).await?,
            DbPool::Postgres(pool) => self.migrator.run(pool).await?,
            DbPool::Sqlite(pool) => self.migrator.run(pool).await?,
        }
        info!(
            head = ?self.head_version(),
            "Migrations applied"
        );
        Ok(())
    }

    /// Revert migrations down to (and keeping) `target`. Only reversible
    /// migrations can be undone.
    pub async fn undo(&self, engine: &DatabaseEngine, target: i64) -> EngineResult<()> {
        let pool = engine.pool("revert migrations").await?;
        match &pool {
            DbPool::MySql(pool) => self.migrator.undo(pool, target).await?,
            DbPool::Postgres(pool) => self.migrator.undo(pool, target).await?,
            DbPool::Sqlite(pool) => self.migrator.undo(pool, target).await?,
        }
        info!(target, "Migrations reverted");
        Ok(())
    }

    /// Local migrations, in version order. Down halves of reversible pairs
    /// are not listed.
    pub fn migrations(&self) -> Vec<MigrationInfo> {
        self.migrator
            .iter()
            .filter(|m| !matches!(m.migration_type, MigrationType::ReversibleDown))
            .map(|m| MigrationInfo {
                version: m.version,
                description: m.description.to_string(),
            })
            .collect()
    }

    /// Newest local migration version, `None` when the source is empty.
    pub fn head_version(&self) -> Option<i64> {
        self.migrations().last().map(|m| m.version)
    }

    /// Newest successfully applied version, read from the `_sqlx_migrations`
    /// table. `None` when no migration has run (the table may not exist).
    pub async fn applied_version(&self, engine: &DatabaseEngine) -> EngineResult<Option<i64>> {
        let pool = engine.pool("read applied migration version").await?;

        let table_exists: i64 = match &pool {
            DbPool::MySql(pool) => {
                sqlx::query_scalar(
                    "SELECT COUNT(*) FROM information_schema.tables \
                     WHERE table_name = '_sqlx_migrations' AND table_schema = DATABASE()",
                )
                .fetch_one(pool)
                .await?
            }
            DbPool::Postgres(pool) => {
                sqlx::query_scalar(
                    "SELECT COUNT(*) FROM information_schema.tables \
                     WHERE table_name = '_sqlx_migrations'",
                )
                .fetch_one(pool)
                .await?
            }
            DbPool::Sqlite(pool) => {
                sqlx::query_scalar(
                    "SELECT COUNT(*) FROM sqlite_master \
                     WHERE type = 'table' AND name = '_sqlx_migrations'",
                )
                .fetch_one(pool)
                .await?
            }
        };
        if table_exists == 0 {
            return Ok(None);
        }

        let version: Option<i64> = match &pool {
            DbPool::MySql(pool) => {
                sqlx::query_scalar(
                    "SELECT MAX(version) FROM _sqlx_migrations WHERE success = TRUE",
                )
                .fetch_one(pool)
                .await?
            }
            DbPool::Postgres(pool) => {
                sqlx::query_scalar(
                    "SELECT MAX(version) FROM _sqlx_migrations WHERE success = TRUE",
                )
                .fetch_one(pool)
                .await?
            }
            DbPool::Sqlite(pool) => {
                sqlx::query_scalar(
                    "SELECT MAX(version) FROM _sqlx_migrations WHERE success = 1",
                )
                .fetch_one(pool)
                .await?
            }
        };
        Ok(version)
    }
}
