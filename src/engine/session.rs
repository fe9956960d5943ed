//! Sessions and session tracking.
//!
//! A [`Session`] is a short-lived unit of work bound to one database
//! transaction. Sessions are owned by exactly one caller, tracked in the
//! engine's [`SessionRegistry`] for diagnostics, and removed on commit,
//! rollback, or drop. Dropping an unfinished session logs a warning; sqlx
//! rolls the underlying transaction back.

use crate::config::DatabaseKind;
use crate::engine::params::{
    QueryParam, bind_mysql_param, bind_postgres_param, bind_sqlite_param,
};
use crate::engine::row::RowToJson;
use crate::error::{EngineKitError, EngineResult};
use crate::monitor::Monitor;
use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use sqlx::{MySql, Postgres, Sqlite, Transaction};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// JSON row map returned by fetch operations.
pub type JsonRow = serde_json::Map<String, serde_json::Value>;

/// Database-specific transaction wrapper.
pub(crate) enum DbTransaction {
    MySql(Transaction<'static, MySql>),
    Postgres(Transaction<'static, Postgres>),
    Sqlite(Transaction<'static, Sqlite>),
}

impl DbTransaction {
    pub(crate) async fn commit(self) -> EngineResult<()> {
        match self {
            DbTransaction::MySql(tx) => tx.commit().await.map_err(EngineKitError::from),
            DbTransaction::Postgres(tx) => tx.commit().await.map_err(EngineKitError::from),
            DbTransaction::Sqlite(tx) => tx.commit().await.map_err(EngineKitError::from),
        }
    }

    pub(crate) async fn rollback(self) -> EngineResult<()> {
        match self {
            DbTransaction::MySql(tx) => tx.rollback().await.map_err(EngineKitError::from),
            DbTransaction::Postgres(tx) => tx.rollback().await.map_err(EngineKitError::from),
            DbTransaction::Sqlite(tx) => tx.rollback().await.map_err(EngineKitError::from),
        }
    }
}

/// Metadata about a live session.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SessionInfo {
    pub id: Uuid,
    pub kind: DatabaseKind,
    pub read_only: bool,
    pub started_at: DateTime<Utc>,
}

/// Tracks live sessions for diagnostics. Insert and remove only, so a plain
/// sync mutex is enough.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<Mutex<HashMap<Uuid, SessionInfo>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&self, info: SessionInfo) {
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.insert(info.id, info);
        }
    }

    pub(crate) fn deregister(&self, id: &Uuid) -> Option<SessionInfo> {
        self.sessions.lock().ok()?.remove(id)
    }

    /// Number of live sessions.
    pub fn count(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// Snapshot of all live sessions.
    pub fn list(&self) -> Vec<SessionInfo> {
        self.sessions
            .lock()
            .map(|s| s.values().cloned().collect())
            .unwrap_or_default()
    }

    pub(crate) fn clear(&self) {
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.clear();
        }
    }
}

/// A unit of work bound to one database transaction.
pub struct Session {
    info: SessionInfo,
    tx: Option<DbTransaction>,
    registry: SessionRegistry,
    monitor: Arc<dyn Monitor>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.info.id)
            .field("kind", &self.info.kind)
            .field("read_only", &self.info.read_only)
            .field("finished", &self.tx.is_none())
            .finish()
    }
}

impl Session {
    pub(crate) fn new(
        tx: DbTransaction,
        kind: DatabaseKind,
        read_only: bool,
        registry: SessionRegistry,
        monitor: Arc<dyn Monitor>,
    ) -> Self {
        let info = SessionInfo {
            id: Uuid::new_v4(),
            kind,
            read_only,
            started_at: Utc::now(),
        };
        registry.register(info.clone());
        debug!(
            session_id = %info.id,
            kind = %kind,
            read_only,
            "Session opened"
        );
        Self {
            info,
            tx: Some(tx),
            registry,
            monitor,
        }
    }

    pub fn id(&self) -> Uuid {
        self.info.id
    }

    pub fn kind(&self) -> DatabaseKind {
        self.info.kind
    }

    pub fn is_read_only(&self) -> bool {
        self.info.read_only
    }

    pub fn info(&self) -> &SessionInfo {
        &self.info
    }

    fn active_tx(&mut self) -> EngineResult<&mut DbTransaction> {
        self.tx
            .as_mut()
            .ok_or_else(|| EngineKitError::session("session is already finished"))
    }

    fn observe(&self, sql: &str, started: Instant, result: &EngineResult<impl Sized>) {
        let success = result.is_ok();
        self.monitor
            .record_query_duration(sql, started.elapsed(), success, self.info.kind);
        if let Err(e) = result {
            self.monitor.record_error(e.kind_label(), self.info.kind);
        }
    }

    /// Execute a statement and return the number of affected rows.
    pub async fn execute(&mut self, sql: &str, params: &[QueryParam]) -> EngineResult<u64> {
        let started = Instant::now();
        let result = self.execute_inner(sql, params).await;
        self.observe(sql, started, &result);
        result
    }

    async fn execute_inner(&mut self, sql: &str, params: &[QueryParam]) -> EngineResult<u64> {
        let tx = self.active_tx()?;
        let rows_affected = match tx {
            DbTransaction::MySql(tx) => {
                let mut query = sqlx::query(sql);
                for param in params {
                    query = bind_mysql_param(query, param);
                }
                query.execute(&mut **tx).await?.rows_affected()
            }
            DbTransaction::Postgres(tx) => {
                let mut query = sqlx::query(sql);
                for param in params {
                    query = bind_postgres_param(query, param);
                }
                query.execute(&mut **tx).await?.rows_affected()
            }
            DbTransaction::Sqlite(tx) => {
                let mut query = sqlx::query(sql);
                for param in params {
                    query = bind_sqlite_param(query, param);
                }
                query.execute(&mut **tx).await?.rows_affected()
            }
        };
        debug!(
            session_id = %self.info.id,
            rows_affected,
            "Statement executed"
        );
        Ok(rows_affected)
    }

    /// Run a query and return all rows as JSON maps.
    pub async fn fetch_all(&mut self, sql: &str, params: &[QueryParam]) -> EngineResult<Vec<JsonRow>> {
        let started = Instant::now();
        let result = self.fetch_all_inner(sql, params).await;
        self.observe(sql, started, &result);
        result
    }

    async fn fetch_all_inner(
        &mut self,
        sql: &str,
        params: &[QueryParam],
    ) -> EngineResult<Vec<JsonRow>> {
        let tx = self.active_tx()?;
        let rows: Vec<JsonRow> = match tx {
            DbTransaction::MySql(tx) => {
                let mut query = sqlx::query(sql);
                for param in params {
                    query = bind_mysql_param(query, param);
                }
                let rows: Vec<sqlx::mysql::MySqlRow> =
                    query.fetch(&mut **tx).try_collect().await?;
                rows.iter().map(|r| r.to_json_map()).collect()
            }
            DbTransaction::Postgres(tx) => {
                let mut query = sqlx::query(sql);
                for param in params {
                    query = bind_postgres_param(query, param);
                }
                let rows: Vec<sqlx::postgres::PgRow> =
                    query.fetch(&mut **tx).try_collect().await?;
                rows.iter().map(|r| r.to_json_map()).collect()
            }
            DbTransaction::Sqlite(tx) => {
                let mut query = sqlx::query(sql);
                for param in params {
                    query = bind_sqlite_param(query, param);
                }
                let rows: Vec<sqlx::sqlite::SqliteRow> =
                    query.fetch(&mut **tx).try_collect().await?;
                rows.iter().map(|r| r.to_json_map()).collect()
            }
        };
        debug!(
            session_id = %self.info.id,
            row_count = rows.len(),
            "Query fetched"
        );
        Ok(rows)
    }

    /// Run a query expected to return exactly one row.
    pub async fn fetch_one(&mut self, sql: &str, params: &[QueryParam]) -> EngineResult<JsonRow> {
        let mut rows = self.fetch_all(sql, params).await?;
        match rows.len() {
            1 => Ok(rows.remove(0)),
            0 => Err(EngineKitError::query("query returned no rows")),
            n => Err(EngineKitError::query(format!(
                "query returned {n} rows, expected exactly one"
            ))),
        }
    }

    /// Run a query expected to return at most one row.
    pub async fn fetch_optional(
        &mut self,
        sql: &str,
        params: &[QueryParam],
    ) -> EngineResult<Option<JsonRow>> {
        let mut rows = self.fetch_all(sql, params).await?;
        match rows.len() {
            0 => Ok(None),
            1 => Ok(Some(rows.remove(0))),
            n => Err(EngineKitError::query(format!(
                "query returned {n} rows, expected at most one"
            ))),
        }
    }

    /// Commit the session. Errors on read-only sessions; their transaction
    /// is rolled back instead.
    pub async fn commit(mut self) -> EngineResult<()> {
        let tx = self.tx.take().ok_or_else(|| {
            EngineKitError::session("session is already finished")
        })?;
        self.registry.deregister(&self.info.id);

        if self.info.read_only {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(
                    session_id = %self.info.id,
                    error = %rollback_err,
                    "Rollback of read-only session failed"
                );
            }
            return Err(EngineKitError::session(
                "cannot commit a read-only session",
            ));
        }

        tx.commit().await?;
        info!(session_id = %self.info.id, "Session committed");
        Ok(())
    }

    /// Roll the session back, discarding its changes.
    pub async fn rollback(mut self) -> EngineResult<()> {
        let tx = self.tx.take().ok_or_else(|| {
            EngineKitError::session("session is already finished")
        })?;
        self.registry.deregister(&self.info.id);
        tx.rollback().await?;
        debug!(session_id = %self.info.id, "Session rolled back");
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // An unfinished transaction rolls back when sqlx drops it; we only
        // need to deregister and flag the leak.
        if self.tx.is_some() {
            self.registry.deregister(&self.info.id);
            warn!(
                session_id = %self.info.id,
                "Session dropped without commit or rollback"
            );
        }
    }
}
