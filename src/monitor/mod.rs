//! Pluggable monitoring.
//!
//! The engine reports pool, session, and query activity through the
//! [`Monitor`] trait. [`NoOpMonitor`] is the default and discards
//! everything; [`LogMonitor`] emits structured tracing events. Applications
//! wire their own metrics backend by implementing the three primitive
//! methods; the `record_*` methods have default implementations built on
//! top of them.

mod log;
mod noop;

pub use log::LogMonitor;
pub use noop::NoOpMonitor;

use crate::config::DatabaseKind;
use std::time::Duration;

/// Point-in-time snapshot of a connection pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct PoolStats {
    /// Connections currently open.
    pub size: u32,
    /// Open connections sitting idle.
    pub idle: u32,
    /// Open connections checked out.
    pub active: u32,
    /// Hard connection cap.
    pub max: u32,
}

/// Statement categories used to label query metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryKind {
    Select,
    Insert,
    Update,
    Delete,
    Ddl,
    Other,
}

impl QueryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Ddl => "ddl",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for QueryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a SQL statement by its leading keyword. Only the category is
/// ever reported, never the statement text.
pub fn query_kind(sql: &str) -> QueryKind {
    let first = sql
        .trim_start()
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase();
    match first.as_str() {
        "SELECT" | "WITH" => QueryKind::Select,
        "INSERT" | "REPLACE" => QueryKind::Insert,
        "UPDATE" => QueryKind::Update,
        "DELETE" => QueryKind::Delete,
        "CREATE" | "ALTER" | "DROP" | "TRUNCATE" => QueryKind::Ddl,
        _ => QueryKind::Other,
    }
}

/// Sink for engine metrics.
///
/// Implementations must be cheap and non-blocking; these methods are called
/// on the query path.
pub trait Monitor: Send + Sync {
    /// Add `value` to a counter.
    fn increment(&self, name: &str, value: u64, labels: &[(&str, &str)]);

    /// Set a gauge to `value`.
    fn set_gauge(&self, name: &str, value: f64, labels: &[(&str, &str)]);

    /// Record one observation of a distribution.
    fn observe_histogram(&self, name: &str, value: f64, labels: &[(&str, &str)]);

    /// Record the duration and outcome of one query.
    fn record_query_duration(
        &self,
        sql: &str,
        duration: Duration,
        success: bool,
        kind: DatabaseKind,
    ) {
        let query = query_kind(sql);
        let labels = [
            ("query_kind", query.as_str()),
            ("database", kind.scheme()),
            ("status", if success { "ok" } else { "error" }),
        ];
        self.increment("db_queries_total", 1, &labels);
        self.observe_histogram("db_query_duration_seconds", duration.as_secs_f64(), &labels);
    }

    /// Record a pool snapshot.
    fn record_pool_stats(&self, stats: &PoolStats, kind: DatabaseKind) {
        let labels = [("database", kind.scheme())];
        self.set_gauge("db_pool_size", f64::from(stats.size), &labels);
        self.set_gauge("db_pool_idle", f64::from(stats.idle), &labels);
        self.set_gauge("db_pool_active", f64::from(stats.active), &labels);
        self.set_gauge("db_pool_max", f64::from(stats.max), &labels);
    }

    /// Record the number of live tracked sessions.
    fn record_session_count(&self, count: usize, kind: DatabaseKind) {
        self.set_gauge(
            "db_sessions_active",
            count as f64,
            &[("database", kind.scheme())],
        );
    }

    /// Record one engine error by category label.
    fn record_error(&self, category: &str, kind: DatabaseKind) {
        self.increment(
            "db_errors_total",
            1,
            &[("category", category), ("database", kind.scheme())],
        );
    }
}
