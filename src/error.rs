//! Error types for sqlx-engine-kit.
//!
//! All errors funnel into [`EngineKitError`], defined with `thiserror`. Each
//! variant carries a human-readable message plus variant-specific context; the
//! originating sqlx error is preserved as the `source` where one exists.
//! [`EngineKitError::context`] exposes the structured fields as a JSON map for
//! logging and diagnostics.

use serde_json::{Map, Value, json};
use thiserror::Error;

/// Result type alias used throughout the crate.
pub type EngineResult<T> = Result<T, EngineKitError>;

/// Subtype flag for transaction failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionErrorKind {
    /// Deadlock or serialization failure (SQLSTATE 40001/40P01, MySQL 1213).
    Deadlock,
    /// Lock wait timeout (MySQL 1205, PostgreSQL 55P03).
    Timeout,
    /// Any other transaction failure.
    Other,
}

impl TransactionErrorKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::Deadlock => "deadlock",
            Self::Timeout => "timeout",
            Self::Other => "other",
        }
    }
}

/// Error classes a retry policy may treat as transient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryableKind {
    Deadlock,
    Timeout,
    Connection,
    Pool,
}

#[derive(Error, Debug)]
pub enum EngineKitError {
    #[error("Invalid configuration: {message}")]
    Configuration {
        message: String,
        /// Field that failed validation, when known.
        field: Option<String>,
    },

    #[error("Connection failed: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<Box<sqlx::Error>>,
    },

    #[error("Query failed: {message}")]
    Query {
        message: String,
        /// e.g. "42P01" for undefined table
        sql_state: Option<String>,
        #[source]
        source: Option<Box<sqlx::Error>>,
    },

    #[error("Transaction failed: {message}")]
    Transaction {
        message: String,
        kind: TransactionErrorKind,
        #[source]
        source: Option<Box<sqlx::Error>>,
    },

    #[error("Connection pool error: {message}")]
    Pool {
        message: String,
        #[source]
        source: Option<Box<sqlx::Error>>,
    },

    #[error("Health check failed: {message}")]
    Health { message: String },

    #[error("Engine not started: cannot {operation}")]
    NotStarted { operation: String },

    #[error("Engine initialization failed: {message}")]
    Initialization {
        message: String,
        #[source]
        source: Option<Box<sqlx::Error>>,
    },

    #[error("Manager not initialized: {message}")]
    NotInitialized { message: String },

    #[error("Manager already initialized; use force to reinitialize")]
    AlreadyInitialized,

    #[error("Manager reset failed: {message}")]
    Reset { message: String },

    #[error("Session error: {message}")]
    Session { message: String },

    #[error("Migration failed: {message}")]
    Migration {
        message: String,
        #[source]
        source: Option<Box<sqlx::migrate::MigrateError>>,
    },

    #[error("Retries exhausted after {attempts} attempts")]
    RetryExhausted {
        attempts: u32,
        #[source]
        last_error: Box<EngineKitError>,
    },
}

impl EngineKitError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            field: None,
        }
    }

    /// Create a configuration error pointing at a specific field.
    pub fn configuration_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a connection error without an underlying cause.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            source: None,
        }
    }

    /// Create a query error.
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
            sql_state: None,
            source: None,
        }
    }

    /// Create a transaction error with the given subtype.
    pub fn transaction(message: impl Into<String>, kind: TransactionErrorKind) -> Self {
        Self::Transaction {
            message: message.into(),
            kind,
            source: None,
        }
    }

    /// Create a health-check error.
    pub fn health(message: impl Into<String>) -> Self {
        Self::Health {
            message: message.into(),
        }
    }

    /// Create an engine-not-started error for the given operation.
    pub fn not_started(operation: impl Into<String>) -> Self {
        Self::NotStarted {
            operation: operation.into(),
        }
    }

    /// Create an initialization error wrapping a driver failure.
    pub fn initialization(message: impl Into<String>, source: sqlx::Error) -> Self {
        Self::Initialization {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a manager-not-initialized error.
    pub fn not_initialized(message: impl Into<String>) -> Self {
        Self::NotInitialized {
            message: message.into(),
        }
    }

    /// Create a session-usage error.
    pub fn session(message: impl Into<String>) -> Self {
        Self::Session {
            message: message.into(),
        }
    }

    /// Create a migration error without an underlying cause.
    pub fn migration(message: impl Into<String>) -> Self {
        Self::Migration {
            message: message.into(),
            source: None,
        }
    }

    /// Stable label for this error class, used as a metric dimension.
    pub fn kind_label(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration",
            Self::Connection { .. } => "connection",
            Self::Query { .. } => "query",
            Self::Transaction { .. } => "transaction",
            Self::Pool { .. } => "pool",
            Self::Health { .. } => "health",
            Self::NotStarted { .. } => "not_started",
            Self::Initialization { .. } => "initialization",
            Self::NotInitialized { .. } => "not_initialized",
            Self::AlreadyInitialized => "already_initialized",
            Self::Reset { .. } => "reset",
            Self::Session { .. } => "session",
            Self::Migration { .. } => "migration",
            Self::RetryExhausted { .. } => "retry_exhausted",
        }
    }

    /// Structured context for this error as a JSON map.
    pub fn context(&self) -> Map<String, Value> {
        let mut ctx = Map::new();
        ctx.insert("kind".into(), json!(self.kind_label()));
        match self {
            Self::Configuration { field, .. } => {
                if let Some(field) = field {
                    ctx.insert("field".into(), json!(field));
                }
            }
            Self::Query { sql_state, .. } => {
                if let Some(state) = sql_state {
                    ctx.insert("sql_state".into(), json!(state));
                }
            }
            Self::Transaction { kind, .. } => {
                ctx.insert("transaction_kind".into(), json!(kind.as_str()));
            }
            Self::NotStarted { operation } => {
                ctx.insert("operation".into(), json!(operation));
            }
            Self::RetryExhausted {
                attempts,
                last_error,
            } => {
                ctx.insert("attempts".into(), json!(attempts));
                ctx.insert("last_error".into(), json!(last_error.to_string()));
            }
            _ => {}
        }
        ctx
    }

    /// Retryable classification of this error, if it has one.
    ///
    /// This is the taxonomy-level view; which kinds actually trigger a retry
    /// is decided by the retry policy.
    pub fn retry_kind(&self) -> Option<RetryableKind> {
        match self {
            Self::Transaction { kind, .. } => match kind {
                TransactionErrorKind::Deadlock => Some(RetryableKind::Deadlock),
                TransactionErrorKind::Timeout => Some(RetryableKind::Timeout),
                TransactionErrorKind::Other => None,
            },
            Self::Connection { .. } => Some(RetryableKind::Connection),
            Self::Pool { .. } => Some(RetryableKind::Pool),
            _ => None,
        }
    }

    /// Whether this error is transient by default.
    pub fn is_retryable(&self) -> bool {
        self.retry_kind().is_some()
    }
}

/// SQLSTATE / vendor codes that indicate a deadlock or serialization failure.
fn is_deadlock_code(code: &str) -> bool {
    matches!(code, "40001" | "40P01" | "1213")
}

/// SQLSTATE / vendor codes that indicate a lock wait timeout.
fn is_lock_timeout_code(code: &str) -> bool {
    matches!(code, "1205" | "55P03")
}

impl From<sqlx::Error> for EngineKitError {
    fn from(err: sqlx::Error) -> Self {
        // Classify by reference so the original error can be kept as source.
        enum Class {
            Connection(String),
            Pool(String),
            Query {
                message: String,
                sql_state: Option<String>,
            },
            Transaction {
                message: String,
                kind: TransactionErrorKind,
            },
        }

        let class = match &err {
            sqlx::Error::Configuration(msg) => {
                Class::Connection(format!("invalid connection configuration: {msg}"))
            }
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                let message = db_err.message().to_string();
                match code.as_deref() {
                    Some(c) if is_deadlock_code(c) => Class::Transaction {
                        message,
                        kind: TransactionErrorKind::Deadlock,
                    },
                    Some(c) if is_lock_timeout_code(c) => Class::Transaction {
                        message,
                        kind: TransactionErrorKind::Timeout,
                    },
                    _ => Class::Query {
                        message,
                        sql_state: code,
                    },
                }
            }
            sqlx::Error::PoolTimedOut => {
                Class::Pool("timed out acquiring a connection from the pool".into())
            }
            sqlx::Error::PoolClosed => Class::Pool("connection pool is closed".into()),
            sqlx::Error::Io(io_err) => Class::Connection(format!("I/O error: {io_err}")),
            sqlx::Error::Tls(tls_err) => Class::Connection(format!("TLS error: {tls_err}")),
            sqlx::Error::Protocol(msg) => Class::Connection(format!("protocol error: {msg}")),
            sqlx::Error::WorkerCrashed => Class::Connection("database worker crashed".into()),
            sqlx::Error::RowNotFound => Class::Query {
                message: "no rows returned".into(),
                sql_state: None,
            },
            other => Class::Query {
                message: other.to_string(),
                sql_state: None,
            },
        };

        let source = Some(Box::new(err));
        match class {
            Class::Connection(message) => Self::Connection { message, source },
            Class::Pool(message) => Self::Pool { message, source },
            Class::Query { message, sql_state } => Self::Query {
                message,
                sql_state,
                source,
            },
            Class::Transaction { message, kind } => Self::Transaction {
                message,
                kind,
                source,
            },
        }
    }
}

impl From<sqlx::migrate::MigrateError> for EngineKitError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Self::Migration {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}
