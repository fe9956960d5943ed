//! Parameter binding for positional query placeholders.
//!
//! [`QueryParam`] is the database-agnostic value type accepted by session
//! operations; the `bind_*` helpers attach values to database-specific
//! query objects.

use crate::error::{EngineKitError, EngineResult};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use sqlx::mysql::MySqlArguments;
use sqlx::postgres::PgArguments;
use sqlx::sqlite::SqliteArguments;
use sqlx::types::Json;
use sqlx::{MySql, Postgres, Sqlite};

/// A positional query parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryParam {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Json(serde_json::Value),
    Binary(Vec<u8>),
}

impl QueryParam {
    /// Convert a JSON value to a parameter. Arrays and objects bind as JSON;
    /// scalars bind as their native types.
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(v) => Self::Bool(v),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else {
                    Self::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Self::Text(s),
            other => Self::Json(other),
        }
    }

    /// Binary parameter from base64-encoded text.
    pub fn binary_from_base64(encoded: &str) -> EngineResult<Self> {
        let bytes = STANDARD.decode(encoded).map_err(|e| {
            EngineKitError::query(format!("invalid base64 binary parameter: {e}"))
        })?;
        Ok(Self::Binary(bytes))
    }
}

impl From<bool> for QueryParam {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for QueryParam {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for QueryParam {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<f64> for QueryParam {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for QueryParam {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for QueryParam {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Vec<u8>> for QueryParam {
    fn from(v: Vec<u8>) -> Self {
        Self::Binary(v)
    }
}

pub(crate) fn bind_mysql_param<'q>(
    query: sqlx::query::Query<'q, MySql, MySqlArguments>,
    param: &'q QueryParam,
) -> sqlx::query::Query<'q, MySql, MySqlArguments> {
    match param {
        QueryParam::Null => query.bind(None::<String>),
        QueryParam::Bool(v) => query.bind(*v),
        QueryParam::Int(v) => query.bind(*v),
        QueryParam::Float(v) => query.bind(*v),
        QueryParam::Text(v) => query.bind(v.as_str()),
        QueryParam::Json(v) => query.bind(Json(v)),
        QueryParam::Binary(v) => query.bind(v.as_slice()),
    }
}

pub(crate) fn bind_postgres_param<'q>(
    query: sqlx::query::Query<'q, Postgres, PgArguments>,
    param: &'q QueryParam,
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    match param {
        QueryParam::Null => query.bind(None::<String>),
        QueryParam::Bool(v) => query.bind(*v),
        QueryParam::Int(v) => query.bind(*v),
        QueryParam::Float(v) => query.bind(*v),
        QueryParam::Text(v) => query.bind(v.as_str()),
        QueryParam::Json(v) => query.bind(Json(v)),
        QueryParam::Binary(v) => query.bind(v.as_slice()),
    }
}

pub(crate) fn bind_sqlite_param<'q>(
    query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    param: &'q QueryParam,
) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
    match param {
        QueryParam::Null => query.bind(None::<String>),
        QueryParam::Bool(v) => query.bind(*v),
        QueryParam::Int(v) => query.bind(*v),
        QueryParam::Float(v) => query.bind(*v),
        QueryParam::Text(v) => query.bind(v.as_str()),
        // SQLite has no native JSON type, store as string
        QueryParam::Json(v) => query.bind(v.to_string()),
        QueryParam::Binary(v) => query.bind(v.as_slice()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_scalars() {
        assert_eq!(QueryParam::from_json(json!(null)), QueryParam::Null);
        assert_eq!(QueryParam::from_json(json!(true)), QueryParam::Bool(true));
        assert_eq!(QueryParam::from_json(json!(42)), QueryParam::Int(42));
        assert_eq!(QueryParam::from_json(json!(1.5)), QueryParam::Float(1.5));
        assert_eq!(
            QueryParam::from_json(json!("hi")),
            QueryParam::Text("hi".to_string())
        );
    }

    #[test]
    fn test_from_json_compound_binds_as_json() {
        assert_eq!(
            QueryParam::from_json(json!([1, 2])),
            QueryParam::Json(json!([1, 2]))
        );
        assert_eq!(
            QueryParam::from_json(json!({"a": 1})),
            QueryParam::Json(json!({"a": 1}))
        );
    }

    #[test]
    fn test_binary_from_base64() {
        let param = QueryParam::binary_from_base64("aGVsbG8=").unwrap();
        assert_eq!(param, QueryParam::Binary(b"hello".to_vec()));
        assert!(QueryParam::binary_from_base64("not base64!!!").is_err());
    }
}
