//! Configuration loading from environment variables and dotenv files.
//!
//! Recognized variables:
//!
//! | Variable            | Meaning                                    |
//! |---------------------|--------------------------------------------|
//! | `DB_TYPE`           | `sqlite`, `postgres`/`postgresql`, `mysql` |
//! | `DB_NAME`           | database name or SQLite file path          |
//! | `DB_HOST`           | server host (network databases)            |
//! | `DB_PORT`           | server port (defaults per kind)            |
//! | `DB_USER`           | username                                   |
//! | `DB_PASSWORD`       | password                                   |
//! | `DB_POOL_SIZE`      | baseline pool size                         |
//! | `DB_MAX_OVERFLOW`   | burst connections on top of the pool size  |
//! | `DB_POOL_TIMEOUT`   | acquire timeout in seconds                 |
//! | `DB_POOL_RECYCLE`   | connection max lifetime in seconds         |
//! | `DB_POOL_PRE_PING`  | `true`/`false`, ping before handing out    |

use crate::config::database::DatabaseConfig;
use crate::config::kind::DatabaseKind;
use crate::config::pool::PoolConfig;
use crate::error::{EngineKitError, EngineResult};
use std::path::Path;
use tracing::debug;

/// Load a [`DatabaseConfig`] from process environment variables.
pub fn from_env() -> EngineResult<DatabaseConfig> {
    from_lookup(|key| std::env::var(key).ok())
}

/// Load a dotenv file, then read the configuration from the environment.
///
/// Variables already present in the environment take precedence over the
/// file, matching dotenv conventions.
pub fn from_env_file(path: impl AsRef<Path>) -> EngineResult<DatabaseConfig> {
    let path = path.as_ref();
    dotenvy::from_path(path).map_err(|e| {
        EngineKitError::configuration(format!(
            "failed to load env file {}: {e}",
            path.display()
        ))
    })?;
    debug!(path = %path.display(), "Loaded configuration file");
    from_env()
}

/// Build a configuration from an arbitrary key lookup. Factored out so tests
/// can supply variables without mutating the process environment.
pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> EngineResult<DatabaseConfig> {
    let kind: DatabaseKind = lookup("DB_TYPE")
        .ok_or_else(|| EngineKitError::configuration_field("DB_TYPE is not set", "DB_TYPE"))?
        .parse()?;

    let database = lookup("DB_NAME").ok_or_else(|| {
        EngineKitError::configuration_field("DB_NAME is not set", "DB_NAME")
    })?;

    let mut config = match kind {
        DatabaseKind::Sqlite => DatabaseConfig::sqlite(database),
        DatabaseKind::Postgres | DatabaseKind::MySql => {
            let host = lookup("DB_HOST").ok_or_else(|| {
                EngineKitError::configuration_field("DB_HOST is not set", "DB_HOST")
            })?;
            let username = lookup("DB_USER").unwrap_or_default();
            let password = lookup("DB_PASSWORD").unwrap_or_default();
            let base = match kind {
                DatabaseKind::Postgres => {
                    DatabaseConfig::postgres(host, database, username, password)
                }
                _ => DatabaseConfig::mysql(host, database, username, password),
            };
            match lookup("DB_PORT") {
                Some(raw) => base.with_port(parse_var("DB_PORT", &raw)?),
                None => base,
            }
        }
    };

    let mut pool = PoolConfig::default();
    if kind == DatabaseKind::Sqlite {
        pool = PoolConfig::single_thread();
    }
    if let Some(raw) = lookup("DB_POOL_SIZE") {
        pool.pool_size = parse_var("DB_POOL_SIZE", &raw)?;
    }
    if let Some(raw) = lookup("DB_MAX_OVERFLOW") {
        pool.max_overflow = parse_var("DB_MAX_OVERFLOW", &raw)?;
    }
    if let Some(raw) = lookup("DB_POOL_TIMEOUT") {
        pool.acquire_timeout_secs = parse_var("DB_POOL_TIMEOUT", &raw)?;
    }
    if let Some(raw) = lookup("DB_POOL_RECYCLE") {
        pool.max_lifetime_secs = parse_var("DB_POOL_RECYCLE", &raw)?;
    }
    if let Some(raw) = lookup("DB_POOL_PRE_PING") {
        pool.test_before_acquire = match raw.to_ascii_lowercase().as_str() {
            "true" | "1" => true,
            "false" | "0" => false,
            other => {
                return Err(EngineKitError::configuration_field(
                    format!("DB_POOL_PRE_PING must be true or false, got '{other}'"),
                    "DB_POOL_PRE_PING",
                ));
            }
        };
    }
    config.pool = pool;

    config.validate()?;
    Ok(config)
}

fn parse_var<T: std::str::FromStr>(name: &str, raw: &str) -> EngineResult<T> {
    raw.parse().map_err(|_| {
        EngineKitError::configuration_field(format!("{name} has invalid value '{raw}'"), name)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        let map: HashMap<&str, &str> = vars.iter().copied().collect();
        move |key| map.get(key).map(|v| v.to_string())
    }

    #[test]
    fn test_sqlite_from_env() {
        let config = from_lookup(lookup(&[("DB_TYPE", "sqlite"), ("DB_NAME", "/tmp/env.db")]))
            .unwrap();
        assert_eq!(config.kind, DatabaseKind::Sqlite);
        assert_eq!(config.database, "/tmp/env.db");
        assert_eq!(config.pool.max_connections(), 1);
    }

    #[test]
    fn test_postgres_from_env_with_pool_tuning() {
        let config = from_lookup(lookup(&[
            ("DB_TYPE", "postgresql"),
            ("DB_NAME", "appdb"),
            ("DB_HOST", "db.internal"),
            ("DB_PORT", "5433"),
            ("DB_USER", "app"),
            ("DB_PASSWORD", "pw"),
            ("DB_POOL_SIZE", "20"),
            ("DB_MAX_OVERFLOW", "5"),
            ("DB_POOL_PRE_PING", "false"),
        ]))
        .unwrap();
        assert_eq!(config.kind, DatabaseKind::Postgres);
        assert_eq!(config.port, 5433);
        assert_eq!(config.pool.pool_size, 20);
        assert_eq!(config.pool.max_overflow, 5);
        assert!(!config.pool.test_before_acquire);
    }

    #[test]
    fn test_missing_type_is_configuration_error() {
        let err = from_lookup(lookup(&[("DB_NAME", "x")])).unwrap_err();
        assert!(err.to_string().contains("DB_TYPE"));
    }

    #[test]
    fn test_missing_credentials_rejected() {
        let err = from_lookup(lookup(&[
            ("DB_TYPE", "mysql"),
            ("DB_NAME", "appdb"),
            ("DB_HOST", "localhost"),
        ]))
        .unwrap_err();
        assert!(matches!(err, EngineKitError::Configuration { .. }));
    }

    #[test]
    fn test_invalid_port_rejected() {
        let err = from_lookup(lookup(&[
            ("DB_TYPE", "postgres"),
            ("DB_NAME", "appdb"),
            ("DB_HOST", "localhost"),
            ("DB_USER", "app"),
            ("DB_PASSWORD", "pw"),
            ("DB_PORT", "not-a-port"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("DB_PORT"));
    }
}
