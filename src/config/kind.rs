//! Supported database kinds.

use crate::error::EngineKitError;
use std::str::FromStr;

/// Database backends supported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseKind {
    /// File-based, single-file database.
    Sqlite,
    /// PostgreSQL server.
    Postgres,
    /// MySQL (or MariaDB) server.
    MySql,
}

impl DatabaseKind {
    /// Default server port. Zero for SQLite, which has no network endpoint.
    pub fn default_port(self) -> u16 {
        match self {
            Self::Sqlite => 0,
            Self::Postgres => 5432,
            Self::MySql => 3306,
        }
    }

    /// Whether a username/password is required to connect.
    pub fn requires_credentials(self) -> bool {
        self != Self::Sqlite
    }

    /// URL scheme understood by sqlx.
    pub fn scheme(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Postgres => "postgres",
            Self::MySql => "mysql",
        }
    }

    /// Human-readable name.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Sqlite => "SQLite",
            Self::Postgres => "PostgreSQL",
            Self::MySql => "MySQL",
        }
    }
}

impl std::fmt::Display for DatabaseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for DatabaseKind {
    type Err = EngineKitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(Self::Sqlite),
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            "mysql" | "mariadb" => Ok(Self::MySql),
            other => Err(EngineKitError::configuration_field(
                format!("unsupported database kind '{other}'"),
                "db_type",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ports() {
        assert_eq!(DatabaseKind::Postgres.default_port(), 5432);
        assert_eq!(DatabaseKind::MySql.default_port(), 3306);
        assert_eq!(DatabaseKind::Sqlite.default_port(), 0);
    }

    #[test]
    fn test_credentials_required() {
        assert!(DatabaseKind::Postgres.requires_credentials());
        assert!(DatabaseKind::MySql.requires_credentials());
        assert!(!DatabaseKind::Sqlite.requires_credentials());
    }

    #[test]
    fn test_from_str_aliases() {
        assert_eq!(
            "postgresql".parse::<DatabaseKind>().unwrap(),
            DatabaseKind::Postgres
        );
        assert_eq!(
            "MariaDB".parse::<DatabaseKind>().unwrap(),
            DatabaseKind::MySql
        );
        assert_eq!(
            "sqlite3".parse::<DatabaseKind>().unwrap(),
            DatabaseKind::Sqlite
        );
        assert!("oracle".parse::<DatabaseKind>().is_err());
    }
}
