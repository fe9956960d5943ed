//! Integration tests for the migration runner against SQLite.

use sqlx_engine_kit::{DatabaseConfig, DatabaseEngine, ExecutionPolicy, MigrationRunner};
use std::path::Path;
use tempfile::TempDir;

async fn started_engine(dir: &TempDir) -> DatabaseEngine {
    let path = dir.path().join("test.db");
    let engine = DatabaseEngine::new(DatabaseConfig::sqlite(path.to_str().unwrap())).unwrap();
    engine.start().await.unwrap();
    engine
}

fn write_migrations(dir: &Path, files: &[(&str, &str)]) {
    for (name, sql) in files {
        std::fs::write(dir.join(name), sql).unwrap();
    }
}

#[tokio::test]
async fn test_run_applies_pending_migrations() {
    let dir = TempDir::new().unwrap();
    let migrations_dir = dir.path().join("migrations");
    std::fs::create_dir(&migrations_dir).unwrap();
    write_migrations(
        &migrations_dir,
        &[
            (
                "0001_create_users.sql",
                "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL);",
            ),
            (
                "0002_seed_users.sql",
                "INSERT INTO users (name) VALUES ('admin');",
            ),
        ],
    );

    let engine = started_engine(&dir).await;
    let runner = MigrationRunner::from_path(&migrations_dir).await.unwrap();

    assert_eq!(runner.head_version(), Some(2));
    assert_eq!(runner.applied_version(&engine).await.unwrap(), None);

    runner.run(&engine).await.unwrap();
    assert_eq!(runner.applied_version(&engine).await.unwrap(), Some(2));

    let name: String = engine
        .run(ExecutionPolicy::ReadOnly, |session| {
            Box::pin(async move {
                let row = session.fetch_one("SELECT name FROM users", &[]).await?;
                Ok(row["name"].as_str().unwrap().to_string())
            })
        })
        .await
        .unwrap();
    assert_eq!(name, "admin");

    // Re-running is a no-op
    runner.run(&engine).await.unwrap();
    assert_eq!(runner.applied_version(&engine).await.unwrap(), Some(2));
    engine.stop().await;
}

#[tokio::test]
async fn test_undo_reverts_reversible_migrations() {
    let dir = TempDir::new().unwrap();
    let migrations_dir = dir.path().join("migrations");
    std::fs::create_dir(&migrations_dir).unwrap();
    write_migrations(
        &migrations_dir,
        &[
            (
                "0001_create_logs.up.sql",
                "CREATE TABLE logs (line TEXT);",
            ),
            ("0001_create_logs.down.sql", "DROP TABLE logs;"),
        ],
    );

    let engine = started_engine(&dir).await;
    let runner = MigrationRunner::from_path(&migrations_dir).await.unwrap();
    runner.run(&engine).await.unwrap();
    assert_eq!(runner.applied_version(&engine).await.unwrap(), Some(1));

    runner.undo(&engine, 0).await.unwrap();
    assert_eq!(runner.applied_version(&engine).await.unwrap(), None);

    // Table is gone after the down migration
    let result = engine
        .run(ExecutionPolicy::ReadOnly, |session| {
            Box::pin(async move { session.fetch_all("SELECT * FROM logs", &[]).await })
        })
        .await;
    assert!(result.is_err());
    engine.stop().await;
}

#[tokio::test]
async fn test_migrations_require_started_engine() {
    let dir = TempDir::new().unwrap();
    let migrations_dir = dir.path().join("migrations");
    std::fs::create_dir(&migrations_dir).unwrap();
    write_migrations(
        &migrations_dir,
        &[("0001_noop.sql", "CREATE TABLE noop (a INTEGER);")],
    );

    let path = dir.path().join("test.db");
    let engine = DatabaseEngine::new(DatabaseConfig::sqlite(path.to_str().unwrap())).unwrap();
    let runner = MigrationRunner::from_path(&migrations_dir).await.unwrap();

    assert!(runner.run(&engine).await.is_err());
    assert!(runner.applied_version(&engine).await.is_err());
}
