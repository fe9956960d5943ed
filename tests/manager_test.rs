//! Integration tests for the engine manager and the global singleton.
//!
//! The global-manager test lives in this file on its own so the process-wide
//! state is not shared with unrelated tests.

use sqlx_engine_kit::{
    DatabaseConfig, EngineKitError, EngineManager, ExecutionPolicy, InitOptions,
};
use tempfile::TempDir;

fn sqlite_config(dir: &TempDir) -> DatabaseConfig {
    DatabaseConfig::sqlite(dir.path().join("test.db").to_str().unwrap())
}

#[tokio::test]
async fn test_global_manager_is_a_singleton() {
    let dir = TempDir::new().unwrap();

    let first = EngineManager::global();
    let second = EngineManager::global();
    assert!(std::ptr::eq(first, second));

    let engine = first
        .initialize(sqlite_config(&dir), InitOptions::default())
        .await
        .unwrap();
    assert!(engine.is_started().await);
    assert!(second.is_initialized().await);

    // Both accessors see the identical engine
    let from_first = first.engine().await.unwrap();
    let from_second = second.engine().await.unwrap();
    assert!(std::sync::Arc::ptr_eq(&from_first, &from_second));

    let err = second
        .initialize(sqlite_config(&dir), InitOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineKitError::AlreadyInitialized));

    first.reset().await.unwrap();
    assert!(!second.is_initialized().await);
}

#[tokio::test]
async fn test_manager_runs_units_of_work() {
    let dir = TempDir::new().unwrap();
    let manager = EngineManager::new();
    manager
        .initialize(sqlite_config(&dir), InitOptions::default())
        .await
        .unwrap();

    manager
        .run(ExecutionPolicy::Transactional, |session| {
            Box::pin(async move {
                session
                    .execute("CREATE TABLE notes (body TEXT)", &[])
                    .await?;
                session
                    .execute("INSERT INTO notes (body) VALUES (?)", &["hello".into()])
                    .await?;
                Ok(())
            })
        })
        .await
        .unwrap();

    let body: String = manager
        .run(ExecutionPolicy::ReadOnly, |session| {
            Box::pin(async move {
                let row = session.fetch_one("SELECT body FROM notes", &[]).await?;
                Ok(row["body"].as_str().unwrap().to_string())
            })
        })
        .await
        .unwrap();
    assert_eq!(body, "hello");

    manager.reset().await.unwrap();
}

#[tokio::test]
async fn test_force_reinitialize_replaces_engine() {
    let dir_a = TempDir::new().unwrap();
    let dir_b = TempDir::new().unwrap();
    let manager = EngineManager::new();

    let first = manager
        .initialize(sqlite_config(&dir_a), InitOptions::default())
        .await
        .unwrap();

    let second = manager
        .initialize(sqlite_config(&dir_b), InitOptions::default().with_force())
        .await
        .unwrap();

    assert!(!std::sync::Arc::ptr_eq(&first, &second));
    assert!(!first.is_started().await);
    assert!(second.is_started().await);
    manager.reset().await.unwrap();
}

#[tokio::test]
async fn test_stop_keeps_engine_installed() {
    let dir = TempDir::new().unwrap();
    let manager = EngineManager::new();
    manager
        .initialize(sqlite_config(&dir), InitOptions::default())
        .await
        .unwrap();

    manager.stop().await;
    assert!(manager.is_initialized().await);
    let engine = manager.engine().await.unwrap();
    assert!(!engine.is_started().await);

    // Restartable after a manager-level stop
    engine.start().await.unwrap();
    assert!(engine.is_started().await);
    manager.reset().await.unwrap();
}

#[tokio::test]
async fn test_reload_swaps_configuration() {
    let dir_a = TempDir::new().unwrap();
    let dir_b = TempDir::new().unwrap();
    let manager = EngineManager::new();
    manager
        .initialize(sqlite_config(&dir_a), InitOptions::default())
        .await
        .unwrap();

    let reloaded = manager.reload(sqlite_config(&dir_b), true).await.unwrap();
    assert!(reloaded.is_started().await);
    assert!(
        reloaded
            .config()
            .database
            .contains(dir_b.path().to_str().unwrap())
    );

    let not_started = manager.reload(sqlite_config(&dir_a), false).await.unwrap();
    assert!(!not_started.is_started().await);
    manager.reset().await.unwrap();
}

#[tokio::test]
async fn test_run_before_initialize_fails() {
    let manager = EngineManager::new();
    let err = manager
        .run(ExecutionPolicy::ReadOnly, |session| {
            Box::pin(async move { session.fetch_all("SELECT 1", &[]).await })
        })
        .await
        .unwrap_err();
    assert!(matches!(err, EngineKitError::NotInitialized { .. }));
}
