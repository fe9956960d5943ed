//! Integration tests for execution policies and retries.

use sqlx_engine_kit::{
    DatabaseConfig, DatabaseEngine, EngineKitError, ExecutionPolicy, RetryPolicy, RetryableKind,
    TransactionErrorKind, with_readonly_session, with_retry_session, with_session,
    with_transaction,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tempfile::TempDir;

async fn setup_engine(dir: &TempDir) -> DatabaseEngine {
    let path = dir.path().join("test.db");
    let engine = DatabaseEngine::new(DatabaseConfig::sqlite(path.to_str().unwrap())).unwrap();
    engine.start().await.unwrap();
    engine
        .run(ExecutionPolicy::Transactional, |session| {
            Box::pin(async move {
                session
                    .execute(
                        "CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT)",
                        &[],
                    )
                    .await?;
                Ok(())
            })
        })
        .await
        .unwrap();
    engine
}

async fn item_count(engine: &DatabaseEngine) -> i64 {
    engine
        .run(ExecutionPolicy::ReadOnly, |session| {
            Box::pin(async move {
                let row = session
                    .fetch_one("SELECT COUNT(*) AS n FROM items", &[])
                    .await?;
                Ok(row["n"].as_i64().unwrap())
            })
        })
        .await
        .unwrap()
}

fn quick_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::default()
        .with_max_attempts(max_attempts)
        .with_initial_backoff(Duration::from_millis(1))
}

#[tokio::test]
async fn test_transactional_rolls_back_on_callback_error() {
    let dir = TempDir::new().unwrap();
    let engine = setup_engine(&dir).await;

    let result: Result<(), _> = engine
        .run(ExecutionPolicy::Transactional, |session| {
            Box::pin(async move {
                session
                    .execute("INSERT INTO items (name) VALUES (?)", &["doomed".into()])
                    .await?;
                Err(EngineKitError::session("business rule violated"))
            })
        })
        .await;

    assert!(result.is_err());
    assert_eq!(item_count(&engine).await, 0);
    assert_eq!(engine.session_count(), 0);
    engine.stop().await;
}

#[tokio::test]
async fn test_readonly_never_persists_mutations() {
    let dir = TempDir::new().unwrap();
    let engine = setup_engine(&dir).await;

    let seen: i64 = engine
        .run(ExecutionPolicy::ReadOnly, |session| {
            Box::pin(async move {
                session
                    .execute("INSERT INTO items (name) VALUES (?)", &["phantom".into()])
                    .await?;
                let row = session
                    .fetch_one("SELECT COUNT(*) AS n FROM items", &[])
                    .await?;
                Ok(row["n"].as_i64().unwrap())
            })
        })
        .await
        .unwrap();

    // Visible inside the snapshot, gone after the rollback
    assert_eq!(seen, 1);
    assert_eq!(item_count(&engine).await, 0);
    engine.stop().await;
}

#[tokio::test]
async fn test_plain_auto_commit_controls_persistence() {
    let dir = TempDir::new().unwrap();
    let engine = setup_engine(&dir).await;

    engine
        .run(ExecutionPolicy::Plain { auto_commit: false }, |session| {
            Box::pin(async move {
                session
                    .execute("INSERT INTO items (name) VALUES (?)", &["discarded".into()])
                    .await?;
                Ok(())
            })
        })
        .await
        .unwrap();
    assert_eq!(item_count(&engine).await, 0);

    engine
        .run(ExecutionPolicy::Plain { auto_commit: true }, |session| {
            Box::pin(async move {
                session
                    .execute("INSERT INTO items (name) VALUES (?)", &["kept".into()])
                    .await?;
                Ok(())
            })
        })
        .await
        .unwrap();
    assert_eq!(item_count(&engine).await, 1);
    engine.stop().await;
}

#[tokio::test]
async fn test_retry_succeeds_after_transient_failures() {
    let dir = TempDir::new().unwrap();
    let engine = setup_engine(&dir).await;

    let calls = Arc::new(AtomicU32::new(0));
    let calls_in = Arc::clone(&calls);
    let value = engine
        .run(
            ExecutionPolicy::Retrying(quick_retry(5)),
            move |session| {
                let calls = Arc::clone(&calls_in);
                Box::pin(async move {
                    let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    if attempt <= 2 {
                        return Err(EngineKitError::transaction(
                            "synthetic deadlock",
                            TransactionErrorKind::Deadlock,
                        ));
                    }
                    session
                        .execute("INSERT INTO items (name) VALUES (?)", &["retried".into()])
                        .await?;
                    Ok(attempt)
                })
            },
        )
        .await
        .unwrap();

    // Failed twice, succeeded on the third invocation
    assert_eq!(value, 3);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(item_count(&engine).await, 1);
    engine.stop().await;
}

#[tokio::test]
async fn test_retry_exhaustion_surfaces_last_error() {
    let dir = TempDir::new().unwrap();
    let engine = setup_engine(&dir).await;

    let calls = Arc::new(AtomicU32::new(0));
    let calls_in = Arc::clone(&calls);
    let err = engine
        .run(
            ExecutionPolicy::Retrying(quick_retry(2)),
            move |_session| {
                let calls = Arc::clone(&calls_in);
                Box::pin(async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(EngineKitError::transaction(
                        "synthetic deadlock",
                        TransactionErrorKind::Deadlock,
                    ))
                })
            },
        )
        .await
        .unwrap_err();

    match err {
        EngineKitError::RetryExhausted {
            attempts,
            last_error,
        } => {
            assert_eq!(attempts, 2);
            assert!(matches!(
                *last_error,
                EngineKitError::Transaction {
                    kind: TransactionErrorKind::Deadlock,
                    ..
                }
            ));
        }
        other => panic!("expected RetryExhausted, got {other:?}"),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    engine.stop().await;
}

#[tokio::test]
async fn test_non_retryable_error_surfaces_immediately() {
    let dir = TempDir::new().unwrap();
    let engine = setup_engine(&dir).await;

    let calls = Arc::new(AtomicU32::new(0));
    let calls_in = Arc::clone(&calls);
    let err = engine
        .run(
            ExecutionPolicy::Retrying(quick_retry(5)),
            move |_session| {
                let calls = Arc::clone(&calls_in);
                Box::pin(async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(EngineKitError::query("syntax error"))
                })
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, EngineKitError::Query { .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    engine.stop().await;
}

#[tokio::test]
async fn test_retry_on_kinds_are_configurable() {
    let dir = TempDir::new().unwrap();
    let engine = setup_engine(&dir).await;

    // Connection errors are not retried by default; opt in to them and
    // deadlocks fall out of the retry set.
    let policy = quick_retry(3).with_retry_on(vec![RetryableKind::Connection]);
    let err = engine
        .run(ExecutionPolicy::Retrying(policy), |_session| {
            Box::pin(async move {
                Err::<(), _>(EngineKitError::transaction(
                    "synthetic deadlock",
                    TransactionErrorKind::Deadlock,
                ))
            })
        })
        .await
        .unwrap_err();
    assert!(matches!(err, EngineKitError::Transaction { .. }));
    engine.stop().await;
}

#[tokio::test]
async fn test_free_helpers_mirror_policies() {
    let dir = TempDir::new().unwrap();
    let engine = setup_engine(&dir).await;

    with_session(&engine, |session| {
        Box::pin(async move {
            session
                .execute("INSERT INTO items (name) VALUES (?)", &["a".into()])
                .await?;
            Ok(())
        })
    })
    .await
    .unwrap();

    with_transaction(&engine, |session| {
        Box::pin(async move {
            session
                .execute("INSERT INTO items (name) VALUES (?)", &["b".into()])
                .await?;
            Ok(())
        })
    })
    .await
    .unwrap();

    let rows = with_readonly_session(&engine, |session| {
        Box::pin(async move { session.fetch_all("SELECT name FROM items ORDER BY name", &[]).await })
    })
    .await
    .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["name"], "a");

    let total = with_retry_session(&engine, quick_retry(3), |session| {
        Box::pin(async move {
            let row = session
                .fetch_one("SELECT COUNT(*) AS n FROM items", &[])
                .await?;
            Ok(row["n"].as_i64().unwrap())
        })
    })
    .await
    .unwrap();
    assert_eq!(total, 2);
    engine.stop().await;
}
