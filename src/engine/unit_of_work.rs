//! Policy-driven units of work.
//!
//! A unit of work is a callback that receives `&mut Session` and returns a
//! boxed future. [`DatabaseEngine::run`] opens a session, invokes the
//! callback, and finishes the session according to the [`ExecutionPolicy`]:
//! the session is always committed or rolled back and closed before `run`
//! returns, whatever the callback did.
//!
//! ```ignore
//! let rows = engine
//!     .run(ExecutionPolicy::Transactional, |session| {
//!         Box::pin(async move {
//!             session.execute("INSERT INTO t (a) VALUES (?)", &[1i64.into()]).await?;
//!             session.fetch_all("SELECT * FROM t", &[]).await
//!         })
//!     })
//!     .await?;
//! ```

use crate::engine::core::DatabaseEngine;
use crate::engine::session::Session;
use crate::error::{EngineKitError, EngineResult, RetryableKind};
use futures_util::future::BoxFuture;
use std::time::Duration;
use tracing::{info, warn};

/// How a retrying unit of work backs off and which errors it retries.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total invocations, including the first. At least 1.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    /// Backoff grows by this factor per attempt.
    pub backoff_multiplier: f64,
    pub max_backoff: Duration,
    /// Error classes that trigger a retry.
    pub retry_on: Vec<RetryableKind>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
            backoff_multiplier: 2.0,
            max_backoff: Duration::from_secs(5),
            retry_on: vec![RetryableKind::Deadlock, RetryableKind::Timeout],
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    pub fn with_retry_on(mut self, kinds: Vec<RetryableKind>) -> Self {
        self.retry_on = kinds;
        self
    }

    /// Whether this policy retries the given error.
    pub fn should_retry(&self, error: &EngineKitError) -> bool {
        error
            .retry_kind()
            .is_some_and(|kind| self.retry_on.contains(&kind))
    }

    /// Backoff before the next attempt: `initial * multiplier^(attempt - 1)`,
    /// capped at `max_backoff`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let factor = self.backoff_multiplier.powi(exponent);
        let secs = (self.initial_backoff.as_secs_f64() * factor).max(0.0);
        Duration::from_secs_f64(secs.min(self.max_backoff.as_secs_f64()))
    }
}

/// Commit/rollback behavior applied around a unit of work.
#[derive(Debug, Clone)]
pub enum ExecutionPolicy {
    /// Commit on success only when `auto_commit` is set.
    Plain { auto_commit: bool },
    /// Commit on success, roll back on error.
    Transactional,
    /// Always roll back; the work observes a consistent snapshot.
    ReadOnly,
    /// Transactional, re-invoked on retryable errors with backoff.
    Retrying(RetryPolicy),
}

impl DatabaseEngine {
    /// Run a unit of work under the given policy.
    ///
    /// On callback error the session is rolled back and closed before the
    /// error propagates. On success the session is committed (`Plain` with
    /// `auto_commit`, `Transactional`, `Retrying`) or rolled back
    /// (`ReadOnly`, `Plain` without auto-commit).
    pub async fn run<T, F>(&self, policy: ExecutionPolicy, mut work: F) -> EngineResult<T>
    where
        T: Send,
        F: for<'s> FnMut(&'s mut Session) -> BoxFuture<'s, EngineResult<T>> + Send,
    {
        match policy {
            ExecutionPolicy::Retrying(retry) => self.run_with_retry(retry, work).await,
            other => self.run_once(&other, &mut work).await,
        }
    }

    async fn run_once<T, F>(&self, policy: &ExecutionPolicy, work: &mut F) -> EngineResult<T>
    where
        T: Send,
        F: for<'s> FnMut(&'s mut Session) -> BoxFuture<'s, EngineResult<T>> + Send,
    {
        let read_only = matches!(policy, ExecutionPolicy::ReadOnly);
        let mut session = if read_only {
            self.readonly_session().await?
        } else {
            self.session().await?
        };

        match work(&mut session).await {
            Ok(value) => {
                let commit = match policy {
                    ExecutionPolicy::Plain { auto_commit } => *auto_commit,
                    ExecutionPolicy::Transactional | ExecutionPolicy::Retrying(_) => true,
                    ExecutionPolicy::ReadOnly => false,
                };
                if commit {
                    session.commit().await?;
                } else {
                    session.rollback().await?;
                }
                Ok(value)
            }
            Err(e) => {
                // Best-effort rollback; the callback's error is the one that matters.
                if let Err(rollback_err) = session.rollback().await {
                    warn!(error = %rollback_err, "Rollback after failed unit of work also failed");
                }
                Err(e)
            }
        }
    }

    async fn run_with_retry<T, F>(&self, policy: RetryPolicy, mut work: F) -> EngineResult<T>
    where
        T: Send,
        F: for<'s> FnMut(&'s mut Session) -> BoxFuture<'s, EngineResult<T>> + Send,
    {
        let max_attempts = policy.max_attempts.max(1);
        let mut attempt = 1u32;
        loop {
            match self
                .run_once(&ExecutionPolicy::Transactional, &mut work)
                .await
            {
                Ok(value) => {
                    if attempt > 1 {
                        info!(attempt, "Unit of work succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if policy.should_retry(&e) => {
                    if attempt >= max_attempts {
                        return Err(EngineKitError::RetryExhausted {
                            attempts: max_attempts,
                            last_error: Box::new(e),
                        });
                    }
                    let backoff = policy.backoff(attempt);
                    warn!(
                        attempt,
                        max_attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Retryable error in unit of work, backing off"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Run work in a session that commits on success.
pub async fn with_session<T, F>(engine: &DatabaseEngine, work: F) -> EngineResult<T>
where
    T: Send,
    F: for<'s> FnMut(&'s mut Session) -> BoxFuture<'s, EngineResult<T>> + Send,
{
    engine
        .run(ExecutionPolicy::Plain { auto_commit: true }, work)
        .await
}

/// Run work in an explicit transaction.
pub async fn with_transaction<T, F>(engine: &DatabaseEngine, work: F) -> EngineResult<T>
where
    T: Send,
    F: for<'s> FnMut(&'s mut Session) -> BoxFuture<'s, EngineResult<T>> + Send,
{
    engine.run(ExecutionPolicy::Transactional, work).await
}

/// Run work in a session that is always rolled back.
pub async fn with_readonly_session<T, F>(engine: &DatabaseEngine, work: F) -> EngineResult<T>
where
    T: Send,
    F: for<'s> FnMut(&'s mut Session) -> BoxFuture<'s, EngineResult<T>> + Send,
{
    engine.run(ExecutionPolicy::ReadOnly, work).await
}

/// Run transactional work with retries on transient errors.
pub async fn with_retry_session<T, F>(
    engine: &DatabaseEngine,
    policy: RetryPolicy,
    work: F,
) -> EngineResult<T>
where
    T: Send,
    F: for<'s> FnMut(&'s mut Session) -> BoxFuture<'s, EngineResult<T>> + Send,
{
    engine.run(ExecutionPolicy::Retrying(policy), work).await
}
