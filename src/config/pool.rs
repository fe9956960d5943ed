//! Connection pool tuning.

use crate::error::{EngineKitError, EngineResult};
use std::time::Duration;

pub const DEFAULT_POOL_SIZE: u32 = 10;
pub const DEFAULT_MAX_OVERFLOW: u32 = 20;
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_LIFETIME_SECS: u64 = 3600;
pub const DEFAULT_HEALTH_CHECK_TTL_SECS: u64 = 30;

/// Pool and health-check tuning for one engine.
///
/// `pool_size` is the number of connections the pool targets under normal
/// load; `max_overflow` is how many extra connections may be opened during
/// bursts. sqlx is given `pool_size + max_overflow` as its hard cap. All
/// numeric fields are unsigned, so the non-negative invariant holds by
/// construction.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PoolConfig {
    /// Baseline number of pooled connections.
    pub pool_size: u32,
    /// Extra connections allowed on top of `pool_size` during bursts.
    pub max_overflow: u32,
    /// Max seconds to wait for a free connection before a pool error.
    pub acquire_timeout_secs: u64,
    /// Recycle connections older than this many seconds. Zero disables
    /// recycling.
    pub max_lifetime_secs: u64,
    /// Ping connections before handing them out (pre-ping).
    pub test_before_acquire: bool,
    /// How long a health-check result stays cached.
    pub health_check_ttl_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
            max_overflow: DEFAULT_MAX_OVERFLOW,
            acquire_timeout_secs: DEFAULT_ACQUIRE_TIMEOUT_SECS,
            max_lifetime_secs: DEFAULT_MAX_LIFETIME_SECS,
            test_before_acquire: true,
            health_check_ttl_secs: DEFAULT_HEALTH_CHECK_TTL_SECS,
        }
    }
}

impl PoolConfig {
    /// Tuned for API servers and other high-traffic workloads.
    pub fn high_concurrency() -> Self {
        Self {
            pool_size: 50,
            max_overflow: 50,
            acquire_timeout_secs: 120,
            ..Self::default()
        }
    }

    /// Smaller pool for local development.
    pub fn development() -> Self {
        Self {
            pool_size: 5,
            max_overflow: 5,
            ..Self::default()
        }
    }

    /// Single connection, no overflow. Suitable for batch jobs and SQLite.
    pub fn single_thread() -> Self {
        Self {
            pool_size: 1,
            max_overflow: 0,
            ..Self::default()
        }
    }

    /// Hard connection cap handed to sqlx.
    pub fn max_connections(&self) -> u32 {
        self.pool_size.saturating_add(self.max_overflow)
    }

    /// Acquire timeout as a [`Duration`].
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    /// Connection max lifetime, `None` when recycling is disabled.
    pub fn max_lifetime(&self) -> Option<Duration> {
        (self.max_lifetime_secs > 0).then(|| Duration::from_secs(self.max_lifetime_secs))
    }

    /// Health-check cache TTL as a [`Duration`].
    pub fn health_check_ttl(&self) -> Duration {
        Duration::from_secs(self.health_check_ttl_secs)
    }

    /// Validate the pool parameters.
    pub fn validate(&self) -> EngineResult<()> {
        if self.pool_size == 0 {
            return Err(EngineKitError::configuration_field(
                "pool_size must be greater than 0",
                "pool_size",
            ));
        }
        Ok(())
    }
}
