//! Engine lifecycle, sessions, and policy-driven units of work.

mod core;
pub mod manager;
pub mod params;
pub(crate) mod pool;
pub mod row;
pub mod session;
pub mod unit_of_work;

pub use self::core::{DatabaseEngine, HealthReport, HealthStatus};
pub use manager::{EngineManager, InitOptions};
pub use params::QueryParam;
pub use session::{JsonRow, Session, SessionInfo, SessionRegistry};
pub use unit_of_work::{
    ExecutionPolicy, RetryPolicy, with_readonly_session, with_retry_session, with_session,
    with_transaction,
};
