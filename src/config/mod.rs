//! Configuration handling: database target description, pool tuning, and
//! environment-based loading.

pub mod database;
pub mod env;
pub mod kind;
pub mod pool;

pub use database::DatabaseConfig;
pub use env::{from_env, from_env_file};
pub use kind::DatabaseKind;
pub use pool::PoolConfig;
