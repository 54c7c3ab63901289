//! Redis-backed lock provider for Lockgate.

mod config;
mod provider;
mod scripts;

pub use config::RedisConfig;
pub use provider::RedisLockProvider;
