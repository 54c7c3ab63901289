//! `PostgreSQL`-backed lock provider for Lockgate.

mod config;
pub mod migrations;
mod provider;

pub use config::PostgresConfig;
pub use provider::PostgresLockProvider;
