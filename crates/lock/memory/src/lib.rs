mod provider;

pub use provider::{DEFAULT_LEASE_TTL, MemoryLockProvider};
