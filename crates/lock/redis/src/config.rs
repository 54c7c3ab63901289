use std::time::Duration;

/// Configuration for the Redis lock provider.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis connection URL (e.g. `redis://127.0.0.1:6379`).
    pub url: String,

    /// Key prefix applied to every Redis key to avoid collisions.
    pub prefix: String,

    /// Number of connections in the `deadpool-redis` pool.
    pub pool_size: usize,

    /// Timeout for acquiring a pooled connection.
    pub connection_timeout: Duration,

    /// Expiry set on every lock key so a crashed holder cannot block forever.
    pub lease_ttl: Duration,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: String::from("redis://127.0.0.1:6379"),
            prefix: String::from("lockgate"),
            pool_size: 10,
            connection_timeout: Duration::from_secs(5),
            lease_ttl: Duration::from_secs(30),
        }
    }
}

impl RedisConfig {
    /// Create a configuration for the given URL with default settings.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Build the full Redis key for a lock.
    pub(crate) fn lock_key(&self, name: &str) -> String {
        format!("{}:lock:{}", self.prefix, name)
    }
}
