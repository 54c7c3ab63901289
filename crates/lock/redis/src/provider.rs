//! Redis-backed lock provider.
//!
//! Locks are taken with `SET key owner NX PX ttl` and released with an
//! owner-checked `DEL`, both inside Lua scripts so each step is atomic on the
//! server. Every provider instance generates one owner token at construction;
//! a lock can only be released by the instance that acquired it.
//!
//! # Guarantees
//!
//! With a single Redis instance at most one owner holds a given lock,
//! assuming the lease TTL outlives the critical section. Redis replication is
//! asynchronous, so in Cluster or Sentinel deployments a failover right after
//! an acquire can hand the same lock to a second owner. Pair this provider
//! with a durable one (e.g. `PostgreSQL`) in the coordinator when that matters.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use lockgate_lock::LockProvider;
//! use lockgate_lock_redis::{RedisConfig, RedisLockProvider};
//!
//! let provider = RedisLockProvider::new(&RedisConfig::new("redis://localhost:6379"))?;
//! if provider.acquire("my-lock", Duration::from_secs(5)).await?.is_acquired() {
//!     // Critical section...
//!     provider.release("my-lock").await?;
//! }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Config, Pool, Runtime};
use redis::Script;
use tokio::time::Instant;
use tracing::debug;

use lockgate_lock::{AcquireOutcome, ExtendOutcome, LockError, LockProvider, ReleaseOutcome};

use crate::config::RedisConfig;
use crate::scripts;

/// Retry interval when polling for lock acquisition.
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Redis-backed implementation of [`LockProvider`].
pub struct RedisLockProvider {
    pool: Pool,
    config: RedisConfig,
    owner: String,
}

impl RedisLockProvider {
    /// Create a new `RedisLockProvider` from the provided configuration.
    ///
    /// The pool connects lazily, so an unreachable server surfaces as
    /// [`LockError::Connection`] on the first call rather than here.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Connection`] if the pool cannot be created.
    pub fn new(config: &RedisConfig) -> Result<Self, LockError> {
        let cfg = Config::from_url(&config.url);
        let pool = cfg
            .builder()
            .map(|b| {
                b.max_size(config.pool_size)
                    .wait_timeout(Some(config.connection_timeout))
                    .runtime(Runtime::Tokio1)
                    .build()
            })
            .map_err(|e| LockError::Connection(e.to_string()))?
            .map_err(|e| LockError::Connection(e.to_string()))?;

        Ok(Self {
            pool,
            config: config.clone(),
            owner: uuid::Uuid::new_v4().to_string(),
        })
    }

    /// The owner token written as the value of every lock key.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Obtain a connection from the pool.
    async fn conn(&self) -> Result<deadpool_redis::Connection, LockError> {
        self.pool
            .get()
            .await
            .map_err(|e| LockError::Connection(e.to_string()))
    }

    fn lease_ttl_ms(&self) -> i64 {
        i64::try_from(self.config.lease_ttl.as_millis()).unwrap_or(i64::MAX)
    }

    async fn try_acquire(&self, redis_key: &str) -> Result<bool, LockError> {
        let ttl_ms = self.lease_ttl_ms();

        let mut conn = self.conn().await?;
        let result: i64 = Script::new(scripts::LOCK_ACQUIRE)
            .key(redis_key)
            .arg(&self.owner)
            .arg(ttl_ms)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| LockError::Backend(e.to_string()))?;

        Ok(result == 1)
    }
}

#[async_trait]
impl LockProvider for RedisLockProvider {
    fn provider_type(&self) -> &str {
        "redis"
    }

    async fn acquire(&self, name: &str, timeout: Duration) -> Result<AcquireOutcome, LockError> {
        let redis_key = self.config.lock_key(name);
        let deadline = Instant::now() + timeout;

        loop {
            if self.try_acquire(&redis_key).await? {
                return Ok(AcquireOutcome::Acquired);
            }

            let now = Instant::now();
            if now >= deadline {
                debug!(key = %redis_key, "redis lock still held at deadline");
                return Ok(AcquireOutcome::AlreadyHeld);
            }

            tokio::time::sleep(LOCK_POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    async fn release(&self, name: &str) -> Result<ReleaseOutcome, LockError> {
        let redis_key = self.config.lock_key(name);
        let mut conn = self.conn().await?;

        let result: i64 = Script::new(scripts::LOCK_RELEASE)
            .key(&redis_key)
            .arg(&self.owner)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| LockError::Backend(e.to_string()))?;

        Ok(if result == 1 {
            ReleaseOutcome::Released
        } else {
            ReleaseOutcome::NotHeld
        })
    }

    fn lease_ttl(&self) -> Duration {
        self.config.lease_ttl
    }

    async fn extend(&self, name: &str) -> Result<ExtendOutcome, LockError> {
        let redis_key = self.config.lock_key(name);
        let mut conn = self.conn().await?;

        let result: i64 = Script::new(scripts::LOCK_EXTEND)
            .key(&redis_key)
            .arg(&self.owner)
            .arg(self.lease_ttl_ms())
            .invoke_async(&mut conn)
            .await
            .map_err(|e| LockError::Backend(e.to_string()))?;

        Ok(if result == 1 {
            ExtendOutcome::Extended
        } else {
            debug!(key = %redis_key, "redis lock lost before extend");
            ExtendOutcome::NotHeld
        })
    }
}

impl std::fmt::Debug for RedisLockProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisLockProvider")
            .field("prefix", &self.config.prefix)
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}


#[cfg(all(test, feature = "integration"))]
mod integration_tests {
    use super::*;

    fn test_config() -> RedisConfig {
        RedisConfig {
            url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            prefix: format!("lockgate-test-{}", uuid::Uuid::new_v4()),
            ..RedisConfig::default()
        }
    }

    #[tokio::test]
    async fn provider_conformance() {
        let provider =
            RedisLockProvider::new(&test_config()).expect("pool creation should succeed");
        lockgate_lock::testing::run_provider_conformance_tests(&provider)
            .await
            .expect("conformance tests should pass");
    }

    #[tokio::test]
    async fn second_owner_is_blocked() {
        let config = test_config();
        let first = RedisLockProvider::new(&config).unwrap();
        let second = RedisLockProvider::new(&config).unwrap();

        assert!(first.acquire("shared", Duration::ZERO).await.unwrap().is_acquired());
        assert_eq!(
            second.acquire("shared", Duration::ZERO).await.unwrap(),
            AcquireOutcome::AlreadyHeld
        );
        assert_eq!(second.release("shared").await.unwrap(), ReleaseOutcome::NotHeld);
        assert_eq!(first.release("shared").await.unwrap(), ReleaseOutcome::Released);
    }

    #[tokio::test]
    async fn extend_outlives_original_lease() {
        let config = RedisConfig {
            lease_ttl: Duration::from_millis(300),
            ..test_config()
        };
        let first = RedisLockProvider::new(&config).unwrap();
        let second = RedisLockProvider::new(&config).unwrap();

        assert!(first.acquire("renewed", Duration::ZERO).await.unwrap().is_acquired());
        for _ in 0..3 {
            tokio::time::sleep(Duration::from_millis(150)).await;
            assert!(first.extend("renewed").await.unwrap().is_extended());
        }
        assert_eq!(
            second.acquire("renewed", Duration::ZERO).await.unwrap(),
            AcquireOutcome::AlreadyHeld
        );
        assert_eq!(second.extend("renewed").await.unwrap(), ExtendOutcome::NotHeld);
        assert_eq!(first.release("renewed").await.unwrap(), ReleaseOutcome::Released);
    }
}
