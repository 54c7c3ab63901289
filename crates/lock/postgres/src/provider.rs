use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::OnceCell;
use tokio::time::Instant;
use tracing::debug;

use lockgate_lock::{AcquireOutcome, ExtendOutcome, LockError, LockProvider, ReleaseOutcome};

use crate::config::PostgresConfig;
use crate::migrations;

/// Retry interval when polling for lock acquisition.
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// PostgreSQL-backed implementation of [`LockProvider`].
///
/// Uses row-based locking in the `{prefix}locks` table. Expired locks are
/// cleaned up before each acquire attempt so stale entries do not block new
/// acquisitions. Each provider instance writes its own owner token, and
/// release only deletes rows carrying that token.
pub struct PostgresLockProvider {
    pool: PgPool,
    config: PostgresConfig,
    owner: String,
    schema_ready: OnceCell<()>,
}

impl PostgresLockProvider {
    /// Connect to `PostgreSQL` and run migrations.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Connection`] if pool creation fails, or
    /// [`LockError::Backend`] if migrations fail.
    pub async fn new(config: PostgresConfig) -> Result<Self, LockError> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(config.pool_size)
            .connect_with(config.connect_options()?)
            .await
            .map_err(|e| LockError::Connection(e.to_string()))?;

        let provider = Self::from_pool(pool, config);
        provider.ensure_schema().await?;
        Ok(provider)
    }

    /// Build a provider whose pool connects on first use.
    ///
    /// Migrations run before the first lock operation, so a database that is
    /// down at startup shows up as provider errors (and trips the breaker)
    /// instead of failing construction.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Connection`] if the connection options are invalid.
    pub fn connect_lazy(config: PostgresConfig) -> Result<Self, LockError> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(config.pool_size)
            .connect_lazy_with(config.connect_options()?);
        Ok(Self::from_pool(pool, config))
    }

    /// Build a provider on an existing pool. Migrations run lazily.
    pub fn from_pool(pool: PgPool, config: PostgresConfig) -> Self {
        Self {
            pool,
            config,
            owner: uuid::Uuid::new_v4().to_string(),
            schema_ready: OnceCell::new(),
        }
    }

    /// The owner token stored with every lock row.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    async fn ensure_schema(&self) -> Result<(), LockError> {
        self.schema_ready
            .get_or_try_init(|| async {
                migrations::run_migrations(&self.pool, &self.config)
                    .await
                    .map_err(|e| LockError::Backend(e.to_string()))
            })
            .await?;
        Ok(())
    }

    /// Remove expired lock entries from the locks table.
    async fn clean_expired_locks(&self) -> Result<(), LockError> {
        let table = self.config.locks_table();
        let query = format!("DELETE FROM {table} WHERE expires_at <= NOW()");

        sqlx::query(&query)
            .execute(&self.pool)
            .await
            .map_err(|e| LockError::Backend(e.to_string()))?;

        Ok(())
    }

    async fn try_acquire(&self, name: &str) -> Result<bool, LockError> {
        self.clean_expired_locks().await?;

        let table = self.config.locks_table();
        let expires_at = chrono::Utc::now() + self.config.lease_ttl;

        let query = format!(
            "INSERT INTO {table} (name, owner, expires_at) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (name) DO NOTHING"
        );

        let result = sqlx::query(&query)
            .bind(name)
            .bind(&self.owner)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(|e| LockError::Backend(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl LockProvider for PostgresLockProvider {
    fn provider_type(&self) -> &str {
        "postgres"
    }

    async fn acquire(&self, name: &str, timeout: Duration) -> Result<AcquireOutcome, LockError> {
        self.ensure_schema().await?;
        let deadline = Instant::now() + timeout;

        loop {
            if self.try_acquire(name).await? {
                return Ok(AcquireOutcome::Acquired);
            }

            let now = Instant::now();
            if now >= deadline {
                debug!(lock = %name, "postgres lock still held at deadline");
                return Ok(AcquireOutcome::AlreadyHeld);
            }

            tokio::time::sleep(LOCK_POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    async fn release(&self, name: &str) -> Result<ReleaseOutcome, LockError> {
        self.ensure_schema().await?;
        let table = self.config.locks_table();

        let query =
            format!("DELETE FROM {table} WHERE name = $1 AND owner = $2 AND expires_at > NOW()");

        let result = sqlx::query(&query)
            .bind(name)
            .bind(&self.owner)
            .execute(&self.pool)
            .await
            .map_err(|e| LockError::Backend(e.to_string()))?;

        Ok(if result.rows_affected() > 0 {
            ReleaseOutcome::Released
        } else {
            ReleaseOutcome::NotHeld
        })
    }

    fn lease_ttl(&self) -> Duration {
        self.config.lease_ttl
    }

    async fn extend(&self, name: &str) -> Result<ExtendOutcome, LockError> {
        self.ensure_schema().await?;
        let table = self.config.locks_table();
        let expires_at = chrono::Utc::now() + self.config.lease_ttl;

        let query = format!(
            "UPDATE {table} SET expires_at = $3 \
             WHERE name = $1 AND owner = $2 AND expires_at > NOW()"
        );

        let result = sqlx::query(&query)
            .bind(name)
            .bind(&self.owner)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(|e| LockError::Backend(e.to_string()))?;

        if result.rows_affected() > 0 {
            Ok(ExtendOutcome::Extended)
        } else {
            debug!(lock = %name, "postgres lock lost before extend");
            Ok(ExtendOutcome::NotHeld)
        }
    }
}

impl std::fmt::Debug for PostgresLockProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresLockProvider")
            .field("table", &self.config.locks_table())
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lazy_provider_builds_without_database() {
        let provider = PostgresLockProvider::connect_lazy(PostgresConfig::default())
            .expect("lazy pool should build");
        assert_eq!(provider.provider_type(), "postgres");
        assert!(!provider.owner().is_empty());
        assert_eq!(provider.lease_ttl(), PostgresConfig::default().lease_ttl);
    }

    #[tokio::test]
    async fn lazy_provider_rejects_bad_ssl_mode() {
        let config = PostgresConfig {
            ssl_mode: Some("bogus".into()),
            ..PostgresConfig::default()
        };
        assert!(PostgresLockProvider::connect_lazy(config).is_err());
    }
}
