use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::LockError;

/// Result of a successful round-trip to a provider's acquire operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquireOutcome {
    /// The lock is now held by this provider instance.
    Acquired,
    /// Somebody else holds the lock and it did not free up within the timeout.
    AlreadyHeld,
}

impl AcquireOutcome {
    pub fn is_acquired(self) -> bool {
        matches!(self, Self::Acquired)
    }
}

/// Result of a successful round-trip to a provider's release operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseOutcome {
    /// A lock held by this provider instance was removed.
    Released,
    /// Nothing owned by this provider instance was held under that name.
    NotHeld,
}

impl ReleaseOutcome {
    pub fn is_released(self) -> bool {
        matches!(self, Self::Released)
    }
}

/// Result of a successful round-trip to a provider's extend operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtendOutcome {
    /// The lease was renewed for another [`LockProvider::lease_ttl`].
    Extended,
    /// The lease had already expired or belongs to another owner.
    NotHeld,
}

impl ExtendOutcome {
    pub fn is_extended(self) -> bool {
        matches!(self, Self::Extended)
    }
}

/// Capability contract for a lock backend.
///
/// Implementations separate contention from infrastructure failure:
/// `Ok(AlreadyHeld)` / `Ok(NotHeld)` are normal outcomes, `Err` means the
/// backend itself could not answer.
#[async_trait]
pub trait LockProvider: Send + Sync {
    /// Short identifier of the provider kind (e.g. `"redis"`).
    fn provider_type(&self) -> &str;

    /// Try to take the named lock, waiting up to `timeout` for it to become
    /// free. How the wait is performed is up to the provider.
    async fn acquire(&self, name: &str, timeout: Duration) -> Result<AcquireOutcome, LockError>;

    /// Release the named lock if this provider instance holds it.
    async fn release(&self, name: &str) -> Result<ReleaseOutcome, LockError>;

    /// How long a granted lock stays valid without being extended.
    fn lease_ttl(&self) -> Duration;

    /// Renew the lease on a lock this provider instance still holds, so it
    /// stays valid for another [`lease_ttl`](Self::lease_ttl).
    async fn extend(&self, name: &str) -> Result<ExtendOutcome, LockError>;
}
