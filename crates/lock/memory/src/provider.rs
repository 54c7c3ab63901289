use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;
use uuid::Uuid;

use lockgate_lock::{AcquireOutcome, ExtendOutcome, LockError, LockProvider, ReleaseOutcome};

/// Lease applied to every lock unless overridden with
/// [`MemoryLockProvider::with_lease_ttl`].
pub const DEFAULT_LEASE_TTL: Duration = Duration::from_secs(30);

/// Retry interval when polling for lock acquisition.
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Internal entry representing a held lock.
#[derive(Debug, Clone)]
struct LockEntry {
    owner: String,
    expires_at: Instant,
}

impl LockEntry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// In-memory [`LockProvider`] backed by a [`DashMap`].
///
/// Every provider instance carries its own owner token; clones share the
/// token, while [`handle`](Self::handle) creates a second owner on the same
/// lock table (useful to simulate another process in tests).
///
/// Lock expiry is lazy: expired entries are evicted on the next acquire
/// attempt for the same lock name.
#[derive(Debug, Clone)]
pub struct MemoryLockProvider {
    locks: Arc<DashMap<String, LockEntry>>,
    owner: String,
    lease_ttl: Duration,
    failing: Arc<AtomicBool>,
}

impl Default for MemoryLockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLockProvider {
    /// Create a new in-memory provider with an empty lock table.
    pub fn new() -> Self {
        Self {
            locks: Arc::new(DashMap::new()),
            owner: Uuid::new_v4().to_string(),
            lease_ttl: DEFAULT_LEASE_TTL,
            failing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Set how long a granted lock stays valid without being released.
    #[must_use]
    pub fn with_lease_ttl(mut self, ttl: Duration) -> Self {
        self.lease_ttl = ttl;
        self
    }

    /// Create a provider that shares this lock table under a different owner.
    pub fn handle(&self) -> Self {
        Self {
            locks: Arc::clone(&self.locks),
            owner: Uuid::new_v4().to_string(),
            lease_ttl: self.lease_ttl,
            failing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make every subsequent call fail with [`LockError::Unavailable`] until
    /// switched back. Shared by clones of this instance.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Return `true` if the named lock is currently held by anyone.
    pub fn is_locked(&self, name: &str) -> bool {
        self.locks.get(name).is_some_and(|entry| !entry.is_expired())
    }

    fn check_available(&self) -> Result<(), LockError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(LockError::Unavailable("memory provider marked failing".into()));
        }
        Ok(())
    }

    fn try_acquire(&self, name: &str) -> bool {
        let key = name.to_owned();

        // Remove expired entries lazily.
        self.locks.remove_if(&key, |_, entry| entry.is_expired());

        match self.locks.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(LockEntry {
                    owner: self.owner.clone(),
                    expires_at: Instant::now() + self.lease_ttl,
                });
                true
            }
        }
    }
}

#[async_trait]
impl LockProvider for MemoryLockProvider {
    fn provider_type(&self) -> &str {
        "memory"
    }

    async fn acquire(&self, name: &str, timeout: Duration) -> Result<AcquireOutcome, LockError> {
        let deadline = Instant::now() + timeout;

        loop {
            self.check_available()?;

            if self.try_acquire(name) {
                return Ok(AcquireOutcome::Acquired);
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(AcquireOutcome::AlreadyHeld);
            }

            tokio::time::sleep(LOCK_POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    async fn release(&self, name: &str) -> Result<ReleaseOutcome, LockError> {
        self.check_available()?;

        // Only remove if we are still the owner and the lease is live.
        let removed = self
            .locks
            .remove_if(name, |_, entry| entry.owner == self.owner && !entry.is_expired());

        Ok(if removed.is_some() {
            ReleaseOutcome::Released
        } else {
            ReleaseOutcome::NotHeld
        })
    }

    fn lease_ttl(&self) -> Duration {
        self.lease_ttl
    }

    async fn extend(&self, name: &str) -> Result<ExtendOutcome, LockError> {
        self.check_available()?;

        let Some(mut entry) = self.locks.get_mut(name) else {
            return Ok(ExtendOutcome::NotHeld);
        };
        if entry.owner != self.owner || entry.is_expired() {
            return Ok(ExtendOutcome::NotHeld);
        }
        entry.expires_at = Instant::now() + self.lease_ttl;
        Ok(ExtendOutcome::Extended)
    }
}
