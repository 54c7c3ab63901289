use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::events::{EventSink, LockEvent};

/// Atomic counters tracking coordinator outcomes.
///
/// All counters use relaxed ordering. For a consistent point-in-time view,
/// call [`snapshot`](Self::snapshot).
#[derive(Debug, Default)]
pub struct CoordinatorMetrics {
    /// Acquisitions granted by some backend.
    pub acquired: AtomicU64,
    /// Acquisitions that ran out of backends or attempts.
    pub exhausted: AtomicU64,
    /// Attempts answered with "held elsewhere".
    pub contended: AtomicU64,
    /// Provider errors during acquire.
    pub acquire_errors: AtomicU64,
    /// Backends passed over because their breaker rejected the request.
    pub backends_skipped: AtomicU64,
    /// Locks released on some backend.
    pub released: AtomicU64,
    /// Provider errors during release.
    pub release_errors: AtomicU64,
    /// Releases of untracked locks that swept every backend.
    pub release_sweeps: AtomicU64,
    /// Leases pushed back by the owning backend.
    pub extended: AtomicU64,
    /// Extensions that found the lock gone.
    pub leases_lost: AtomicU64,
    /// Provider errors during extend.
    pub extend_errors: AtomicU64,
}

impl CoordinatorMetrics {
    /// Take a point-in-time snapshot of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            acquired: self.acquired.load(Ordering::Relaxed),
            exhausted: self.exhausted.load(Ordering::Relaxed),
            contended: self.contended.load(Ordering::Relaxed),
            acquire_errors: self.acquire_errors.load(Ordering::Relaxed),
            backends_skipped: self.backends_skipped.load(Ordering::Relaxed),
            released: self.released.load(Ordering::Relaxed),
            release_errors: self.release_errors.load(Ordering::Relaxed),
            release_sweeps: self.release_sweeps.load(Ordering::Relaxed),
            extended: self.extended.load(Ordering::Relaxed),
            leases_lost: self.leases_lost.load(Ordering::Relaxed),
            extend_errors: self.extend_errors.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

impl EventSink for CoordinatorMetrics {
    fn emit(&self, event: &LockEvent<'_>) {
        match event {
            LockEvent::BackendSkipped { .. } => Self::bump(&self.backends_skipped),
            LockEvent::Acquired { .. } => Self::bump(&self.acquired),
            LockEvent::AlreadyHeld { .. } => Self::bump(&self.contended),
            LockEvent::AcquireFailed { .. } => Self::bump(&self.acquire_errors),
            LockEvent::Exhausted { .. } => Self::bump(&self.exhausted),
            LockEvent::Released { .. } => Self::bump(&self.released),
            LockEvent::ReleaseFailed { .. } => Self::bump(&self.release_errors),
            LockEvent::ReleaseSwept { .. } => Self::bump(&self.release_sweeps),
            LockEvent::Extended { .. } => Self::bump(&self.extended),
            LockEvent::ExtendNotHeld { .. } => Self::bump(&self.leases_lost),
            LockEvent::ExtendFailed { .. } => Self::bump(&self.extend_errors),
            LockEvent::ReleaseNotHeld { .. } => {}
        }
    }
}

/// Plain-value copy of [`CoordinatorMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub acquired: u64,
    pub exhausted: u64,
    pub contended: u64,
    pub acquire_errors: u64,
    pub backends_skipped: u64,
    pub released: u64,
    pub release_errors: u64,
    pub release_sweeps: u64,
    pub extended: u64,
    pub leases_lost: u64,
    pub extend_errors: u64,
}
