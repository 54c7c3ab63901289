//! Observer hooks for coordinator activity.
//!
//! The coordinator never logs directly; it reports a [`LockEvent`] for each
//! decision to an [`EventSink`]. [`TracingEventSink`] (the default) turns
//! them into `tracing` events.

use lockgate_breaker::CircuitState;
use lockgate_lock::LockError;
use tracing::{debug, info, warn};

/// Something the coordinator did while acquiring or releasing a lock.
#[derive(Debug)]
pub enum LockEvent<'a> {
    /// A backend was passed over because its breaker rejected the request.
    BackendSkipped {
        lock: &'a str,
        backend: usize,
        provider: &'a str,
        state: CircuitState,
    },
    /// A backend granted the lock.
    Acquired {
        lock: &'a str,
        backend: usize,
        provider: &'a str,
        attempt: u32,
    },
    /// A backend answered that the lock is held elsewhere.
    AlreadyHeld {
        lock: &'a str,
        backend: usize,
        provider: &'a str,
        attempt: u32,
    },
    /// A backend failed while trying to acquire.
    AcquireFailed {
        lock: &'a str,
        backend: usize,
        provider: &'a str,
        attempt: u32,
        error: &'a LockError,
    },
    /// No backend granted the lock.
    Exhausted { lock: &'a str, attempts: u32 },
    /// A backend released the lock.
    Released {
        lock: &'a str,
        backend: usize,
        provider: &'a str,
    },
    /// A backend answered that it held nothing under that name.
    ReleaseNotHeld {
        lock: &'a str,
        backend: usize,
        provider: &'a str,
    },
    /// A backend failed while trying to release.
    ReleaseFailed {
        lock: &'a str,
        backend: usize,
        provider: &'a str,
        error: &'a LockError,
    },
    /// A release for an untracked lock was tried on every backend.
    ReleaseSwept { lock: &'a str, released: bool },
    /// The owning backend pushed back the lease.
    Extended {
        lock: &'a str,
        backend: usize,
        provider: &'a str,
    },
    /// The owning backend no longer holds the lock for us.
    ExtendNotHeld {
        lock: &'a str,
        backend: usize,
        provider: &'a str,
    },
    /// The owning backend failed while extending the lease.
    ExtendFailed {
        lock: &'a str,
        backend: usize,
        provider: &'a str,
        error: &'a LockError,
    },
}

/// Receives coordinator events. Must be cheap; it runs inline with lock
/// operations.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &LockEvent<'_>);
}

/// Sink that logs every event through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: &LockEvent<'_>) {
        match *event {
            LockEvent::BackendSkipped {
                lock,
                backend,
                provider,
                state,
            } => warn!(lock, backend, provider, %state, "breaker rejected request, skipping"),
            LockEvent::Acquired {
                lock,
                backend,
                provider,
                attempt,
            } => info!(lock, backend, provider, attempt, "lock acquired"),
            LockEvent::AlreadyHeld {
                lock,
                backend,
                provider,
                attempt,
            } => debug!(lock, backend, provider, attempt, "lock held elsewhere"),
            LockEvent::AcquireFailed {
                lock,
                backend,
                provider,
                attempt,
                error,
            } => warn!(lock, backend, provider, attempt, %error, "backend failed to acquire lock"),
            LockEvent::Exhausted { lock, attempts } => {
                warn!(lock, attempts, "no backend granted lock");
            }
            LockEvent::Released {
                lock,
                backend,
                provider,
            } => info!(lock, backend, provider, "lock released"),
            LockEvent::ReleaseNotHeld {
                lock,
                backend,
                provider,
            } => debug!(lock, backend, provider, "backend held nothing to release"),
            LockEvent::ReleaseFailed {
                lock,
                backend,
                provider,
                error,
            } => warn!(lock, backend, provider, %error, "backend failed to release lock"),
            LockEvent::ReleaseSwept { lock, released } => {
                info!(lock, released, "released untracked lock across all backends");
            }
            LockEvent::Extended {
                lock,
                backend,
                provider,
            } => debug!(lock, backend, provider, "lock lease extended"),
            LockEvent::ExtendNotHeld {
                lock,
                backend,
                provider,
            } => warn!(lock, backend, provider, "lock lost before its lease was extended"),
            LockEvent::ExtendFailed {
                lock,
                backend,
                provider,
                error,
            } => warn!(lock, backend, provider, %error, "backend failed to extend lock lease"),
        }
    }
}

/// Sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&self, _event: &LockEvent<'_>) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_events(error: &LockError) -> Vec<LockEvent<'_>> {
        vec![
            LockEvent::BackendSkipped {
                lock: "l",
                backend: 0,
                provider: "memory",
                state: CircuitState::Open,
            },
            LockEvent::Acquired {
                lock: "l",
                backend: 0,
                provider: "memory",
                attempt: 1,
            },
            LockEvent::AlreadyHeld {
                lock: "l",
                backend: 0,
                provider: "memory",
                attempt: 1,
            },
            LockEvent::AcquireFailed {
                lock: "l",
                backend: 0,
                provider: "memory",
                attempt: 1,
                error,
            },
            LockEvent::Exhausted {
                lock: "l",
                attempts: 3,
            },
            LockEvent::Released {
                lock: "l",
                backend: 0,
                provider: "memory",
            },
            LockEvent::ReleaseNotHeld {
                lock: "l",
                backend: 0,
                provider: "memory",
            },
            LockEvent::ReleaseFailed {
                lock: "l",
                backend: 0,
                provider: "memory",
                error,
            },
            LockEvent::ReleaseSwept {
                lock: "l",
                released: true,
            },
            LockEvent::Extended {
                lock: "l",
                backend: 0,
                provider: "memory",
            },
            LockEvent::ExtendNotHeld {
                lock: "l",
                backend: 0,
                provider: "memory",
            },
            LockEvent::ExtendFailed {
                lock: "l",
                backend: 0,
                provider: "memory",
                error,
            },
        ]
    }

    #[test]
    fn builtin_sinks_accept_every_event() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let error = LockError::Backend("boom".into());
        for event in all_events(&error) {
            TracingEventSink.emit(&event);
            NoopEventSink.emit(&event);
        }
    }

    #[test]
    fn sinks_are_object_safe() {
        let sinks: Vec<Box<dyn EventSink>> =
            vec![Box::new(TracingEventSink), Box::new(NoopEventSink)];
        let error = LockError::Timeout(std::time::Duration::from_secs(1));
        for sink in &sinks {
            sink.emit(&LockEvent::AcquireFailed {
                lock: "l",
                backend: 1,
                provider: "redis",
                attempt: 2,
                error: &error,
            });
        }
    }
}
