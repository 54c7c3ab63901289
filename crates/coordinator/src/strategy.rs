use std::time::Duration;

use serde::Deserialize;

use lockgate_breaker::CircuitBreaker;
use lockgate_lock::AcquireOutcome;

use crate::backend::Backend;
use crate::coordinator::LockCoordinator;
use crate::events::LockEvent;

/// How the attempt budget is spread over the backends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryStrategy {
    /// Spend each backend's own `retries` before moving to the next one.
    #[default]
    PerBackend,
    /// Sweep the backends round-robin, one attempt each, until the global
    /// retry limit is spent.
    Global,
}

impl std::fmt::Display for RetryStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PerBackend => write!(f, "per_backend"),
            Self::Global => write!(f, "global"),
        }
    }
}

/// Outcome of a single provider call, after breaker bookkeeping.
enum Attempt {
    Granted,
    Denied,
}

/// A request the backend's breaker let through.
///
/// Must be settled with an outcome. Dropped unsettled (the acquire future
/// was cancelled mid-call) it tells the breaker, so a half-open trial slot
/// is not held forever.
struct Admission<'a> {
    breaker: &'a dyn CircuitBreaker,
    settled: bool,
}

impl<'a> Admission<'a> {
    fn new(breaker: &'a dyn CircuitBreaker) -> Self {
        Self {
            breaker,
            settled: false,
        }
    }

    fn succeeded(mut self) {
        self.settled = true;
        self.breaker.record_success();
    }

    fn failed(mut self) {
        self.settled = true;
        self.breaker.record_failure();
    }
}

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.record_cancelled();
        }
    }
}

impl LockCoordinator {
    /// Per-backend strategy: walk the list once, giving each admitted backend
    /// up to `retries` attempts.
    ///
    /// A failed attempt counts against the budget like a contended one, but
    /// the backend is abandoned as soon as its breaker stops admitting
    /// requests.
    pub(crate) async fn acquire_per_backend(&self, name: &str, timeout: Duration) -> bool {
        let mut attempts = 0;

        for (index, backend) in self.backends.iter().enumerate() {
            for attempt in 1..=backend.retries() {
                if attempt > 1 {
                    tokio::time::sleep(backend.retry_delay()).await;
                }
                let Some(admission) = self.admit(name, index, backend) else {
                    break;
                };

                attempts += 1;
                if let Attempt::Granted = self
                    .attempt(admission, name, timeout, index, backend, attempt)
                    .await
                {
                    return true;
                }
            }
        }

        self.emit(&LockEvent::Exhausted {
            lock: name,
            attempts,
        });
        false
    }

    /// Global strategy: one attempt per admitted backend per sweep, all
    /// drawing from `global_retry_limit`.
    ///
    /// A sweep in which every breaker rejected the request ends the loop;
    /// skipped backends never consume attempts.
    pub(crate) async fn acquire_global(&self, name: &str, timeout: Duration) -> bool {
        let limit = self.global_retry_limit;
        let mut attempts = 0;

        loop {
            let mut attempted = false;

            for (index, backend) in self.backends.iter().enumerate() {
                let Some(admission) = self.admit(name, index, backend) else {
                    continue;
                };

                attempted = true;
                attempts += 1;
                if let Attempt::Granted = self
                    .attempt(admission, name, timeout, index, backend, attempts)
                    .await
                {
                    return true;
                }

                if attempts >= limit {
                    self.emit(&LockEvent::Exhausted {
                        lock: name,
                        attempts,
                    });
                    return false;
                }
                tokio::time::sleep(backend.retry_delay()).await;
            }

            if !attempted {
                self.emit(&LockEvent::Exhausted {
                    lock: name,
                    attempts,
                });
                return false;
            }
        }
    }

    /// Ask the backend's breaker for permission, reporting a skip if denied.
    fn admit<'b>(&self, name: &str, index: usize, backend: &'b Backend) -> Option<Admission<'b>> {
        let breaker = backend.breaker();
        if breaker.allows_request() {
            return Some(Admission::new(breaker));
        }
        self.emit(&LockEvent::BackendSkipped {
            lock: name,
            backend: index,
            provider: backend.provider_type(),
            state: breaker.state(),
        });
        None
    }

    /// Call the provider once and settle breaker and ownership bookkeeping.
    ///
    /// Any answer from the provider, including "held elsewhere", counts as a
    /// breaker success; only errors count as failures.
    async fn attempt(
        &self,
        admission: Admission<'_>,
        name: &str,
        timeout: Duration,
        index: usize,
        backend: &Backend,
        attempt: u32,
    ) -> Attempt {
        let provider = backend.provider_type();

        match backend.provider().acquire(name, timeout).await {
            Ok(AcquireOutcome::Acquired) => {
                admission.succeeded();
                self.ownership.insert(name, index);
                self.emit(&LockEvent::Acquired {
                    lock: name,
                    backend: index,
                    provider,
                    attempt,
                });
                Attempt::Granted
            }
            Ok(AcquireOutcome::AlreadyHeld) => {
                admission.succeeded();
                self.emit(&LockEvent::AlreadyHeld {
                    lock: name,
                    backend: index,
                    provider,
                    attempt,
                });
                Attempt::Denied
            }
            Err(error) => {
                admission.failed();
                self.emit(&LockEvent::AcquireFailed {
                    lock: name,
                    backend: index,
                    provider,
                    attempt,
                    error: &error,
                });
                Attempt::Denied
            }
        }
    }
}
