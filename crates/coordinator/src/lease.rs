use std::time::Duration;

use lockgate_lock::ExtendOutcome;

use crate::coordinator::LockCoordinator;
use crate::events::LockEvent;

impl LockCoordinator {
    /// Push back the lease on a lock this coordinator holds.
    ///
    /// Only the backend that granted the lock is asked. Returns `false` for
    /// an untracked lock, when the backend no longer holds it for us, or when
    /// the backend errored. A lost lock is forgotten; after an error the
    /// entry is kept so the caller can try again before the lease runs out.
    ///
    /// Like release, extension is not gated by the circuit breaker.
    pub async fn extend(&self, name: &str) -> bool {
        let Some(index) = self.ownership.get(name) else {
            return false;
        };
        let Some(backend) = self.backends.get(index) else {
            return false;
        };
        let provider = backend.provider_type();

        match backend.provider().extend(name).await {
            Ok(ExtendOutcome::Extended) => {
                backend.breaker().record_success();
                self.emit(&LockEvent::Extended {
                    lock: name,
                    backend: index,
                    provider,
                });
                true
            }
            Ok(ExtendOutcome::NotHeld) => {
                backend.breaker().record_success();
                self.ownership.remove_if_owned_by(name, index);
                self.emit(&LockEvent::ExtendNotHeld {
                    lock: name,
                    backend: index,
                    provider,
                });
                false
            }
            Err(error) => {
                backend.breaker().record_failure();
                self.emit(&LockEvent::ExtendFailed {
                    lock: name,
                    backend: index,
                    provider,
                    error: &error,
                });
                false
            }
        }
    }

    /// Lease granted by the backend holding `name`, or `None` if the lock is
    /// not tracked.
    pub fn lease_ttl(&self, name: &str) -> Option<Duration> {
        let index = self.ownership.get(name)?;
        self.backends
            .get(index)
            .map(|backend| backend.provider().lease_ttl())
    }

    /// Whether this coordinator believes it holds `name`.
    pub fn holds(&self, name: &str) -> bool {
        self.ownership.get(name).is_some()
    }
}
