use lockgate_lock::ReleaseOutcome;

use crate::backend::Backend;
use crate::coordinator::LockCoordinator;
use crate::events::LockEvent;

impl LockCoordinator {
    /// Release the named lock.
    ///
    /// A tracked lock is released only on the backend that granted it, and
    /// the ownership entry is dropped whatever the outcome. An untracked lock
    /// (e.g. acquired before a restart) is released on every backend; the
    /// result is `true` if any of them held it.
    ///
    /// Release is not gated by circuit breakers: a lock must be given back
    /// where it lives even if that backend has since been marked unhealthy.
    pub async fn release(&self, name: &str) -> bool {
        // Drop the entry before the call so a concurrent re-acquisition that
        // lands while we wait is not erased afterwards.
        match self.ownership.remove(name) {
            Some(index) => match self.backends.get(index) {
                Some(backend) => self.release_on(name, index, backend).await,
                None => self.release_everywhere(name).await,
            },
            None => self.release_everywhere(name).await,
        }
    }

    async fn release_everywhere(&self, name: &str) -> bool {
        let mut released = false;

        for (index, backend) in self.backends.iter().enumerate() {
            released |= self.release_on(name, index, backend).await;
        }

        self.emit(&LockEvent::ReleaseSwept {
            lock: name,
            released,
        });
        released
    }

    async fn release_on(&self, name: &str, index: usize, backend: &Backend) -> bool {
        let provider = backend.provider_type();

        match backend.provider().release(name).await {
            Ok(ReleaseOutcome::Released) => {
                backend.breaker().record_success();
                self.emit(&LockEvent::Released {
                    lock: name,
                    backend: index,
                    provider,
                });
                true
            }
            Ok(ReleaseOutcome::NotHeld) => {
                backend.breaker().record_success();
                self.emit(&LockEvent::ReleaseNotHeld {
                    lock: name,
                    backend: index,
                    provider,
                });
                false
            }
            Err(error) => {
                backend.breaker().record_failure();
                self.emit(&LockEvent::ReleaseFailed {
                    lock: name,
                    backend: index,
                    provider,
                    error: &error,
                });
                false
            }
        }
    }
}
