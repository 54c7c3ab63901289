use thiserror::Error;

/// Infrastructure failures raised by a lock provider.
///
/// Contention is not an error: a lock held elsewhere is reported as
/// [`AcquireOutcome::AlreadyHeld`](crate::AcquireOutcome::AlreadyHeld).
#[derive(Debug, Error)]
pub enum LockError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("provider unavailable: {0}")]
    Unavailable(String),
}
