use thiserror::Error;

/// Errors raised while building a [`LockCoordinator`](crate::LockCoordinator).
///
/// Lock operations themselves never fail: provider errors are absorbed by
/// the circuit breakers and surface as a `false` result.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// The coordinator was misconfigured (no backends, missing provider, ...).
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl CoordinatorError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}
