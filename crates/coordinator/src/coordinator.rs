use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;

use crate::backend::Backend;
use crate::builder::CoordinatorBuilder;
use crate::config::CoordinatorConfig;
use crate::error::CoordinatorError;
use crate::events::{EventSink, LockEvent};
use crate::factory::ProviderFactory;
use crate::metrics::{CoordinatorMetrics, MetricsSnapshot};
use crate::ownership::OwnershipTable;
use crate::strategy::RetryStrategy;

/// Distributed lock front-end over an ordered list of backends.
///
/// Share it between tasks through an `Arc`; every method takes `&self`.
/// `acquire` and `release` always resolve to a boolean: provider errors are
/// recorded on the failing backend's breaker and never reach the caller.
pub struct LockCoordinator {
    pub(crate) backends: Vec<Backend>,
    pub(crate) strategy: RetryStrategy,
    pub(crate) global_retry_limit: u32,
    pub(crate) ownership: OwnershipTable,
    pub(crate) sink: Arc<dyn EventSink>,
    pub(crate) metrics: Arc<CoordinatorMetrics>,
}

impl LockCoordinator {
    pub fn builder() -> CoordinatorBuilder {
        CoordinatorBuilder::new()
    }

    /// Build a coordinator from configuration, instantiating each backend's
    /// provider through `factory`.
    pub fn from_config(
        config: &CoordinatorConfig,
        factory: &ProviderFactory,
    ) -> Result<Self, CoordinatorError> {
        CoordinatorBuilder::from_config(config, factory)?.build()
    }

    /// Try to take the named lock on the first backend that grants it.
    ///
    /// `timeout` is handed to every provider call unchanged; retry delays
    /// come on top of it. Returns `false` when no backend granted the lock.
    pub async fn acquire(&self, name: &str, timeout: Duration) -> bool {
        match self.strategy {
            RetryStrategy::PerBackend => self.acquire_per_backend(name, timeout).await,
            RetryStrategy::Global => self.acquire_global(name, timeout).await,
        }
    }

    /// Acquire `name`, run `f`, then release.
    ///
    /// Returns `None` without running `f` if the lock was not granted. If `f`
    /// panics the lock is released before the panic resumes.
    ///
    /// Dropping the returned future while `f` runs skips the release; the lock
    /// then stays held until its lease expires or [`release`](Self::release)
    /// is called for it.
    pub async fn with_lock<F, Fut, R>(&self, name: &str, timeout: Duration, f: F) -> Option<R>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = R>,
    {
        if !self.acquire(name, timeout).await {
            return None;
        }
        let outcome = AssertUnwindSafe(async { f().await }).catch_unwind().await;
        self.release(name).await;
        match outcome {
            Ok(result) => Some(result),
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    pub fn strategy(&self) -> RetryStrategy {
        self.strategy
    }

    /// Attempt budget shared across backends by [`RetryStrategy::Global`].
    pub fn global_retry_limit(&self) -> u32 {
        self.global_retry_limit
    }

    pub fn backends(&self) -> &[Backend] {
        &self.backends
    }

    /// Number of configured backends (always at least one).
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub(crate) fn emit(&self, event: &LockEvent<'_>) {
        self.metrics.emit(event);
        self.sink.emit(event);
    }
}

impl std::fmt::Debug for LockCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockCoordinator")
            .field("backends", &self.backends)
            .field("strategy", &self.strategy)
            .field("global_retry_limit", &self.global_retry_limit)
            .field("held_locks", &self.ownership.len())
            .finish_non_exhaustive()
    }
}
