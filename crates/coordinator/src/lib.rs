//! Resilient distributed-lock coordinator.
//!
//! A [`LockCoordinator`] fronts an ordered list of lock providers, each with
//! its own retry policy and circuit breaker. Acquisition walks the list in
//! priority order, skipping backends whose breaker is open; release is routed
//! back to the backend that granted the lock.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use lockgate_coordinator::{BackendSpec, LockCoordinator, RetryStrategy};
//! use lockgate_lock_memory::MemoryLockProvider;
//!
//! # async fn run() -> Result<(), lockgate_coordinator::CoordinatorError> {
//! let coordinator = LockCoordinator::builder()
//!     .backend(BackendSpec::new(Arc::new(MemoryLockProvider::new())).retries(3))
//!     .strategy(RetryStrategy::PerBackend)
//!     .build()?;
//!
//! if coordinator.acquire("invoices", Duration::from_secs(5)).await {
//!     // Critical section...
//!     coordinator.release("invoices").await;
//! }
//! # Ok(())
//! # }
//! ```

mod backend;
pub mod builder;
pub mod config;
mod coordinator;
pub mod error;
pub mod events;
pub mod factory;
mod lease;
pub mod metrics;
mod ownership;
mod release;
mod status;
mod strategy;

pub use backend::{Backend, BackendSpec};
pub use builder::CoordinatorBuilder;
pub use config::{BackendConfig, BreakerOverrides, CoordinatorConfig};
pub use coordinator::LockCoordinator;
pub use error::CoordinatorError;
pub use events::{EventSink, LockEvent, NoopEventSink, TracingEventSink};
pub use factory::ProviderFactory;
pub use metrics::{CoordinatorMetrics, MetricsSnapshot};
pub use ownership::OwnershipTable;
pub use status::BackendStatus;
pub use strategy::RetryStrategy;

pub use lockgate_breaker::{BreakerStats, CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use lockgate_lock::{AcquireOutcome, ExtendOutcome, LockError, LockProvider, ReleaseOutcome};
