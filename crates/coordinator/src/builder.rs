use std::sync::Arc;

use lockgate_breaker::{CircuitBreakerConfig, WindowedCircuitBreaker};

use crate::backend::{Backend, BackendSpec};
use crate::config::CoordinatorConfig;
use crate::coordinator::LockCoordinator;
use crate::error::CoordinatorError;
use crate::events::{EventSink, TracingEventSink};
use crate::factory::ProviderFactory;
use crate::metrics::CoordinatorMetrics;
use crate::ownership::OwnershipTable;
use crate::strategy::RetryStrategy;

/// Fluent builder for constructing a [`LockCoordinator`].
///
/// At least one backend with a provider must be supplied. Everything else has
/// defaults: per-backend strategy, a global retry limit of 10, and a
/// [`TracingEventSink`].
pub struct CoordinatorBuilder {
    backends: Vec<BackendSpec>,
    strategy: RetryStrategy,
    global_retry_limit: u32,
    sink: Option<Arc<dyn EventSink>>,
}

impl CoordinatorBuilder {
    /// Create a new builder with no backends.
    pub fn new() -> Self {
        Self {
            backends: Vec::new(),
            strategy: RetryStrategy::default(),
            global_retry_limit: 10,
            sink: None,
        }
    }

    /// Prepare a builder from configuration, instantiating providers through
    /// `factory`. Validation happens in [`build`](Self::build).
    pub fn from_config(
        config: &CoordinatorConfig,
        factory: &ProviderFactory,
    ) -> Result<Self, CoordinatorError> {
        let mut builder = Self::new()
            .strategy(config.strategy)
            .global_retry_limit(config.global_retry_limit);

        for (index, entry) in config.backends.iter().enumerate() {
            let provider_type = entry
                .provider
                .as_deref()
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .ok_or_else(|| {
                    CoordinatorError::config(format!("backend {index} has no lock provider"))
                })?;

            let provider = factory.create(provider_type, &entry.options)?;

            builder = builder.backend(
                BackendSpec::new(provider)
                    .retries(entry.retries)
                    .retry_delay(entry.retry_delay())
                    .breaker_config(entry.circuit_breaker.apply(CircuitBreakerConfig::default())),
            );
        }

        Ok(builder)
    }

    /// Append a backend. Order defines priority.
    #[must_use]
    pub fn backend(mut self, spec: BackendSpec) -> Self {
        self.backends.push(spec);
        self
    }

    #[must_use]
    pub fn strategy(mut self, strategy: RetryStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the attempt budget used by [`RetryStrategy::Global`].
    #[must_use]
    pub fn global_retry_limit(mut self, limit: u32) -> Self {
        self.global_retry_limit = limit;
        self
    }

    /// Set where coordinator events are reported.
    #[must_use]
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Validate the configuration and build the coordinator.
    pub fn build(self) -> Result<LockCoordinator, CoordinatorError> {
        if self.backends.is_empty() {
            return Err(CoordinatorError::config("at least one backend is required"));
        }

        if self.global_retry_limit < 1 {
            return Err(CoordinatorError::config("global_retry_limit must be >= 1"));
        }

        let mut backends = Vec::with_capacity(self.backends.len());
        for (index, spec) in self.backends.into_iter().enumerate() {
            let provider = spec.provider.ok_or_else(|| {
                CoordinatorError::config(format!("backend {index} has no lock provider"))
            })?;

            if spec.retries < 1 {
                return Err(CoordinatorError::config(format!(
                    "backend {index}: retries must be >= 1"
                )));
            }

            let breaker = match spec.breaker {
                Some(breaker) => breaker,
                None => {
                    spec.breaker_config.validate().map_err(|e| {
                        CoordinatorError::config(format!("backend {index}: {e}"))
                    })?;
                    let name = format!("{}#{index}", provider.provider_type());
                    Box::new(WindowedCircuitBreaker::new(name, spec.breaker_config))
                }
            };

            backends.push(Backend::new(provider, spec.retries, spec.retry_delay, breaker));
        }

        Ok(LockCoordinator {
            backends,
            strategy: self.strategy,
            global_retry_limit: self.global_retry_limit,
            ownership: OwnershipTable::new(),
            sink: self.sink.unwrap_or_else(|| Arc::new(TracingEventSink)),
            metrics: Arc::new(CoordinatorMetrics::default()),
        })
    }
}

impl Default for CoordinatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
