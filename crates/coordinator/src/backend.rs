use std::sync::Arc;
use std::time::Duration;

use lockgate_breaker::{CircuitBreaker, CircuitBreakerConfig};
use lockgate_lock::LockProvider;

/// Default number of attempts per backend in the per-backend strategy.
pub const DEFAULT_RETRIES: u32 = 1;

/// Default pause between attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(50);

/// One lock provider together with its retry policy and circuit breaker.
///
/// Built once by the coordinator; only the breaker's internal state changes
/// afterwards.
pub struct Backend {
    provider: Arc<dyn LockProvider>,
    retries: u32,
    retry_delay: Duration,
    breaker: Box<dyn CircuitBreaker>,
}

impl Backend {
    pub(crate) fn new(
        provider: Arc<dyn LockProvider>,
        retries: u32,
        retry_delay: Duration,
        breaker: Box<dyn CircuitBreaker>,
    ) -> Self {
        Self {
            provider,
            retries,
            retry_delay,
            breaker,
        }
    }

    pub fn provider(&self) -> &dyn LockProvider {
        self.provider.as_ref()
    }

    pub fn provider_type(&self) -> &str {
        self.provider.provider_type()
    }

    /// Attempts allowed per acquisition in the per-backend strategy.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    pub fn breaker(&self) -> &dyn CircuitBreaker {
        self.breaker.as_ref()
    }
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend")
            .field("provider", &self.provider_type())
            .field("retries", &self.retries)
            .field("retry_delay", &self.retry_delay)
            .field("breaker", &self.breaker)
            .finish()
    }
}

/// Builder-side description of a backend.
///
/// Unless a breaker instance is supplied with [`breaker`](Self::breaker), the
/// coordinator builds a
/// [`WindowedCircuitBreaker`](lockgate_breaker::WindowedCircuitBreaker) from
/// [`breaker_config`](Self::breaker_config).
pub struct BackendSpec {
    pub(crate) provider: Option<Arc<dyn LockProvider>>,
    pub(crate) retries: u32,
    pub(crate) retry_delay: Duration,
    pub(crate) breaker_config: CircuitBreakerConfig,
    pub(crate) breaker: Option<Box<dyn CircuitBreaker>>,
}

impl Default for BackendSpec {
    fn default() -> Self {
        Self {
            provider: None,
            retries: DEFAULT_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            breaker_config: CircuitBreakerConfig::default(),
            breaker: None,
        }
    }
}

impl BackendSpec {
    /// Describe a backend for the given provider with default settings.
    pub fn new(provider: Arc<dyn LockProvider>) -> Self {
        Self::default().provider(provider)
    }

    /// Set the lock provider.
    #[must_use]
    pub fn provider(mut self, provider: Arc<dyn LockProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set the number of attempts per acquisition (per-backend strategy).
    #[must_use]
    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Set the pause between attempts.
    #[must_use]
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Set the configuration for the default breaker.
    #[must_use]
    pub fn breaker_config(mut self, config: CircuitBreakerConfig) -> Self {
        self.breaker_config = config;
        self
    }

    /// Use a custom breaker instead of the default one.
    #[must_use]
    pub fn breaker(mut self, breaker: Box<dyn CircuitBreaker>) -> Self {
        self.breaker = Some(breaker);
        self
    }
}

impl std::fmt::Debug for BackendSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendSpec")
            .field(
                "provider",
                &self.provider.as_ref().map(|p| p.provider_type().to_owned()),
            )
            .field("retries", &self.retries)
            .field("retry_delay", &self.retry_delay)
            .field("breaker_config", &self.breaker_config)
            .field("custom_breaker", &self.breaker.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use lockgate_breaker::WindowedCircuitBreaker;
    use lockgate_lock_memory::MemoryLockProvider;

    use super::*;

    #[test]
    fn spec_defaults() {
        let spec = BackendSpec::default();
        assert!(spec.provider.is_none());
        assert_eq!(spec.retries, 1);
        assert_eq!(spec.retry_delay, Duration::from_millis(50));
        assert_eq!(spec.breaker_config, CircuitBreakerConfig::default());
        assert!(spec.breaker.is_none());
    }

    #[test]
    fn spec_setters() {
        let spec = BackendSpec::new(Arc::new(MemoryLockProvider::new()))
            .retries(4)
            .retry_delay(Duration::from_millis(5))
            .breaker(Box::new(WindowedCircuitBreaker::new(
                "custom",
                CircuitBreakerConfig::default(),
            )));
        assert!(spec.provider.is_some());
        assert_eq!(spec.retries, 4);
        assert_eq!(spec.retry_delay, Duration::from_millis(5));
        assert!(spec.breaker.is_some());

        let debug = format!("{spec:?}");
        assert!(debug.contains("memory"));
    }

    #[test]
    fn backend_accessors() {
        let backend = Backend::new(
            Arc::new(MemoryLockProvider::new()),
            3,
            Duration::from_millis(10),
            Box::new(WindowedCircuitBreaker::new(
                "memory#0",
                CircuitBreakerConfig::default(),
            )),
        );
        assert_eq!(backend.provider_type(), "memory");
        assert_eq!(backend.retries(), 3);
        assert_eq!(backend.retry_delay(), Duration::from_millis(10));
        assert!(backend.breaker().allows_request());
    }
}
