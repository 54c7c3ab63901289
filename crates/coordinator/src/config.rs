use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use lockgate_breaker::CircuitBreakerConfig;

use crate::backend::{DEFAULT_RETRIES, DEFAULT_RETRY_DELAY};
use crate::error::CoordinatorError;
use crate::strategy::RetryStrategy;

/// Coordinator configuration as read from TOML.
///
/// # Example
///
/// ```toml
/// strategy = "global"
/// global_retry_limit = 6
///
/// [[backends]]
/// provider = "redis"
/// retries = 3
/// retry_delay_ms = 25
/// options = { url = "redis://127.0.0.1:6379" }
///
/// [[backends]]
/// provider = "postgres"
///
/// [backends.circuit_breaker]
/// failure_threshold = 0.3
/// timeout_seconds = 120
///
/// [backends.options]
/// url = "postgres://localhost:5432/lockgate"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct CoordinatorConfig {
    /// Retry strategy (`per_backend` or `global`).
    #[serde(default)]
    pub strategy: RetryStrategy,
    /// Attempt budget shared across backends in `global` mode.
    #[serde(default = "default_global_retry_limit")]
    pub global_retry_limit: u32,
    /// Backends in priority order.
    #[serde(default)]
    pub backends: Vec<BackendConfig>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            strategy: RetryStrategy::default(),
            global_retry_limit: default_global_retry_limit(),
            backends: Vec::new(),
        }
    }
}

fn default_global_retry_limit() -> u32 {
    10
}

impl CoordinatorConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, CoordinatorError> {
        toml::from_str(text).map_err(|e| CoordinatorError::config(e.to_string()))
    }

    /// Read and parse a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CoordinatorError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            CoordinatorError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }
}

/// One `[[backends]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Provider type registered in the [`ProviderFactory`](crate::ProviderFactory).
    #[serde(default)]
    pub provider: Option<String>,
    /// Attempts per acquisition in `per_backend` mode.
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// Pause between attempts, in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Per-backend breaker overrides.
    #[serde(default)]
    pub circuit_breaker: BreakerOverrides,
    /// Provider-specific settings handed to the factory constructor.
    #[serde(default)]
    pub options: toml::Table,
}

impl BackendConfig {
    /// A backend entry for `provider` with default settings.
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: Some(provider.into()),
            retries: default_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            circuit_breaker: BreakerOverrides::default(),
            options: toml::Table::new(),
        }
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

fn default_retries() -> u32 {
    DEFAULT_RETRIES
}

fn default_retry_delay_ms() -> u64 {
    u64::try_from(DEFAULT_RETRY_DELAY.as_millis()).unwrap_or(50)
}

/// Optional overrides applied on top of [`CircuitBreakerConfig::default`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BreakerOverrides {
    /// Fraction of the window that must fail to open the circuit.
    pub failure_threshold: Option<f64>,
    /// Number of recent outcomes judged.
    pub window_size: Option<usize>,
    /// Seconds to stay open before probing.
    pub timeout_seconds: Option<u64>,
}

impl BreakerOverrides {
    /// Merge the overrides into `base`.
    pub fn apply(&self, base: CircuitBreakerConfig) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold.unwrap_or(base.failure_threshold),
            window_size: self.window_size.unwrap_or(base.window_size),
            timeout: self
                .timeout_seconds
                .map_or(base.timeout, Duration::from_secs),
        }
    }
}
