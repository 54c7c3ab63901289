use std::collections::VecDeque;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::breaker::{BreakerStats, CircuitBreaker, CircuitState};

/// Configuration for a rolling-window circuit breaker.
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitBreakerConfig {
    /// Fraction of the window that must fail before the circuit opens.
    /// The circuit opens once failures exceed `failure_threshold * window_size`.
    pub failure_threshold: f64,
    /// Number of most recent outcomes the breaker judges.
    pub window_size: usize,
    /// How long to stay `Open` before letting a trial request through.
    pub timeout: Duration,
}

impl CircuitBreakerConfig {
    /// Validate configuration values.
    ///
    /// Returns `Err` with a description if any value is invalid:
    /// - `failure_threshold` must be in `(0, 1]`
    /// - `window_size` must be >= 1
    ///
    /// `timeout = 0` is accepted.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.failure_threshold > 0.0 && self.failure_threshold <= 1.0) {
            return Err("failure_threshold must be in (0, 1]".into());
        }
        if self.window_size < 1 {
            return Err("window_size must be >= 1".into());
        }
        Ok(())
    }

    /// Number of failures in the window above which the circuit opens.
    #[allow(clippy::cast_precision_loss)]
    fn failure_limit(&self) -> f64 {
        self.failure_threshold * self.window_size as f64
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 0.5,
            window_size: 10,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Internal mutable state for a single circuit breaker.
struct CircuitData {
    state: CircuitState,
    /// Most recent outcomes, oldest first; `true` marks a failure.
    window: VecDeque<bool>,
    opened_at: Option<Instant>,
    /// Whether the half-open trial request is currently in flight.
    trial_in_flight: bool,
    /// Set by `force_open`; keeps the circuit open regardless of timeout.
    forced_open: bool,
}

impl CircuitData {
    fn new(window_size: usize) -> Self {
        Self {
            state: CircuitState::Closed,
            window: VecDeque::with_capacity(window_size),
            opened_at: None,
            trial_in_flight: false,
            forced_open: false,
        }
    }

    fn failures(&self) -> usize {
        self.window.iter().filter(|failed| **failed).count()
    }

    fn push(&mut self, failed: bool, window_size: usize) {
        if self.window.len() == window_size {
            self.window.pop_front();
        }
        self.window.push_back(failed);
    }

    fn open(&mut self) {
        self.state = CircuitState::Open;
        self.opened_at = Some(Instant::now());
        self.trial_in_flight = false;
    }

    fn close(&mut self) {
        self.state = CircuitState::Closed;
        self.window.clear();
        self.opened_at = None;
        self.trial_in_flight = false;
    }
}

/// Failure-rate circuit breaker over a rolling window of outcomes.
///
/// - `Closed` -> `Open` when failures in the last `window_size` outcomes
///   exceed `failure_threshold * window_size`
/// - `Open` -> `HalfOpen` on the first [`allows_request`](CircuitBreaker::allows_request)
///   after `timeout` has elapsed; only that one trial request is admitted
/// - `HalfOpen` -> `Closed` when the trial succeeds (the window starts over)
/// - `HalfOpen` -> `Open` when the trial fails
pub struct WindowedCircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    data: RwLock<CircuitData>,
}

impl WindowedCircuitBreaker {
    /// Create a closed breaker. `name` only appears in logs.
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let data = CircuitData::new(config.window_size);
        Self {
            name: name.into(),
            config,
            data: RwLock::new(data),
        }
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, CircuitData> {
        self.data
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, CircuitData> {
        self.data
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl CircuitBreaker for WindowedCircuitBreaker {
    fn allows_request(&self) -> bool {
        let mut data = self.write();

        if data.forced_open {
            return false;
        }

        match data.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let recovered = data
                    .opened_at
                    .is_none_or(|opened| opened.elapsed() >= self.config.timeout);
                if recovered {
                    debug!(
                        breaker = %self.name,
                        "circuit breaker transitioning from open to half-open"
                    );
                    data.state = CircuitState::HalfOpen;
                    data.trial_in_flight = true;
                }
                recovered
            }
            CircuitState::HalfOpen => {
                // Only one trial request at a time.
                if data.trial_in_flight {
                    false
                } else {
                    data.trial_in_flight = true;
                    true
                }
            }
        }
    }

    fn record_success(&self) {
        let mut data = self.write();

        match data.state {
            CircuitState::Closed => data.push(false, self.config.window_size),
            CircuitState::HalfOpen => {
                info!(breaker = %self.name, "circuit breaker closing after successful trial");
                data.close();
            }
            CircuitState::Open => {}
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn record_failure(&self) {
        let mut data = self.write();

        match data.state {
            CircuitState::Closed => {
                data.push(true, self.config.window_size);
                let failures = data.failures();
                if failures as f64 > self.config.failure_limit() {
                    info!(
                        breaker = %self.name,
                        failures,
                        window = data.window.len(),
                        threshold = self.config.failure_threshold,
                        "circuit breaker opening"
                    );
                    data.open();
                }
            }
            CircuitState::HalfOpen => {
                info!(
                    breaker = %self.name,
                    "circuit breaker re-opening after half-open trial failure"
                );
                data.open();
            }
            CircuitState::Open => {
                data.opened_at = Some(Instant::now());
            }
        }
    }

    fn record_cancelled(&self) {
        let mut data = self.write();

        if data.state == CircuitState::HalfOpen && data.trial_in_flight {
            debug!(breaker = %self.name, "half-open trial request cancelled, slot freed");
            data.trial_in_flight = false;
        }
    }

    fn state(&self) -> CircuitState {
        let data = self.read();
        if data.forced_open {
            CircuitState::Open
        } else {
            data.state
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn stats(&self) -> BreakerStats {
        let data = self.read();
        let total = data.window.len();
        if total == 0 {
            return BreakerStats::EMPTY;
        }
        let failures = data.failures();
        BreakerStats {
            failures,
            total,
            failure_rate: failures as f64 / total as f64,
        }
    }

    fn force_open(&self) {
        let mut data = self.write();
        info!(breaker = %self.name, "circuit breaker forced open");
        data.forced_open = true;
        data.open();
    }

    fn force_close(&self) {
        let mut data = self.write();
        info!(breaker = %self.name, "circuit breaker forced closed");
        data.forced_open = false;
        data.close();
    }

    fn reset(&self) {
        let mut data = self.write();
        *data = CircuitData::new(self.config.window_size);
    }
}

impl std::fmt::Debug for WindowedCircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let data = self.read();
        f.debug_struct("WindowedCircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("state", &data.state)
            .field("failures", &data.failures())
            .field("forced_open", &data.forced_open)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn default_config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 0.5,
            window_size: 10,
            timeout: Duration::from_secs(60),
        }
    }

    fn recovering_config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 0.5,
            window_size: 2,
            timeout: Duration::ZERO,
        }
    }

    // -- CircuitBreakerConfig tests -------------------------------------------

    #[test]
    fn default_config_values() {
        let cfg = CircuitBreakerConfig::default();
        assert!((cfg.failure_threshold - 0.5).abs() < f64::EPSILON);
        assert_eq!(cfg.window_size, 10);
        assert_eq!(cfg.timeout, Duration::from_secs(30));
    }

    #[test]
    fn config_validation_rejects_bad_threshold() {
        for threshold in [0.0, -0.1, 1.5, f64::NAN] {
            let config = CircuitBreakerConfig {
                failure_threshold: threshold,
                ..default_config()
            };
            assert!(config.validate().is_err(), "threshold {threshold} accepted");
        }
    }

    #[test]
    fn config_validation_rejects_empty_window() {
        let config = CircuitBreakerConfig {
            window_size: 0,
            ..default_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_validation_accepts_valid_config() {
        assert!(default_config().validate().is_ok());
        let config = CircuitBreakerConfig {
            failure_threshold: 1.0,
            timeout: Duration::ZERO,
            ..default_config()
        };
        assert!(config.validate().is_ok());
    }

    // -- State transition tests -----------------------------------------------

    #[test]
    fn starts_closed() {
        let cb = WindowedCircuitBreaker::new("test", default_config());
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.allows_request());
        assert_eq!(cb.stats(), BreakerStats::EMPTY);
    }

    #[test]
    fn opens_on_sixth_failure_in_window_of_ten() {
        let cb = WindowedCircuitBreaker::new("test", default_config());

        for _ in 0..5 {
            cb.record_failure();
        }
        assert_eq!(cb.state(), CircuitState::Closed, "5 of 10 is not above 0.5");

        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.allows_request());
    }

    #[test]
    fn successes_dilute_failures_in_window() {
        let cb = WindowedCircuitBreaker::new("test", default_config());

        for _ in 0..5 {
            cb.record_success();
        }
        for _ in 0..5 {
            cb.record_failure();
        }
        assert_eq!(cb.state(), CircuitState::Closed);

        // Sliding out a success for a failure pushes the window to 6/10.
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn old_failures_slide_out_of_window() {
        let cb = WindowedCircuitBreaker::new("test", default_config());

        for _ in 0..5 {
            cb.record_failure();
        }
        for _ in 0..10 {
            cb.record_success();
        }
        assert_eq!(cb.stats().failures, 0);

        for _ in 0..5 {
            cb.record_failure();
        }
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn stats_track_window() {
        let cb = WindowedCircuitBreaker::new("test", default_config());
        cb.record_success();
        cb.record_failure();
        cb.record_success();
        cb.record_success();

        let stats = cb.stats();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.failures, 1);
        assert!((stats.failure_rate - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn window_never_exceeds_size() {
        let cb = WindowedCircuitBreaker::new("test", default_config());
        for _ in 0..25 {
            cb.record_success();
        }
        assert_eq!(cb.stats().total, 10);
    }

    #[test]
    fn open_stays_open_before_timeout() {
        let cb = WindowedCircuitBreaker::new("test", default_config());
        for _ in 0..6 {
            cb.record_failure();
        }
        assert!(!cb.allows_request());
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn half_open_admits_single_trial() {
        let cb = WindowedCircuitBreaker::new("test", recovering_config());
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);

        assert!(cb.allows_request(), "trial request should be admitted");
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert!(!cb.allows_request(), "second trial request should be rejected");
    }

    #[test]
    fn half_open_to_closed_on_success() {
        let cb = WindowedCircuitBreaker::new("test", recovering_config());
        cb.record_failure();
        cb.record_failure();
        assert!(cb.allows_request());

        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.stats(), BreakerStats::EMPTY);
        assert!(cb.allows_request());
    }

    #[test]
    fn half_open_to_open_on_failure() {
        let cb = WindowedCircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                timeout: Duration::from_millis(20),
                ..recovering_config()
            },
        );
        cb.record_failure();
        cb.record_failure();
        std::thread::sleep(Duration::from_millis(30));
        assert!(cb.allows_request());

        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.allows_request(), "timeout restarts after re-opening");
    }

    #[test]
    fn cancelled_trial_frees_slot() {
        let cb = WindowedCircuitBreaker::new("test", recovering_config());
        cb.record_failure();
        cb.record_failure();
        assert!(cb.allows_request());
        assert!(!cb.allows_request());

        cb.record_cancelled();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert!(cb.allows_request(), "next caller takes the freed slot");
        assert!(!cb.allows_request());

        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn cancelled_outside_half_open_changes_nothing() {
        let cb = WindowedCircuitBreaker::new("test", default_config());
        cb.record_failure();
        cb.record_cancelled();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.stats().total, 1);

        for _ in 0..6 {
            cb.record_failure();
        }
        cb.record_cancelled();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.allows_request());
    }

    #[test]
    fn success_in_open_state_does_nothing() {
        let cb = WindowedCircuitBreaker::new("test", default_config());
        for _ in 0..6 {
            cb.record_failure();
        }
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Open);
    }

    // -- Administrative overrides ---------------------------------------------

    #[test]
    fn force_open_ignores_timeout() {
        let cb = WindowedCircuitBreaker::new("test", recovering_config());
        cb.force_open();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.allows_request());
        assert!(!cb.allows_request());
    }

    #[test]
    fn force_close_clears_pin_and_window() {
        let cb = WindowedCircuitBreaker::new("test", default_config());
        cb.record_failure();
        cb.force_open();
        cb.force_close();

        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.allows_request());
        assert_eq!(cb.stats().total, 0);
    }

    #[test]
    fn reset_returns_to_initial_state() {
        let cb = WindowedCircuitBreaker::new("test", default_config());
        for _ in 0..6 {
            cb.record_failure();
        }
        cb.force_open();

        cb.reset();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.stats(), BreakerStats::EMPTY);
        assert!(cb.allows_request());
    }

    #[test]
    fn debug_format() {
        let cb = WindowedCircuitBreaker::new("redis#0", default_config());
        let debug = format!("{cb:?}");
        assert!(debug.contains("redis#0"));
        assert!(debug.contains("Closed"));
    }

    // -- Concurrency tests ----------------------------------------------------

    #[test]
    fn concurrent_record_operations() {
        let cb = Arc::new(WindowedCircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                window_size: 100,
                failure_threshold: 1.0,
                ..default_config()
            },
        ));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let cb = Arc::clone(&cb);
            handles.push(std::thread::spawn(move || {
                for _ in 0..10 {
                    cb.record_failure();
                }
            }));
        }

        for handle in handles {
            handle.join().expect("thread should not panic");
        }

        // 100 failures never exceed a limit of 100 * 1.0.
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.stats().failures, 100);
    }
}
