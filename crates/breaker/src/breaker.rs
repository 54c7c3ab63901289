use serde::Serialize;

/// State of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation: requests flow through.
    Closed,
    /// Backend is failing; requests are rejected immediately.
    Open,
    /// Recovery trial: a single request may test backend health.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Point-in-time view of the outcomes a breaker is currently judging.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BreakerStats {
    /// Failures among the recorded outcomes.
    pub failures: usize,
    /// Number of recorded outcomes.
    pub total: usize,
    /// `failures / total`, or `0.0` when nothing has been recorded.
    pub failure_rate: f64,
}

impl BreakerStats {
    /// Stats for a breaker with no recorded outcomes.
    pub const EMPTY: Self = Self {
        failures: 0,
        total: 0,
        failure_rate: 0.0,
    };
}

/// Failure-detection gate in front of a single backend.
///
/// Implementations synchronize internally; every method takes `&self` and
/// may be called concurrently.
pub trait CircuitBreaker: Send + Sync + std::fmt::Debug {
    /// Whether a request may be sent to the backend right now.
    ///
    /// May move an open breaker to half-open once its timeout has passed, in
    /// which case the caller carries the recovery trial.
    fn allows_request(&self) -> bool;

    /// Record that the backend answered.
    fn record_success(&self);

    /// Record that the backend failed to answer.
    fn record_failure(&self);

    /// Record that an admitted request ended without an outcome, e.g. because
    /// the caller gave up waiting. Frees the half-open trial slot so the next
    /// caller can test the backend; recorded outcomes are left alone.
    fn record_cancelled(&self);

    /// Current state, without triggering transitions.
    fn state(&self) -> CircuitState;

    fn stats(&self) -> BreakerStats;

    /// Pin the breaker open until [`force_close`](Self::force_close) or
    /// [`reset`](Self::reset).
    fn force_open(&self);

    /// Close the breaker and forget recorded outcomes.
    fn force_close(&self);

    /// Return to the initial state.
    fn reset(&self);
}
