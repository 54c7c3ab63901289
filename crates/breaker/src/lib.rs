//! Circuit breakers that gate access to a lock backend.
//!
//! [`CircuitBreaker`] is the capability the coordinator consumes;
//! [`WindowedCircuitBreaker`] is the failure-rate implementation shipped with
//! Lockgate.

mod breaker;
mod windowed;

pub use breaker::{BreakerStats, CircuitBreaker, CircuitState};
pub use windowed::{CircuitBreakerConfig, WindowedCircuitBreaker};
