use std::collections::HashMap;

use serde::Serialize;

use lockgate_breaker::{BreakerStats, CircuitState};

use crate::coordinator::LockCoordinator;

/// Health snapshot of one backend.
#[derive(Debug, Clone, Serialize)]
pub struct BackendStatus {
    /// Position in the backend list (0 = primary).
    pub index: usize,
    pub provider_type: String,
    pub state: CircuitState,
    pub stats: BreakerStats,
    pub retries: u32,
    pub retry_delay_ms: u64,
}

impl LockCoordinator {
    /// Report every backend in priority order. Has no side effects on the
    /// breakers.
    pub fn backend_status(&self) -> Vec<BackendStatus> {
        self.backends
            .iter()
            .enumerate()
            .map(|(index, backend)| BackendStatus {
                index,
                provider_type: backend.provider_type().to_owned(),
                state: backend.breaker().state(),
                stats: backend.breaker().stats(),
                retries: backend.retries(),
                retry_delay_ms: u64::try_from(backend.retry_delay().as_millis())
                    .unwrap_or(u64::MAX),
            })
            .collect()
    }

    /// Snapshot of lock name → index of the backend that granted it.
    pub fn acquired_locks(&self) -> HashMap<String, usize> {
        self.ownership.snapshot()
    }

    /// Pin a backend's breaker open. Out-of-range indices are ignored.
    pub fn force_backend_open(&self, index: usize) {
        if let Some(backend) = self.backends.get(index) {
            backend.breaker().force_open();
        }
    }

    /// Close a backend's breaker. Out-of-range indices are ignored.
    pub fn force_backend_close(&self, index: usize) {
        if let Some(backend) = self.backends.get(index) {
            backend.breaker().force_close();
        }
    }

    /// Return every breaker to its initial closed state.
    pub fn reset_circuit_breakers(&self) {
        for backend in &self.backends {
            backend.breaker().reset();
        }
    }
}
