//! Scripted providers and a recording event sink shared by the integration
//! tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use lockgate_coordinator::{
    AcquireOutcome, BackendSpec, EventSink, ExtendOutcome, LockError, LockEvent, LockProvider,
    ReleaseOutcome,
};

/// What a [`ScriptedProvider`] answers to `acquire`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnAcquire {
    Grant,
    Held,
    Fail,
}

/// What a [`ScriptedProvider`] answers to `release`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnRelease {
    Release,
    NotHeld,
    Fail,
}

/// What a [`ScriptedProvider`] answers to `extend`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnExtend {
    Extend,
    NotHeld,
    Fail,
}

/// Provider whose answers are fixed by the test and whose calls are counted.
#[derive(Debug)]
pub struct ScriptedProvider {
    name: &'static str,
    on_acquire: Mutex<OnAcquire>,
    on_release: Mutex<OnRelease>,
    on_extend: Mutex<OnExtend>,
    acquire_delay: Mutex<Duration>,
    acquire_calls: AtomicU32,
    release_calls: AtomicU32,
    extend_calls: AtomicU32,
}

impl ScriptedProvider {
    pub fn new(name: &'static str, on_acquire: OnAcquire) -> Arc<Self> {
        Arc::new(Self {
            name,
            on_acquire: Mutex::new(on_acquire),
            on_release: Mutex::new(OnRelease::Release),
            on_extend: Mutex::new(OnExtend::Extend),
            acquire_delay: Mutex::new(Duration::ZERO),
            acquire_calls: AtomicU32::new(0),
            release_calls: AtomicU32::new(0),
            extend_calls: AtomicU32::new(0),
        })
    }

    pub fn set_acquire(&self, on_acquire: OnAcquire) {
        *self.on_acquire.lock().unwrap() = on_acquire;
    }

    pub fn set_release(&self, on_release: OnRelease) {
        *self.on_release.lock().unwrap() = on_release;
    }

    pub fn set_extend(&self, on_extend: OnExtend) {
        *self.on_extend.lock().unwrap() = on_extend;
    }

    /// Make every acquire sleep this long before answering.
    pub fn set_acquire_delay(&self, delay: Duration) {
        *self.acquire_delay.lock().unwrap() = delay;
    }

    pub fn acquire_calls(&self) -> u32 {
        self.acquire_calls.load(Ordering::SeqCst)
    }

    pub fn release_calls(&self) -> u32 {
        self.release_calls.load(Ordering::SeqCst)
    }

    pub fn extend_calls(&self) -> u32 {
        self.extend_calls.load(Ordering::SeqCst)
    }

    /// Backend spec with no pause between attempts.
    pub fn spec(self: &Arc<Self>) -> BackendSpec {
        BackendSpec::new(Arc::clone(self) as Arc<dyn LockProvider>).retry_delay(Duration::ZERO)
    }
}

#[async_trait]
impl LockProvider for ScriptedProvider {
    fn provider_type(&self) -> &str {
        self.name
    }

    async fn acquire(&self, _name: &str, _timeout: Duration) -> Result<AcquireOutcome, LockError> {
        self.acquire_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.acquire_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match *self.on_acquire.lock().unwrap() {
            OnAcquire::Grant => Ok(AcquireOutcome::Acquired),
            OnAcquire::Held => Ok(AcquireOutcome::AlreadyHeld),
            OnAcquire::Fail => Err(LockError::Connection(format!("{} is down", self.name))),
        }
    }

    async fn release(&self, _name: &str) -> Result<ReleaseOutcome, LockError> {
        self.release_calls.fetch_add(1, Ordering::SeqCst);
        match *self.on_release.lock().unwrap() {
            OnRelease::Release => Ok(ReleaseOutcome::Released),
            OnRelease::NotHeld => Ok(ReleaseOutcome::NotHeld),
            OnRelease::Fail => Err(LockError::Backend(format!("{} rejected release", self.name))),
        }
    }

    fn lease_ttl(&self) -> Duration {
        Duration::from_secs(30)
    }

    async fn extend(&self, _name: &str) -> Result<ExtendOutcome, LockError> {
        self.extend_calls.fetch_add(1, Ordering::SeqCst);
        match *self.on_extend.lock().unwrap() {
            OnExtend::Extend => Ok(ExtendOutcome::Extended),
            OnExtend::NotHeld => Ok(ExtendOutcome::NotHeld),
            OnExtend::Fail => Err(LockError::Backend(format!("{} rejected extend", self.name))),
        }
    }
}

/// Sink that keeps a short label for every event it sees.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &LockEvent<'_>) {
        let label = match event {
            LockEvent::BackendSkipped { backend, .. } => format!("skipped:{backend}"),
            LockEvent::Acquired { backend, .. } => format!("acquired:{backend}"),
            LockEvent::AlreadyHeld { backend, .. } => format!("held:{backend}"),
            LockEvent::AcquireFailed { backend, .. } => format!("failed:{backend}"),
            LockEvent::Exhausted { attempts, .. } => format!("exhausted:{attempts}"),
            LockEvent::Released { backend, .. } => format!("released:{backend}"),
            LockEvent::ReleaseNotHeld { backend, .. } => format!("not_held:{backend}"),
            LockEvent::ReleaseFailed { backend, .. } => format!("release_failed:{backend}"),
            LockEvent::ReleaseSwept { released, .. } => format!("swept:{released}"),
            LockEvent::Extended { backend, .. } => format!("extended:{backend}"),
            LockEvent::ExtendNotHeld { backend, .. } => format!("lease_lost:{backend}"),
            LockEvent::ExtendFailed { backend, .. } => format!("extend_failed:{backend}"),
        };
        self.events.lock().unwrap().push(label);
    }
}
