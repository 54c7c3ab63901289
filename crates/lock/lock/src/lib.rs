pub mod error;
pub mod provider;
pub mod testing;

pub use error::LockError;
pub use provider::{AcquireOutcome, ExtendOutcome, LockProvider, ReleaseOutcome};
