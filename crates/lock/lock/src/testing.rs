use std::time::Duration;

use crate::error::LockError;
use crate::provider::{AcquireOutcome, ExtendOutcome, LockProvider, ReleaseOutcome};

/// Run the full lock provider conformance test suite.
///
/// Call this from your provider's test module with a fresh provider
/// instance. Lock names are prefixed with `conformance-` so the suite can run
/// against a shared backend.
///
/// # Errors
///
/// Returns an error if the provider fails to answer any request.
pub async fn run_provider_conformance_tests(provider: &dyn LockProvider) -> Result<(), LockError> {
    test_acquire_and_release(provider).await?;
    test_acquire_contention(provider).await?;
    test_release_not_held(provider).await?;
    test_double_release(provider).await?;
    test_reacquire_after_release(provider).await?;
    test_extend_held_lock(provider).await?;
    test_extend_not_held(provider).await?;
    Ok(())
}

async fn test_acquire_and_release(provider: &dyn LockProvider) -> Result<(), LockError> {
    let outcome = provider
        .acquire("conformance-lock-1", Duration::from_millis(100))
        .await?;
    assert_eq!(outcome, AcquireOutcome::Acquired, "should acquire uncontested lock");

    let outcome = provider.release("conformance-lock-1").await?;
    assert_eq!(outcome, ReleaseOutcome::Released, "held lock should release");
    Ok(())
}

async fn test_acquire_contention(provider: &dyn LockProvider) -> Result<(), LockError> {
    let outcome = provider
        .acquire("conformance-lock-2", Duration::ZERO)
        .await?;
    assert_eq!(outcome, AcquireOutcome::Acquired);

    let second = provider
        .acquire("conformance-lock-2", Duration::ZERO)
        .await?;
    assert_eq!(
        second,
        AcquireOutcome::AlreadyHeld,
        "second acquire should report contention while lock is held"
    );

    provider.release("conformance-lock-2").await?;
    Ok(())
}

async fn test_release_not_held(provider: &dyn LockProvider) -> Result<(), LockError> {
    let outcome = provider.release("conformance-never-held").await?;
    assert_eq!(
        outcome,
        ReleaseOutcome::NotHeld,
        "releasing an unknown lock should report not held"
    );
    Ok(())
}

async fn test_double_release(provider: &dyn LockProvider) -> Result<(), LockError> {
    provider
        .acquire("conformance-lock-3", Duration::ZERO)
        .await?;
    assert_eq!(
        provider.release("conformance-lock-3").await?,
        ReleaseOutcome::Released
    );
    assert_eq!(
        provider.release("conformance-lock-3").await?,
        ReleaseOutcome::NotHeld,
        "second release should report not held"
    );
    Ok(())
}

async fn test_reacquire_after_release(provider: &dyn LockProvider) -> Result<(), LockError> {
    provider
        .acquire("conformance-lock-4", Duration::ZERO)
        .await?;
    provider.release("conformance-lock-4").await?;

    let outcome = provider
        .acquire("conformance-lock-4", Duration::ZERO)
        .await?;
    assert_eq!(outcome, AcquireOutcome::Acquired, "released lock should be free");
    provider.release("conformance-lock-4").await?;
    Ok(())
}

async fn test_extend_held_lock(provider: &dyn LockProvider) -> Result<(), LockError> {
    provider
        .acquire("conformance-lock-5", Duration::ZERO)
        .await?;
    assert_eq!(
        provider.extend("conformance-lock-5").await?,
        ExtendOutcome::Extended,
        "held lock should extend"
    );
    assert_eq!(
        provider.release("conformance-lock-5").await?,
        ReleaseOutcome::Released,
        "extended lock should still release"
    );
    Ok(())
}

async fn test_extend_not_held(provider: &dyn LockProvider) -> Result<(), LockError> {
    assert_eq!(
        provider.extend("conformance-never-held").await?,
        ExtendOutcome::NotHeld,
        "extending an unknown lock should report not held"
    );

    provider
        .acquire("conformance-lock-6", Duration::ZERO)
        .await?;
    provider.release("conformance-lock-6").await?;
    assert_eq!(
        provider.extend("conformance-lock-6").await?,
        ExtendOutcome::NotHeld,
        "released lock should not extend"
    );
    Ok(())
}
