use std::process::ExitStatus;
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use lockgate_coordinator::LockCoordinator;
use tokio::process::Command;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{error, info, warn};

/// Exit code used when the lock was not granted.
const EXIT_NOT_GRANTED: i32 = 75;

/// Exit code used when the lease was lost while the command ran.
const EXIT_LOCK_LOST: i32 = 76;

/// Exit code used when the command was interrupted by Ctrl-C.
const EXIT_INTERRUPTED: i32 = 130;

/// Lower bound on the lease renewal interval.
const MIN_RENEWAL_PERIOD: Duration = Duration::from_millis(10);

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Name of the lock to hold while the command runs.
    #[arg(long)]
    pub lock: String,

    /// How long each backend may wait for the lock, in milliseconds.
    #[arg(long, default_value_t = 0)]
    pub timeout_ms: u64,

    /// Command and arguments, after `--`.
    #[arg(last = true, required = true)]
    pub command: Vec<String>,
}

/// How the supervised command ended.
#[derive(Debug)]
enum Ended {
    Exited(ExitStatus),
    Interrupted,
    LockLost,
}

pub async fn run(coordinator: &LockCoordinator, args: &RunArgs) -> anyhow::Result<()> {
    let timeout = Duration::from_millis(args.timeout_ms);

    if !coordinator.acquire(&args.lock, timeout).await {
        eprintln!("Lock '{}' was not granted by any backend.", args.lock);
        std::process::exit(EXIT_NOT_GRANTED);
    }

    let outcome = supervise(coordinator, args).await;
    let released = coordinator.release(&args.lock).await;

    match outcome? {
        Ended::LockLost => {
            eprintln!(
                "Lock '{}' was lost while the command ran; the command was stopped.",
                args.lock
            );
            std::process::exit(EXIT_LOCK_LOST);
        }
        _ if !released => {
            eprintln!(
                "Lock '{}' was no longer held at release; another owner may have run concurrently.",
                args.lock
            );
            std::process::exit(EXIT_LOCK_LOST);
        }
        Ended::Exited(status) if status.success() => Ok(()),
        Ended::Exited(status) => {
            info!(lock = %args.lock, %status, "command exited unsuccessfully");
            std::process::exit(status.code().unwrap_or(1));
        }
        Ended::Interrupted => std::process::exit(EXIT_INTERRUPTED),
    }
}

/// Run the child to completion while renewing the lease. The child is killed
/// on Ctrl-C or when the lease is lost.
async fn supervise(coordinator: &LockCoordinator, args: &RunArgs) -> anyhow::Result<Ended> {
    let (program, rest) = args
        .command
        .split_first()
        .context("no command given")?;
    let lease = coordinator
        .lease_ttl(&args.lock)
        .context("lock is not tracked after acquisition")?;

    let mut child = Command::new(program)
        .args(rest)
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("failed to start '{program}'"))?;

    let held = hold_while(coordinator, &args.lock, lease, async {
        tokio::select! {
            status = child.wait() => status.map(Ended::Exited),
            _ = tokio::signal::ctrl_c() => Ok(Ended::Interrupted),
        }
    })
    .await;

    match held {
        Held::Finished(Ok(Ended::Interrupted)) => {
            warn!(lock = %args.lock, "interrupted, stopping command");
            child.kill().await?;
            Ok(Ended::Interrupted)
        }
        Held::Finished(ended) => Ok(ended?),
        Held::Lost => {
            error!(lock = %args.lock, "lock lease lost, stopping command");
            child.kill().await?;
            Ok(Ended::LockLost)
        }
    }
}

/// Result of [`hold_while`].
#[derive(Debug, PartialEq, Eq)]
enum Held<T> {
    Finished(T),
    Lost,
}

/// Interval at which a lease of `lease` is renewed.
fn renewal_period(lease: Duration) -> Duration {
    (lease / 3).max(MIN_RENEWAL_PERIOD)
}

/// Drive `work` to completion, extending the lease on `lock` as it runs.
///
/// A failed extension is retried on the next tick as long as the coordinator
/// still tracks the lock and a full lease has not passed since the last
/// successful renewal. Otherwise `work` is dropped and [`Held::Lost`] is
/// returned.
async fn hold_while<F: Future>(
    coordinator: &LockCoordinator,
    lock: &str,
    lease: Duration,
    work: F,
) -> Held<F::Output> {
    let period = renewal_period(lease);
    let mut renewal = tokio::time::interval_at(Instant::now() + period, period);
    renewal.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut renewed_at = Instant::now();
    tokio::pin!(work);

    loop {
        tokio::select! {
            output = &mut work => return Held::Finished(output),
            _ = renewal.tick() => {
                if coordinator.extend(lock).await {
                    renewed_at = Instant::now();
                } else if !coordinator.holds(lock) || renewed_at.elapsed() >= lease {
                    return Held::Lost;
                } else {
                    warn!(lock, "lease renewal failed, retrying");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use lockgate_coordinator::BackendSpec;
    use lockgate_lock_memory::MemoryLockProvider;

    use super::*;

    const LEASE: Duration = Duration::from_secs(3);

    fn coordinator(provider: MemoryLockProvider) -> LockCoordinator {
        LockCoordinator::builder()
            .backend(BackendSpec::new(Arc::new(provider)))
            .build()
            .unwrap()
    }

    #[test]
    fn renewal_period_is_a_third_of_the_lease() {
        assert_eq!(renewal_period(Duration::from_secs(30)), Duration::from_secs(10));
        assert_eq!(renewal_period(Duration::from_millis(3)), MIN_RENEWAL_PERIOD);
    }

    #[tokio::test(start_paused = true)]
    async fn long_running_work_keeps_the_lock() {
        let table = MemoryLockProvider::new().with_lease_ttl(LEASE);
        let holder = coordinator(table.handle());
        let other = coordinator(table.handle());

        assert!(holder.acquire("job", Duration::ZERO).await);
        let held = hold_while(&holder, "job", LEASE, async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            7
        })
        .await;

        assert_eq!(held, Held::Finished(7));
        assert!(!other.acquire("job", Duration::ZERO).await);
        assert!(holder.release("job").await);
    }

    #[tokio::test(start_paused = true)]
    async fn lock_taken_over_is_reported_lost() {
        let table = MemoryLockProvider::new().with_lease_ttl(LEASE);
        let holder = coordinator(table.handle());
        let other = coordinator(table.handle());

        assert!(holder.acquire("job", Duration::ZERO).await);
        tokio::time::advance(LEASE + Duration::from_secs(1)).await;
        assert!(other.acquire("job", Duration::ZERO).await);

        let start = Instant::now();
        let work = tokio::time::sleep(Duration::from_secs(60));
        let held = hold_while(&holder, "job", LEASE, work).await;

        assert_eq!(held, Held::Lost);
        assert_eq!(start.elapsed(), renewal_period(LEASE));
        assert!(!holder.release("job").await);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_renewals_give_up_after_a_lease() {
        let provider = MemoryLockProvider::new().with_lease_ttl(LEASE);
        let holder = coordinator(provider.clone());

        assert!(holder.acquire("job", Duration::ZERO).await);
        provider.set_failing(true);

        let start = Instant::now();
        let work = tokio::time::sleep(Duration::from_secs(60));
        let held = hold_while(&holder, "job", LEASE, work).await;

        assert_eq!(held, Held::Lost);
        assert_eq!(start.elapsed(), LEASE);
    }

    #[tokio::test(start_paused = true)]
    async fn single_failed_renewal_is_retried() {
        let provider = MemoryLockProvider::new().with_lease_ttl(LEASE);
        let holder = coordinator(provider.clone());

        assert!(holder.acquire("job", Duration::ZERO).await);
        provider.set_failing(true);
        let heal = async {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            provider.set_failing(false);
            tokio::time::sleep(Duration::from_secs(5)).await;
        };

        assert_eq!(hold_while(&holder, "job", LEASE, heal).await, Held::Finished(()));
        assert!(holder.release("job").await);
    }
}
