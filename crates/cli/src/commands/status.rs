use lockgate_coordinator::{BackendStatus, LockCoordinator};

use crate::OutputFormat;

pub fn run(coordinator: &LockCoordinator, format: &OutputFormat) -> anyhow::Result<()> {
    let backends = coordinator.backend_status();

    match format {
        OutputFormat::Json => {
            let report = serde_json::json!({
                "strategy": coordinator.strategy().to_string(),
                "global_retry_limit": coordinator.global_retry_limit(),
                "backends": backends,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            println!("{}", header(coordinator));
            for status in &backends {
                println!("  {}", describe(status));
            }
        }
    }
    Ok(())
}

/// Breakers live in the process that uses them, so a fresh coordinator
/// always reports them closed.
fn header(coordinator: &LockCoordinator) -> String {
    format!(
        "strategy: {} (global retry limit {})\n{} configured backends (breakers start closed in each process):",
        coordinator.strategy(),
        coordinator.global_retry_limit(),
        coordinator.len()
    )
}

fn describe(status: &BackendStatus) -> String {
    format!(
        "[{index}] {provider} | cb: {state} | failures: {failures}/{total} | retries: {retries} | delay: {delay}ms",
        index = status.index,
        provider = status.provider_type,
        state = status.state,
        failures = status.stats.failures,
        total = status.stats.total,
        retries = status.retries,
        delay = status.retry_delay_ms,
    )
}
