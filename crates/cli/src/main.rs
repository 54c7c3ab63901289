//! Lockgate CLI
//!
//! Runs commands under a distributed lock and inspects coordinator
//! configuration.

mod commands;
mod providers;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use lockgate_coordinator::{CoordinatorConfig, LockCoordinator};
use tracing_subscriber::{EnvFilter, fmt};

/// Run work under a lock held on the first healthy backend.
#[derive(Parser, Debug)]
#[command(name = "lockgate", version, about)]
struct Cli {
    /// Coordinator configuration file.
    #[arg(
        long,
        env = "LOCKGATE_CONFIG",
        default_value = "lockgate.toml",
        global = true
    )]
    config: PathBuf,

    /// Output format.
    #[arg(long, default_value = "text", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Acquire a lock, run a command while holding it, then release.
    Run(commands::run::RunArgs),
    /// Show the configured strategy, backends and retry policies.
    ///
    /// Reports configuration only: breaker state is kept per process, so
    /// every backend shows as closed here.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = CoordinatorConfig::load(&cli.config)?;
    let coordinator = LockCoordinator::from_config(&config, &providers::factory())?;

    match cli.command {
        Command::Run(args) => commands::run::run(&coordinator, &args).await,
        Command::Status => commands::status::run(&coordinator, &cli.format),
    }
}
