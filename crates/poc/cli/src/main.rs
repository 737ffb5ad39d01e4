//! PoC CLI - operator interface to the contribution archive
//!
//! Every command opens the file-backed archive and ledger named in the
//! configuration, performs one operation and prints the result as JSON:
//! - Submit contributions and evaluate them with a score object
//! - Inspect redundancy reports and the sandbox map
//! - Inspect epoch balances and system statistics
//! - Purge test data

use clap::{Parser, Subcommand};
use poc_orchestrator::PocConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod output;

use commands::{EvaluateArgs, MapArgs, SubmitArgs};

/// PoC CLI application
#[derive(Parser)]
#[command(name = "poc")]
#[command(about = "Proof-of-Contribution archive and tokenomics ledger", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "POC_CONFIG")]
    config: Option<String>,

    /// Log level, overrides the configuration file
    #[arg(long, env = "POC_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "POC_LOG_JSON")]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Archive a new contribution
    Submit(SubmitArgs),

    /// Evaluate a pending contribution with a score object
    Evaluate(EvaluateArgs),

    /// Show one contribution
    Show {
        /// Submission id
        id: String,
    },

    /// Redundancy report for one contribution
    Report {
        /// Submission id
        id: String,
    },

    /// Pairwise overlap map of the archive
    Map(MapArgs),

    /// Epoch balances, thresholds and legal tiers
    Epochs,

    /// Archive and ledger statistics
    #[command(alias = "stats")]
    Statistics,

    /// Remove every contribution flagged as test data
    PurgeTestData,

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = PocConfig::load(cli.config.as_deref())?;

    // Logs go to stderr; stdout carries command output only.
    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.into());

    if cli.json || config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    match cli.command {
        Commands::Submit(args) => commands::submit(&config, args).await,
        Commands::Evaluate(args) => commands::evaluate(&config, args).await,
        Commands::Show { id } => commands::show(&config, &id),
        Commands::Report { id } => commands::report(&config, &id),
        Commands::Map(args) => commands::map(&config, args),
        Commands::Epochs => commands::epochs(&config),
        Commands::Statistics => commands::statistics(&config),
        Commands::PurgeTestData => commands::purge_test_data(&config).await,
        Commands::Config => output::print_json(&config),
    }
}
