//! Sprig - hierarchical graph memory for agents
//!
//! Main entry point for the sprig CLI.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::warn;

mod commands;

use commands::{init, insights, pending, recall, remember, status, topics};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Sprig - hierarchical graph memory for agents
#[derive(Parser)]
#[command(name = "sprig")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the memory graph if it does not exist
    Init(init::InitArgs),

    /// Store a detail in the memory graph
    Remember(remember::RememberArgs),

    /// Retrieve memories relevant to a query
    Recall(recall::RecallArgs),

    /// Consolidate pending details into insights
    Insights(insights::InsightsArgs),

    /// List topics with their domains
    Topics(topics::TopicsArgs),

    /// List details still waiting for insight consolidation
    Pending(pending::PendingArgs),

    /// Show graph statistics
    Status(status::StatusArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Console (human-readable) + rotating JSON file
    let filter = if cli.verbose {
        "sprig=debug,sprig_agent=debug,sprig_memory=debug,sprig_llm=debug,sprig_config=debug,info"
    } else {
        "sprig=info,sprig_agent=info,sprig_memory=info,sprig_llm=info,warn"
    };

    let log_dir = sprig_config::config_dir()
        .map(|d| d.join("logs"))
        .unwrap_or_else(|| std::path::PathBuf::from("logs"));
    let file_appender = tracing_appender::rolling::daily(&log_dir, "sprig.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "sprig=trace,sprig_agent=trace,sprig_memory=trace,sprig_llm=trace,sprig_config=trace,info",
                )),
        )
        .init();

    let loaded = sprig_config::load_config(None)?;
    for warning in &loaded.warnings {
        warn!("{warning}");
    }

    let ctx = commands::Context {
        config: loaded.config,
        json_output: cli.json,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Init(args) => init::run(args, &ctx).await,
        Commands::Remember(args) => remember::run(args, &ctx).await,
        Commands::Recall(args) => recall::run(args, &ctx).await,
        Commands::Insights(args) => insights::run(args, &ctx).await,
        Commands::Topics(args) => topics::run(args, &ctx).await,
        Commands::Pending(args) => pending::run(args, &ctx).await,
        Commands::Status(args) => status::run(args, &ctx).await,
    }
}
