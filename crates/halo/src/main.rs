// SPDX-FileCopyrightText: 2026 Halo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Halo - usage metering and budget enforcement for AI operations.
//!
//! This is the binary entry point for the `halo` command-line tool.

mod budget;
mod output;
mod record;
mod report;
mod transfer;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use halo_config::HaloConfig;
use halo_core::HaloError;
use halo_cost::UsageMeter;
use tracing::warn;

use crate::output::Output;

/// Halo - usage metering and budget enforcement for AI operations.
#[derive(Parser, Debug)]
#[command(name = "halo", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print machine-readable JSON.
    #[arg(long, global = true)]
    json: bool,

    /// Disable colors.
    #[arg(long, global = true)]
    plain: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Record a completed operation.
    Record(record::RecordArgs),
    /// Show today's summary.
    Today,
    /// Show month-to-date spend.
    Month,
    /// Show cost by operation kind and by model.
    Breakdown(report::BreakdownArgs),
    /// Show daily cost for recent days.
    Trend(report::TrendArgs),
    /// Show spend over a recent window.
    Session(report::SessionArgs),
    /// Show budget usage and the current enforcement decision.
    Status,
    /// Exit with status 2 when a hard-stop limit has been reached.
    Check,
    /// Suggest ways to lower spend.
    Suggest,
    /// List the pricing table.
    Models,
    /// Show or change the budget.
    Budget {
        #[command(subcommand)]
        action: budget::BudgetCommand,
    },
    /// Export the ledger and budget.
    Export(transfer::ExportArgs),
    /// Replace the ledger and budget from a JSON export.
    Import(transfer::ImportArgs),
    /// Delete recorded history.
    Clear(transfer::ClearArgs),
    /// Delete all history and restore the configured budget.
    Reset(transfer::ResetArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => halo_config::load_and_validate_path(path),
        None => halo_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            halo_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.meter.log_level);

    let out = Output::new(cli.json, cli.plain);
    match run(cli.command, &config, &out).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}

/// Open the meter and dispatch. Returns the process exit code.
async fn run(command: Commands, config: &HaloConfig, out: &Output) -> Result<i32, HaloError> {
    let meter = open_meter(config).await?;

    match command {
        Commands::Record(args) => record::run_record(&meter, config, args, out).await?,
        Commands::Today => report::run_today(&meter, out)?,
        Commands::Month => report::run_month(&meter, out)?,
        Commands::Breakdown(args) => report::run_breakdown(&meter, args, out)?,
        Commands::Trend(args) => report::run_trend(&meter, args, out)?,
        Commands::Session(args) => report::run_session(&meter, args, out)?,
        Commands::Status => report::run_status(&meter, out)?,
        Commands::Check => return report::run_check(&meter, out),
        Commands::Suggest => report::run_suggest(&meter, out)?,
        Commands::Models => report::run_models(&meter, out)?,
        Commands::Budget { action } => budget::run_budget(&meter, action, out).await?,
        Commands::Export(args) => transfer::run_export(&meter, args, out).await?,
        Commands::Import(args) => transfer::run_import(&meter, args, out).await?,
        Commands::Clear(args) => transfer::run_clear(&meter, args, out).await?,
        Commands::Reset(args) => transfer::run_reset(&meter, args, out).await?,
    }
    Ok(0)
}

async fn open_meter(config: &HaloConfig) -> Result<UsageMeter, HaloError> {
    let store = halo_storage::open_store(&config.storage).await?;
    let (meter, load_errors) = UsageMeter::open(store, config).await?;
    for error in &load_errors {
        warn!(error = %error, "persisted usage data could not be read");
        eprintln!("warning: {error}");
    }
    Ok(meter)
}

/// Initialize the tracing subscriber. Logs go to stderr so JSON output stays clean.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("halo={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
