// SPDX-FileCopyrightText: 2026 Halo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Commands that move or delete usage data: export, import, clear and reset.

use std::io::Write;
use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Args;
use halo_core::HaloError;
use halo_cost::{ExportFormat, UsageMeter};
use serde::Serialize;
use tracing::info;

use crate::output::Output;

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Output format: json or csv.
    #[arg(long, short, default_value = "json", value_parser = parse_format)]
    pub format: ExportFormat,

    /// Write to this file instead of stdout.
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// A JSON file produced by `halo export`.
    pub file: PathBuf,
}

#[derive(Args, Debug)]
pub struct ClearArgs {
    /// Only delete records before this date (YYYY-MM-DD).
    #[arg(long)]
    pub before: Option<NaiveDate>,

    /// Confirm the deletion.
    #[arg(long)]
    pub yes: bool,
}

#[derive(Args, Debug)]
pub struct ResetArgs {
    /// Confirm the reset.
    #[arg(long)]
    pub yes: bool,
}

fn parse_format(value: &str) -> Result<ExportFormat, String> {
    value
        .parse()
        .map_err(|_| format!("unknown format `{value}`; expected json or csv"))
}

fn require_confirmation(yes: bool, what: &str) -> Result<(), HaloError> {
    if yes {
        Ok(())
    } else {
        Err(HaloError::invalid(
            "confirmation",
            format!("{what} cannot be undone; re-run with --yes"),
        ))
    }
}

#[derive(Serialize)]
struct Outcome<'a> {
    action: &'a str,
    records: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
}

/// Run the `halo export` command.
pub async fn run_export(meter: &UsageMeter, args: ExportArgs, out: &Output) -> Result<(), HaloError> {
    let bytes = meter.export(args.format)?;
    match &args.output {
        Some(path) => {
            tokio::fs::write(path, &bytes)
                .await
                .map_err(|e| HaloError::Export {
                    message: format!("cannot write {}: {e}", path.display()),
                })?;
            let records = meter.records().len();
            info!(path = %path.display(), format = %args.format, records, "usage data exported");
            report(
                out,
                &Outcome {
                    action: "exported",
                    records,
                    path: Some(path.display().to_string()),
                },
            )
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(&bytes)
                .and_then(|()| stdout.flush())
                .map_err(|e| HaloError::Export {
                    message: format!("cannot write to stdout: {e}"),
                })
        }
    }
}

/// Run the `halo import` command.
pub async fn run_import(meter: &UsageMeter, args: ImportArgs, out: &Output) -> Result<(), HaloError> {
    let bytes = tokio::fs::read(&args.file)
        .await
        .map_err(|e| HaloError::MalformedImport {
            message: format!("cannot read {}", args.file.display()),
            source: Some(Box::new(e)),
        })?;
    let records = meter.import(&bytes).await?;
    report(
        out,
        &Outcome {
            action: "imported",
            records,
            path: Some(args.file.display().to_string()),
        },
    )
}

/// Run the `halo clear` command.
pub async fn run_clear(meter: &UsageMeter, args: ClearArgs, out: &Output) -> Result<(), HaloError> {
    require_confirmation(args.yes, "deleting history")?;
    let cutoff = args.before.map(|date| meter.calendar().start_of_day(date));
    let removed = meter.clear_history(cutoff).await?;
    report(
        out,
        &Outcome {
            action: "removed",
            records: removed,
            path: None,
        },
    )
}

/// Run the `halo reset` command.
pub async fn run_reset(meter: &UsageMeter, args: ResetArgs, out: &Output) -> Result<(), HaloError> {
    require_confirmation(args.yes, "a reset")?;
    let records = meter.records().len();
    meter.reset().await?;
    report(
        out,
        &Outcome {
            action: "reset",
            records,
            path: None,
        },
    )
}

fn report(out: &Output, outcome: &Outcome<'_>) -> Result<(), HaloError> {
    if out.is_json() {
        return out.print_json(outcome);
    }
    match &outcome.path {
        Some(path) => println!("{} {} records ({path})", outcome.action, outcome.records),
        None => println!("{} {} records", outcome.action, outcome.records),
    }
    Ok(())
}
