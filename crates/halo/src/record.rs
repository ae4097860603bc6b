// SPDX-FileCopyrightText: 2026 Halo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `halo record` command implementation.

use clap::Args;
use halo_config::HaloConfig;
use halo_core::{HaloError, OperationKind, TokenUsage};
use halo_cost::ledger::LEDGER_KEY;
use halo_cost::{EnforcementDecision, OperationRecord, UsageMeter, estimate_tokens};
use tracing::warn;

use crate::output::{Level, Output, usd};

#[derive(Args, Debug)]
pub struct RecordArgs {
    /// Operation kind: chat, search, file-analysis, code-generation or task-automation.
    #[arg(long, short = 'k', default_value = "chat")]
    pub kind: String,

    /// Model identifier. Defaults to the configured pricing default.
    #[arg(long, short)]
    pub model: Option<String>,

    /// Input tokens.
    #[arg(long, allow_hyphen_values = true)]
    pub input: Option<i64>,

    /// Output tokens.
    #[arg(long, allow_hyphen_values = true, default_value_t = 0)]
    pub output: i64,

    /// Cached tokens.
    #[arg(long, allow_hyphen_values = true, default_value_t = 0)]
    pub cached: i64,

    /// Estimate input tokens from this text when `--input` is not given.
    #[arg(long, conflicts_with = "input")]
    pub text: Option<String>,

    /// The operation failed.
    #[arg(long)]
    pub failed: bool,
}

impl RecordArgs {
    /// Validated token usage from the flags.
    fn usage(&self) -> Result<TokenUsage, HaloError> {
        let input = match (self.input, &self.text) {
            (Some(input), _) => input,
            (None, Some(text)) => i64::try_from(estimate_tokens(text)).unwrap_or(i64::MAX),
            (None, None) => 0,
        };
        TokenUsage::try_new(input, self.output, self.cached)
    }
}

/// Run the `halo record` command.
pub async fn run_record(
    meter: &UsageMeter,
    config: &HaloConfig,
    args: RecordArgs,
    out: &Output,
) -> Result<(), HaloError> {
    let operation = OperationKind::parse(&args.kind)?;
    let tokens = args.usage()?;
    let model = args
        .model
        .clone()
        .unwrap_or_else(|| config.pricing.default_model.clone());

    let record = record_durably(meter, operation, &model, tokens, !args.failed).await?;
    let decision = meter.evaluate();

    if out.is_json() {
        #[derive(serde::Serialize)]
        struct Recorded<'a> {
            record: &'a halo_cost::OperationRecord,
            decision: &'a EnforcementDecision,
        }
        return out.print_json(&Recorded {
            record: &record,
            decision: &decision,
        });
    }

    out.heading("recorded");
    out.field("Id", record.id);
    out.field("Operation", record.operation);
    out.field("Model", &record.model);
    out.field(
        "Tokens",
        format!(
            "{} in / {} out / {} cached",
            record.tokens.input, record.tokens.output, record.tokens.cached
        ),
    );
    out.field("Cost", usd(record.cost));
    match &decision {
        EnforcementDecision::Ok => {}
        EnforcementDecision::Warning { message, .. } => {
            out.field("Budget", format!("{} {message}", out.marker(Level::Warn)));
        }
        EnforcementDecision::Blocked { message, .. } => {
            out.field("Budget", format!("{} {message}", out.marker(Level::Fail)));
        }
    }
    out.blank();
    Ok(())
}

/// Record an operation, retrying a failed save once.
///
/// The process exits right after, so a record that still cannot be written is
/// reported as lost rather than left for a later retry.
async fn record_durably(
    meter: &UsageMeter,
    operation: OperationKind,
    model: &str,
    tokens: TokenUsage,
    success: bool,
) -> Result<OperationRecord, HaloError> {
    let id = match meter
        .record_operation(operation, model, tokens, success)
        .await
    {
        Err(HaloError::NotPersisted {
            record_id: Some(id),
            source,
            ..
        }) => {
            warn!(record = %id, error = %source, "save failed; retrying once");
            id
        }
        other => return other,
    };
    meter.flush().await.map_err(|e| {
        HaloError::storage(
            LEDGER_KEY,
            format!("record {id} was not saved and has been discarded: {e}"),
        )
    })?;
    meter
        .query(|r| r.id == id)
        .into_iter()
        .next()
        .ok_or_else(|| HaloError::Internal(format!("record {id} vanished after saving")))
}
