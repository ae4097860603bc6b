// SPDX-FileCopyrightText: 2026 Halo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON and CSV export, and JSON import.
//!
//! A JSON export carries the full ledger, the budget and a summary snapshot.
//! Import reads back only the ledger and the budget; the snapshot is
//! informational. Import is all-or-nothing: the whole document is parsed and
//! checked before the caller touches any state.

use chrono::{DateTime, SecondsFormat, Utc};
use halo_core::HaloError;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::aggregate::{CostBreakdown, DailyCostSummary};
use crate::budget::Budget;
use crate::ledger::OperationRecord;

/// Column header of the CSV export.
pub const CSV_HEADER: [&str; 7] = [
    "Date",
    "Operation",
    "Model",
    "InputTokens",
    "OutputTokens",
    "CachedTokens",
    "Cost",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Csv,
}

/// Computed figures included in a JSON export.
#[derive(Debug, Clone, Serialize)]
pub struct ExportSummary {
    pub today: DailyCostSummary,
    pub month_to_date: f64,
    pub breakdown: CostBreakdown,
}

#[derive(Serialize)]
struct ExportDocument<'a> {
    operations: &'a [OperationRecord],
    budget: &'a Budget,
    summary: &'a ExportSummary,
    export_date: DateTime<Utc>,
}

/// The parts of an export that import restores.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ImportDocument {
    pub operations: Vec<OperationRecord>,
    pub budget: Budget,
}

/// Pretty-printed JSON export.
pub fn to_json(
    records: &[OperationRecord],
    budget: &Budget,
    summary: &ExportSummary,
    export_date: DateTime<Utc>,
) -> Result<Vec<u8>, HaloError> {
    let document = ExportDocument {
        operations: records,
        budget,
        summary,
        export_date,
    };
    serde_json::to_vec_pretty(&document).map_err(|e| HaloError::Export {
        message: format!("failed to encode JSON export: {e}"),
    })
}

/// One CSV row per record. Dates are RFC 3339 in UTC, costs have four decimals.
pub fn to_csv(records: &[OperationRecord]) -> Result<Vec<u8>, HaloError> {
    let export_err = |e: csv::Error| HaloError::Export {
        message: format!("failed to write CSV export: {e}"),
    };

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER).map_err(export_err)?;
    for record in records {
        writer
            .write_record([
                record.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
                record.operation.to_string(),
                record.model.clone(),
                record.tokens.input.to_string(),
                record.tokens.output.to_string(),
                record.tokens.cached.to_string(),
                format!("{:.4}", record.cost),
            ])
            .map_err(export_err)?;
    }
    writer.into_inner().map_err(|e| HaloError::Export {
        message: format!("failed to flush CSV export: {}", e.error()),
    })
}

/// Parse and check a JSON export without applying it.
pub fn parse_import(bytes: &[u8]) -> Result<ImportDocument, HaloError> {
    let document: ImportDocument =
        serde_json::from_slice(bytes).map_err(|e| HaloError::MalformedImport {
            message: format!("not a usage export: {e}"),
            source: Some(Box::new(e)),
        })?;

    document.budget.validate().map_err(|e| malformed(format!("budget: {e}")))?;

    let mut previous = None;
    for (index, record) in document.operations.iter().enumerate() {
        if record.model.trim().is_empty() {
            return Err(malformed(format!("operation {index} has no model")));
        }
        if !(record.cost.is_finite() && record.cost >= 0.0) {
            return Err(malformed(format!(
                "operation {index} has invalid cost {}",
                record.cost
            )));
        }
        if !record.tokens.is_consistent() {
            return Err(malformed(format!(
                "operation {index} token total does not match its parts"
            )));
        }
        if record.cached != record.tokens.is_cached() {
            return Err(malformed(format!(
                "operation {index} cached flag disagrees with its cached tokens"
            )));
        }
        if previous.is_some_and(|prev| record.id <= prev) {
            return Err(malformed(format!(
                "operation {index} id {} is not greater than the one before it",
                record.id
            )));
        }
        previous = Some(record.id);
    }

    Ok(document)
}

fn malformed(message: String) -> HaloError {
    HaloError::MalformedImport {
        message,
        source: None,
    }
}
