// SPDX-FileCopyrightText: 2026 Halo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Usage metering and budget enforcement for AI operations.
//!
//! This crate provides:
//! - **Pricing**: per-model rates and the cost calculator
//! - **Ledger**: the persisted, append-only record of every completed operation
//! - **Aggregation**: daily summaries, month-to-date totals, breakdowns and trends
//! - **Budget**: daily/monthly limits with an advisory enforcement decision
//! - **Advisor**: heuristic suggestions for lowering spend
//! - **Export**: JSON and CSV export, JSON import
//!
//! [`UsageMeter`] ties them together over an injected
//! [`StorageAdapter`](halo_core::StorageAdapter).

pub mod advisor;
pub mod aggregate;
pub mod budget;
pub mod clock;
pub mod export;
pub mod ledger;
pub mod meter;
pub mod pricing;

pub use advisor::{Suggestion, SuggestionKind};
pub use aggregate::{CategoryCost, CostBreakdown, DailyCostSummary, SavingsEstimate, UsageTrendPoint};
pub use budget::{Budget, BudgetStatus, BudgetUpdate, EnforcementDecision, PeriodStatus};
pub use clock::{Calendar, Clock, ManualClock, SystemClock};
pub use export::ExportFormat;
pub use ledger::{CostLedger, OperationRecord, PendingRecord};
pub use meter::{UsageMeter, default_session_window};
pub use pricing::{ModelRate, PricingTable, estimate_tokens};
