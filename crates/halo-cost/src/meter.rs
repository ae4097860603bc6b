// SPDX-FileCopyrightText: 2026 Halo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The usage meter: one handle over pricing, ledger, budget and reporting.
//!
//! Callers record each completed operation through [`UsageMeter::record_operation`]
//! and ask [`UsageMeter::evaluate`] (or [`UsageMeter::check_budget`]) before
//! starting new paid work. Every read-side query runs over a single ledger
//! snapshot, so it never sees a half-applied append.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use halo_config::HaloConfig;
use halo_core::{HaloError, OperationKind, StorageAdapter, TokenUsage};
use tracing::{info, warn};

use crate::advisor::{self, BATCHING_SAMPLE, Suggestion};
use crate::aggregate::{Aggregator, CostBreakdown, DailyCostSummary, UsageTrendPoint};
use crate::budget::{Budget, BudgetMonitor, BudgetStatus, BudgetUpdate, EnforcementDecision};
use crate::clock::{Calendar, Clock, SystemClock};
use crate::export::{self, ExportFormat, ExportSummary};
use crate::ledger::{CostLedger, OperationRecord, PendingRecord};
use crate::pricing::PricingTable;

/// Default look-back for [`UsageMeter::session_cost`]: one hour.
pub fn default_session_window() -> Duration {
    Duration::hours(1)
}

/// Metering engine over an injected storage backend.
pub struct UsageMeter {
    ledger: CostLedger,
    budget: BudgetMonitor,
    pricing: PricingTable,
    calendar: Calendar,
    clock: Arc<dyn Clock>,
    default_budget: Budget,
}

impl UsageMeter {
    /// Open a meter on the system clock.
    ///
    /// See [`UsageMeter::open_with_clock`].
    pub async fn open(
        store: Arc<dyn StorageAdapter>,
        config: &HaloConfig,
    ) -> Result<(Self, Vec<HaloError>), HaloError> {
        Self::open_with_clock(store, config, Arc::new(SystemClock)).await
    }

    /// Open a meter, loading the persisted ledger and budget from `store`.
    ///
    /// Only a bad pricing configuration fails. Persisted documents that cannot
    /// be read are replaced by an empty ledger or the configured budget, and
    /// the load errors are returned next to the meter for reporting.
    pub async fn open_with_clock(
        store: Arc<dyn StorageAdapter>,
        config: &HaloConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<(Self, Vec<HaloError>), HaloError> {
        let pricing = PricingTable::from_config(&config.pricing)?;
        let default_budget = Budget::from(&config.budget);
        default_budget.validate()?;

        let (ledger, ledger_error) = CostLedger::load(Arc::clone(&store)).await;
        let (budget, budget_error) = BudgetMonitor::load(store, default_budget.clone()).await;
        let load_errors: Vec<HaloError> = ledger_error.into_iter().chain(budget_error).collect();

        info!(
            records = ledger.len(),
            time_zone = ?config.calendar.time_zone,
            default_model = pricing.default_model(),
            "usage meter ready"
        );

        Ok((
            Self {
                ledger,
                budget,
                pricing,
                calendar: Calendar::new(config.calendar.time_zone),
                clock,
                default_budget,
            },
            load_errors,
        ))
    }

    pub fn pricing(&self) -> &PricingTable {
        &self.pricing
    }

    pub fn calendar(&self) -> Calendar {
        self.calendar
    }

    /// The underlying ledger, for raw appends and queries.
    pub fn ledger(&self) -> &CostLedger {
        &self.ledger
    }

    /// Cost of `tokens` on `model` under the current pricing.
    pub fn calculate(&self, model: &str, tokens: &TokenUsage) -> f64 {
        self.pricing.calculate(model, tokens)
    }

    /// Price a completed operation and append it to the ledger.
    ///
    /// The record is appended whatever the budget says. Afterwards the budget
    /// is evaluated and any warning or block is logged for operators; acting
    /// on it is up to the caller.
    pub async fn record_operation(
        &self,
        operation: OperationKind,
        model: &str,
        tokens: TokenUsage,
        success: bool,
    ) -> Result<OperationRecord, HaloError> {
        if model.trim().is_empty() {
            return Err(HaloError::invalid("model", "must not be empty"));
        }
        if !tokens.is_consistent() {
            return Err(HaloError::invalid(
                "tokens",
                format!(
                    "total {} does not equal input {} + output {} + cached {}",
                    tokens.total, tokens.input, tokens.output, tokens.cached
                ),
            ));
        }
        let pending = PendingRecord {
            timestamp: self.clock.now(),
            operation,
            model: model.to_string(),
            cost: self.pricing.calculate(model, &tokens),
            tokens,
            success,
        };
        let record = self.ledger.append(pending).await?;

        match self.evaluate() {
            EnforcementDecision::Ok => {}
            EnforcementDecision::Warning { period, message } => {
                warn!(%period, %message, "budget warning");
            }
            EnforcementDecision::Blocked { period, message } => {
                warn!(%period, %message, "budget exhausted; new work should be refused");
            }
        }
        Ok(record)
    }

    /// Records matching `predicate`, in append order.
    pub fn query<F>(&self, predicate: F) -> Vec<OperationRecord>
    where
        F: Fn(&OperationRecord) -> bool,
    {
        self.ledger.query(predicate)
    }

    /// All records, in append order.
    pub fn records(&self) -> Arc<Vec<OperationRecord>> {
        self.ledger.snapshot()
    }

    pub fn today_summary(&self) -> DailyCostSummary {
        let records = self.ledger.snapshot();
        self.aggregator(&records).today_summary()
    }

    pub fn month_to_date_cost(&self) -> f64 {
        let records = self.ledger.snapshot();
        self.aggregator(&records).month_to_date_cost()
    }

    /// Breakdown of records at or after `window_start`.
    pub fn breakdown(&self, window_start: DateTime<Utc>) -> CostBreakdown {
        let records = self.ledger.snapshot();
        self.aggregator(&records).breakdown(window_start)
    }

    /// Breakdown since the first instant of the current month.
    pub fn month_breakdown(&self) -> CostBreakdown {
        self.breakdown(self.start_of_month())
    }

    /// Last `days` days of cost, oldest first, exactly `days` points.
    pub fn trend(&self, days: u32) -> Vec<UsageTrendPoint> {
        let records = self.ledger.snapshot();
        self.aggregator(&records).trend(days)
    }

    /// Cost of records newer than `now - window`.
    pub fn session_cost(&self, window: Duration) -> f64 {
        let records = self.ledger.snapshot();
        self.aggregator(&records).session_cost(window)
    }

    pub fn status(&self) -> BudgetStatus {
        self.status_under(&self.budget.get())
    }

    /// Advisory decision for a caller about to start new paid work.
    pub fn evaluate(&self) -> EnforcementDecision {
        let budget = self.budget.get();
        EnforcementDecision::decide(&budget, &self.status_under(&budget))
    }

    /// [`UsageMeter::evaluate`] as a `Result`, for callers that gate with `?`.
    pub fn check_budget(&self) -> Result<(), HaloError> {
        match self.evaluate() {
            EnforcementDecision::Blocked { period, message } => {
                Err(HaloError::BudgetExhausted { period, message })
            }
            EnforcementDecision::Ok | EnforcementDecision::Warning { .. } => Ok(()),
        }
    }

    /// Optimization suggestions over this month's spend and recent call timing.
    pub fn suggestions(&self) -> Vec<Suggestion> {
        let records = self.ledger.snapshot();
        let breakdown = self.aggregator(&records).breakdown(self.start_of_month());
        let recent = &records[records.len().saturating_sub(BATCHING_SAMPLE)..];
        advisor::suggest(&breakdown, recent, &self.pricing)
    }

    pub fn get_budget(&self) -> Budget {
        self.budget.get()
    }

    /// Merge `update` into the budget and persist it.
    pub async fn set_budget(&self, update: &BudgetUpdate) -> Result<Budget, HaloError> {
        self.budget.set(update).await
    }

    /// Render the ledger and budget in `format`.
    pub fn export(&self, format: ExportFormat) -> Result<Vec<u8>, HaloError> {
        let records = self.ledger.snapshot();
        match format {
            ExportFormat::Csv => export::to_csv(&records),
            ExportFormat::Json => {
                let now = self.clock.now();
                let agg = Aggregator::new(&records, self.calendar, now);
                let summary = ExportSummary {
                    today: agg.today_summary(),
                    month_to_date: agg.month_to_date_cost(),
                    breakdown: agg.breakdown(self.calendar.start_of_month(now)),
                };
                export::to_json(&records, &self.budget.get(), &summary, now)
            }
        }
    }

    /// Replace ledger and budget from a JSON export.
    ///
    /// A malformed document changes nothing. A failed durable write leaves the
    /// imported state in memory and is reported as not persisted.
    pub async fn import(&self, bytes: &[u8]) -> Result<usize, HaloError> {
        let document = export::parse_import(bytes)?;
        let count = document.operations.len();

        let ledger_result = self.ledger.replace(document.operations).await;
        let budget_result = self.budget.replace(document.budget).await;
        ledger_result?;
        budget_result?;

        info!(records = count, "usage data imported");
        Ok(count)
    }

    /// Remove every record, or only those before `before`.
    pub async fn clear_history(&self, before: Option<DateTime<Utc>>) -> Result<usize, HaloError> {
        self.ledger.clear_history(before).await
    }

    /// Empty the ledger and restore the configured budget.
    pub async fn reset(&self) -> Result<(), HaloError> {
        let ledger_result = self.ledger.clear_history(None).await;
        let budget_result = self.budget.replace(self.default_budget.clone()).await;
        ledger_result?;
        budget_result?;
        info!("usage data reset");
        Ok(())
    }

    /// Retry any durable write that failed earlier.
    pub async fn flush(&self) -> Result<(), HaloError> {
        let ledger_result = self.ledger.flush().await;
        let budget_result = self.budget.flush().await;
        ledger_result?;
        budget_result
    }

    fn status_under(&self, budget: &Budget) -> BudgetStatus {
        let records = self.ledger.snapshot();
        let agg = self.aggregator(&records);
        BudgetStatus::compute(budget, agg.today_summary().total_cost, agg.month_to_date_cost())
    }

    fn start_of_month(&self) -> DateTime<Utc> {
        self.calendar.start_of_month(self.clock.now())
    }

    fn aggregator<'a>(&self, records: &'a [OperationRecord]) -> Aggregator<'a> {
        Aggregator::new(records, self.calendar, self.clock.now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use halo_config::model::TimeZonePolicy;
    use halo_core::BudgetPeriod;
    use halo_storage::MemoryStore;
    use tracing_test::traced_test;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn config() -> HaloConfig {
        let mut config = HaloConfig::default();
        config.calendar.time_zone = TimeZonePolicy::Utc;
        config
    }

    async fn meter_at(now: &str) -> (UsageMeter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(at(now)));
        let (meter, errors) =
            UsageMeter::open_with_clock(Arc::new(MemoryStore::new()), &config(), clock.clone())
                .await
                .unwrap();
        assert!(errors.is_empty());
        (meter, clock)
    }

    #[tokio::test]
    async fn records_are_priced_from_the_table() {
        let (meter, _) = meter_at("2026-03-10T09:00:00Z").await;
        let record = meter
            .record_operation(
                OperationKind::Chat,
                "claude-3-5-haiku-20241022",
                TokenUsage::new(1000, 2000, 0),
                true,
            )
            .await
            .unwrap();
        assert!((record.cost - 0.00275).abs() < 1e-12);
        assert_eq!(record.timestamp, at("2026-03-10T09:00:00Z"));
        assert_eq!(meter.records().len(), 1);
    }

    #[tokio::test]
    async fn empty_model_is_rejected_without_recording() {
        let (meter, _) = meter_at("2026-03-10T09:00:00Z").await;
        let err = meter
            .record_operation(OperationKind::Search, "  ", TokenUsage::new(1, 1, 0), true)
            .await
            .unwrap_err();
        assert!(matches!(err, HaloError::InvalidInput { .. }));
        assert!(meter.records().is_empty());
    }

    #[tokio::test]
    async fn inconsistent_token_totals_are_rejected_without_recording() {
        let (meter, _) = meter_at("2026-03-10T09:00:00Z").await;
        let forged = TokenUsage {
            input: 10,
            output: 10,
            cached: 0,
            total: 999,
        };
        for tokens in [forged, TokenUsage::new(u64::MAX, 1, 0)] {
            let err = meter
                .record_operation(OperationKind::Chat, "claude-3-opus-20240229", tokens, true)
                .await
                .unwrap_err();
            assert!(matches!(err, HaloError::InvalidInput { .. }), "{err}");
        }
        assert!(meter.records().is_empty());

        // Whatever the meter accepts, its own importer accepts back.
        meter
            .record_operation(
                OperationKind::Chat,
                "claude-3-opus-20240229",
                TokenUsage::checked(u64::MAX - 1, 1, 0).unwrap(),
                true,
            )
            .await
            .unwrap();
        let exported = meter.export(ExportFormat::Json).unwrap();
        let (fresh, _) = meter_at("2026-03-10T09:00:00Z").await;
        assert_eq!(fresh.import(&exported).await.unwrap(), 1);
        assert_eq!(*fresh.records(), *meter.records());
    }

    #[tokio::test]
    async fn config_budget_applies_until_changed() {
        let (meter, _) = meter_at("2026-03-10T09:00:00Z").await;
        let budget = meter.get_budget();
        assert_eq!(budget.daily_limit, Some(10.0));
        assert_eq!(budget.monthly_limit, Some(200.0));
        assert!(budget.hard_stop);

        let updated = meter
            .set_budget(&BudgetUpdate::default().daily_limit(Some(1.0)))
            .await
            .unwrap();
        assert_eq!(updated.daily_limit, Some(1.0));
        assert_eq!(updated.monthly_limit, Some(200.0));
    }

    #[tokio::test]
    async fn check_budget_errors_once_blocked() {
        let (meter, _) = meter_at("2026-03-10T09:00:00Z").await;
        meter
            .set_budget(&BudgetUpdate::default().daily_limit(Some(0.01)))
            .await
            .unwrap();
        assert!(meter.check_budget().is_ok());

        meter
            .record_operation(
                OperationKind::CodeGeneration,
                "claude-3-opus-20240229",
                TokenUsage::new(1000, 1000, 0),
                true,
            )
            .await
            .unwrap();
        match meter.check_budget() {
            Err(HaloError::BudgetExhausted { period, .. }) => assert_eq!(period, BudgetPeriod::Daily),
            other => panic!("expected exhausted budget, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn day_rollover_resets_today_but_not_month() {
        let (meter, clock) = meter_at("2026-03-10T23:00:00Z").await;
        meter
            .record_operation(
                OperationKind::Chat,
                "claude-3-sonnet-20240229",
                TokenUsage::new(1_000_000, 0, 0),
                true,
            )
            .await
            .unwrap();
        assert!((meter.today_summary().total_cost - 3.0).abs() < 1e-9);

        clock.advance(Duration::hours(2));
        assert_eq!(meter.today_summary().total_cost, 0.0);
        assert!((meter.month_to_date_cost() - 3.0).abs() < 1e-9);
        assert!((meter.session_cost(Duration::hours(3)) - 3.0).abs() < 1e-9);
        assert_eq!(meter.session_cost(default_session_window()), 0.0);
    }

    #[tokio::test]
    async fn reset_restores_configured_budget() {
        let (meter, _) = meter_at("2026-03-10T09:00:00Z").await;
        meter
            .record_operation(OperationKind::Chat, "x", TokenUsage::new(1, 1, 0), false)
            .await
            .unwrap();
        meter
            .set_budget(&BudgetUpdate::default().hard_stop(false))
            .await
            .unwrap();

        meter.reset().await.unwrap();
        assert!(meter.records().is_empty());
        assert!(meter.get_budget().hard_stop);
    }

    #[tokio::test]
    #[traced_test]
    async fn budget_warning_is_logged_but_record_kept() {
        let (meter, _) = meter_at("2026-03-10T09:00:00Z").await;
        meter
            .set_budget(&BudgetUpdate::default().daily_limit(Some(3.5)))
            .await
            .unwrap();
        meter
            .record_operation(
                OperationKind::Chat,
                "claude-3-sonnet-20240229",
                TokenUsage::new(1_000_000, 0, 0),
                true,
            )
            .await
            .unwrap();
        assert_eq!(meter.records().len(), 1);
        assert!(logs_contain("budget warning"));
    }
}
