// SPDX-FileCopyrightText: 2026 Halo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Budget policy, status and the advisory enforcement decision.
//!
//! The monitor never refuses anything itself. It turns the day's and the
//! month's spend into a [`BudgetStatus`] and an [`EnforcementDecision`] that
//! callers consult before starting new paid work.
//!
//! A limit of zero is treated the same as no limit.

use std::sync::Arc;

use arc_swap::ArcSwap;
use halo_config::model::BudgetConfig;
use halo_core::{BudgetPeriod, HaloError, StorageAdapter};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Storage key of the budget document.
pub const BUDGET_KEY: &str = "halo-budget-settings";

/// Spend ceilings and how to react to them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    pub daily_limit: Option<f64>,
    pub monthly_limit: Option<f64>,
    /// Fraction of a limit at which a warning is raised, in `[0, 1]`.
    pub warning_threshold: f64,
    /// Advise blocking new work once a limit is reached.
    pub hard_stop: bool,
    /// Informational only; suggestions are never applied automatically.
    pub auto_optimize: bool,
}

impl Default for Budget {
    fn default() -> Self {
        Self {
            daily_limit: None,
            monthly_limit: None,
            warning_threshold: 0.8,
            hard_stop: false,
            auto_optimize: false,
        }
    }
}

impl From<&BudgetConfig> for Budget {
    fn from(config: &BudgetConfig) -> Self {
        Self {
            daily_limit: config.daily_limit_usd,
            monthly_limit: config.monthly_limit_usd,
            warning_threshold: config.warning_threshold,
            hard_stop: config.hard_stop,
            auto_optimize: config.auto_optimize,
        }
    }
}

impl Budget {
    /// Check that limits and threshold are in range.
    pub fn validate(&self) -> Result<(), HaloError> {
        for (field, limit) in [
            ("daily limit", self.daily_limit),
            ("monthly limit", self.monthly_limit),
        ] {
            if let Some(value) = limit
                && !(value.is_finite() && value >= 0.0)
            {
                return Err(HaloError::invalid(
                    field,
                    format!("must be a non-negative amount, got {value}"),
                ));
            }
        }
        if !(0.0..=1.0).contains(&self.warning_threshold) {
            return Err(HaloError::invalid(
                "warning threshold",
                format!("must be between 0 and 1, got {}", self.warning_threshold),
            ));
        }
        Ok(())
    }

    /// Merge `update` into a copy of this budget and validate the result.
    pub fn merged(&self, update: &BudgetUpdate) -> Result<Self, HaloError> {
        let mut next = self.clone();
        if let Some(daily) = update.daily_limit {
            next.daily_limit = daily;
        }
        if let Some(monthly) = update.monthly_limit {
            next.monthly_limit = monthly;
        }
        if let Some(threshold) = update.warning_threshold {
            next.warning_threshold = threshold;
        }
        if let Some(hard_stop) = update.hard_stop {
            next.hard_stop = hard_stop;
        }
        if let Some(auto_optimize) = update.auto_optimize {
            next.auto_optimize = auto_optimize;
        }
        next.validate()?;
        Ok(next)
    }

    fn limit(&self, period: BudgetPeriod) -> Option<f64> {
        let limit = match period {
            BudgetPeriod::Daily => self.daily_limit,
            BudgetPeriod::Monthly => self.monthly_limit,
        };
        limit.filter(|l| *l > 0.0)
    }
}

/// Partial budget change. `None` leaves a field as it is.
///
/// Limits are doubly optional: `Some(None)` clears a limit, `Some(Some(x))`
/// sets it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BudgetUpdate {
    pub daily_limit: Option<Option<f64>>,
    pub monthly_limit: Option<Option<f64>>,
    pub warning_threshold: Option<f64>,
    pub hard_stop: Option<bool>,
    pub auto_optimize: Option<bool>,
}

impl BudgetUpdate {
    pub fn daily_limit(mut self, limit: Option<f64>) -> Self {
        self.daily_limit = Some(limit);
        self
    }

    pub fn monthly_limit(mut self, limit: Option<f64>) -> Self {
        self.monthly_limit = Some(limit);
        self
    }

    pub fn warning_threshold(mut self, threshold: f64) -> Self {
        self.warning_threshold = Some(threshold);
        self
    }

    pub fn hard_stop(mut self, hard_stop: bool) -> Self {
        self.hard_stop = Some(hard_stop);
        self
    }

    pub fn auto_optimize(mut self, auto_optimize: bool) -> Self {
        self.auto_optimize = Some(auto_optimize);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Spend against one period's limit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PeriodStatus {
    pub used: f64,
    pub limit: Option<f64>,
    /// `used / limit * 100`, or 0 without a limit.
    pub percentage: f64,
    /// `used >= limit * warning_threshold`, false without a limit.
    pub warning: bool,
}

impl PeriodStatus {
    fn compute(used: f64, limit: Option<f64>, threshold: f64) -> Self {
        match limit {
            Some(limit) => Self {
                used,
                limit: Some(limit),
                percentage: used / limit * 100.0,
                warning: used >= limit * threshold,
            },
            None => Self {
                used,
                limit: None,
                percentage: 0.0,
                warning: false,
            },
        }
    }

    fn exhausted(&self) -> bool {
        self.limit.is_some_and(|limit| self.used >= limit)
    }
}

/// Daily and monthly spend against the current budget.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BudgetStatus {
    pub daily: PeriodStatus,
    pub monthly: PeriodStatus,
}

impl BudgetStatus {
    pub fn compute(budget: &Budget, today_cost: f64, month_cost: f64) -> Self {
        Self {
            daily: PeriodStatus::compute(
                today_cost,
                budget.limit(BudgetPeriod::Daily),
                budget.warning_threshold,
            ),
            monthly: PeriodStatus::compute(
                month_cost,
                budget.limit(BudgetPeriod::Monthly),
                budget.warning_threshold,
            ),
        }
    }

    fn period(&self, period: BudgetPeriod) -> &PeriodStatus {
        match period {
            BudgetPeriod::Daily => &self.daily,
            BudgetPeriod::Monthly => &self.monthly,
        }
    }
}

/// Advice for a caller about to start new paid work.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "decision", rename_all = "lowercase")]
pub enum EnforcementDecision {
    Ok,
    Warning { period: BudgetPeriod, message: String },
    Blocked { period: BudgetPeriod, message: String },
}

impl EnforcementDecision {
    /// Decide from a status. Daily is considered before monthly.
    pub fn decide(budget: &Budget, status: &BudgetStatus) -> Self {
        const PERIODS: [BudgetPeriod; 2] = [BudgetPeriod::Daily, BudgetPeriod::Monthly];

        if budget.hard_stop {
            for period in PERIODS {
                let current = status.period(period);
                if let Some(limit) = current.limit
                    && current.exhausted()
                {
                    return Self::Blocked {
                        period,
                        message: format!(
                            "{period} budget of ${limit:.2} reached (${:.2} spent)",
                            current.used
                        ),
                    };
                }
            }
        }

        for period in PERIODS {
            let current = status.period(period);
            if let Some(limit) = current.limit
                && current.warning
            {
                return Self::Warning {
                    period,
                    message: format!(
                        "{:.0}% of the {period} budget used (${:.2} of ${limit:.2})",
                        current.percentage, current.used
                    ),
                };
            }
        }

        Self::Ok
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked { .. })
    }
}

/// Holds the current budget and persists it on every change.
pub struct BudgetMonitor {
    budget: ArcSwap<Budget>,
    /// Guards writes; true when the stored document is stale.
    dirty: Mutex<bool>,
    store: Arc<dyn StorageAdapter>,
}

impl BudgetMonitor {
    pub fn new(store: Arc<dyn StorageAdapter>, budget: Budget) -> Self {
        Self {
            budget: ArcSwap::from_pointee(budget),
            dirty: Mutex::new(false),
            store,
        }
    }

    /// Load the persisted budget, or use `fallback` when there is none.
    ///
    /// An unreadable or invalid document also falls back, and the error is
    /// handed back for reporting.
    pub async fn load(store: Arc<dyn StorageAdapter>, fallback: Budget) -> (Self, Option<HaloError>) {
        let loaded = match store.load(BUDGET_KEY).await {
            Ok(None) => Ok(None),
            Ok(Some(bytes)) => serde_json::from_slice::<Budget>(&bytes)
                .map_err(|e| HaloError::storage(BUDGET_KEY, e))
                .and_then(|budget| {
                    budget
                        .validate()
                        .map(|()| Some(budget))
                        .map_err(|e| HaloError::storage(BUDGET_KEY, e))
                }),
            Err(e) => Err(e),
        };
        match loaded {
            Ok(Some(budget)) => {
                debug!(?budget, "budget settings loaded");
                (Self::new(store, budget), None)
            }
            Ok(None) => (Self::new(store, fallback), None),
            Err(e) => {
                warn!(error = %e, "budget settings could not be loaded, using defaults");
                (Self::new(store, fallback), Some(e))
            }
        }
    }

    /// The budget currently in force.
    pub fn get(&self) -> Budget {
        self.budget.load().as_ref().clone()
    }

    /// Apply a partial update and persist the result.
    ///
    /// Invalid updates change nothing. A failed write keeps the new budget in
    /// memory and returns [`HaloError::NotPersisted`].
    pub async fn set(&self, update: &BudgetUpdate) -> Result<Budget, HaloError> {
        let mut dirty = self.dirty.lock().await;
        let next = self.budget.load().merged(update)?;
        self.budget.store(Arc::new(next.clone()));
        info!(
            daily_limit = ?next.daily_limit,
            monthly_limit = ?next.monthly_limit,
            warning_threshold = next.warning_threshold,
            hard_stop = next.hard_stop,
            "budget updated"
        );
        self.persist(&mut dirty).await?;
        Ok(next)
    }

    /// Replace the whole budget, e.g. on import or reset.
    pub async fn replace(&self, budget: Budget) -> Result<(), HaloError> {
        budget.validate()?;
        let mut dirty = self.dirty.lock().await;
        self.budget.store(Arc::new(budget));
        self.persist(&mut dirty).await
    }

    /// Retry the durable write if the last one failed.
    pub async fn flush(&self) -> Result<(), HaloError> {
        let mut dirty = self.dirty.lock().await;
        if *dirty {
            self.persist(&mut dirty).await?;
        }
        Ok(())
    }

    pub async fn is_dirty(&self) -> bool {
        *self.dirty.lock().await
    }

    async fn persist(&self, dirty: &mut bool) -> Result<(), HaloError> {
        let budget = self.budget.load_full();
        let bytes = serde_json::to_vec(budget.as_ref())
            .map_err(|e| HaloError::Internal(format!("budget serialization failed: {e}")))?;
        match self.store.save(BUDGET_KEY, &bytes).await {
            Ok(()) => {
                *dirty = false;
                Ok(())
            }
            Err(e) => {
                *dirty = true;
                warn!(backend = self.store.name(), error = %e, "budget write failed");
                Err(HaloError::NotPersisted {
                    what: "budget settings".to_string(),
                    record_id: None,
                    source: Box::new(e),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use halo_storage::MemoryStore;

    fn daily_ten() -> Budget {
        Budget {
            daily_limit: Some(10.0),
            monthly_limit: None,
            warning_threshold: 0.8,
            hard_stop: true,
            auto_optimize: false,
        }
    }

    #[test]
    fn near_limit_warns_but_does_not_block() {
        let budget = daily_ten();
        let status = BudgetStatus::compute(&budget, 9.5, 9.5);
        assert_eq!(status.daily.used, 9.5);
        assert_eq!(status.daily.limit, Some(10.0));
        assert!((status.daily.percentage - 95.0).abs() < 1e-9);
        assert!(status.daily.warning);
        assert!(matches!(
            EnforcementDecision::decide(&budget, &status),
            EnforcementDecision::Warning {
                period: BudgetPeriod::Daily,
                ..
            }
        ));
    }

    #[test]
    fn reaching_the_limit_blocks_with_hard_stop() {
        let budget = daily_ten();
        let status = BudgetStatus::compute(&budget, 10.0, 10.0);
        let decision = EnforcementDecision::decide(&budget, &status);
        assert!(decision.is_blocked());
        assert!(matches!(
            decision,
            EnforcementDecision::Blocked {
                period: BudgetPeriod::Daily,
                ..
            }
        ));
    }

    #[test]
    fn without_hard_stop_an_exhausted_budget_only_warns() {
        let budget = Budget {
            hard_stop: false,
            ..daily_ten()
        };
        let status = BudgetStatus::compute(&budget, 12.0, 12.0);
        assert!(matches!(
            EnforcementDecision::decide(&budget, &status),
            EnforcementDecision::Warning { .. }
        ));
    }

    #[test]
    fn monthly_block_applies_when_daily_is_fine() {
        let budget = Budget {
            monthly_limit: Some(100.0),
            ..daily_ten()
        };
        let status = BudgetStatus::compute(&budget, 1.0, 100.0);
        assert!(matches!(
            EnforcementDecision::decide(&budget, &status),
            EnforcementDecision::Blocked {
                period: BudgetPeriod::Monthly,
                ..
            }
        ));
    }

    #[test]
    fn no_limits_means_no_warning() {
        let budget = Budget::default();
        let status = BudgetStatus::compute(&budget, 1_000.0, 5_000.0);
        assert_eq!(status.daily.percentage, 0.0);
        assert!(!status.daily.warning);
        assert_eq!(EnforcementDecision::decide(&budget, &status), EnforcementDecision::Ok);
    }

    #[test]
    fn zero_limit_counts_as_unset() {
        let budget = Budget {
            daily_limit: Some(0.0),
            ..daily_ten()
        };
        let status = BudgetStatus::compute(&budget, 3.0, 3.0);
        assert_eq!(status.daily.limit, None);
        assert_eq!(EnforcementDecision::decide(&budget, &status), EnforcementDecision::Ok);
    }

    #[test]
    fn partial_update_leaves_other_fields() {
        let budget = daily_ten();
        let next = budget
            .merged(&BudgetUpdate::default().monthly_limit(Some(50.0)))
            .unwrap();
        assert_eq!(next.daily_limit, Some(10.0));
        assert_eq!(next.monthly_limit, Some(50.0));
        assert!(next.hard_stop);

        let cleared = next
            .merged(&BudgetUpdate::default().daily_limit(None))
            .unwrap();
        assert_eq!(cleared.daily_limit, None);
        assert_eq!(cleared.monthly_limit, Some(50.0));
    }

    #[test]
    fn invalid_updates_are_rejected() {
        let budget = daily_ten();
        assert!(budget
            .merged(&BudgetUpdate::default().warning_threshold(1.5))
            .is_err());
        assert!(budget
            .merged(&BudgetUpdate::default().daily_limit(Some(-1.0)))
            .is_err());
        assert!(BudgetUpdate::default().is_empty());
    }

    #[tokio::test]
    async fn monitor_persists_and_reloads() {
        let store = Arc::new(MemoryStore::new());
        let monitor = BudgetMonitor::new(store.clone(), Budget::default());
        monitor
            .set(&BudgetUpdate::default().daily_limit(Some(5.0)).hard_stop(true))
            .await
            .unwrap();

        let (reloaded, error) = BudgetMonitor::load(store, Budget::default()).await;
        assert!(error.is_none());
        let budget = reloaded.get();
        assert_eq!(budget.daily_limit, Some(5.0));
        assert!(budget.hard_stop);
    }

    #[tokio::test]
    async fn missing_document_uses_fallback() {
        let fallback = daily_ten();
        let (monitor, error) =
            BudgetMonitor::load(Arc::new(MemoryStore::new()), fallback.clone()).await;
        assert!(error.is_none());
        assert_eq!(monitor.get(), fallback);
    }

    #[tokio::test]
    async fn invalid_document_falls_back_with_error() {
        let store = Arc::new(MemoryStore::new());
        store
            .save(BUDGET_KEY, br#"{"daily_limit":5.0,"monthly_limit":null,"warning_threshold":7.0,"hard_stop":true,"auto_optimize":false}"#)
            .await
            .unwrap();
        let (monitor, error) = BudgetMonitor::load(store, Budget::default()).await;
        assert!(error.is_some());
        assert_eq!(monitor.get(), Budget::default());
    }
}
