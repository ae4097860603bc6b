// SPDX-FileCopyrightText: 2026 Halo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-side aggregation over a ledger snapshot.
//!
//! Nothing here is stored. Every summary is recomputed from the records on
//! each call, which keeps the aggregates trivially consistent with the ledger.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Days, Duration, NaiveDate, Utc};
use halo_core::{OperationKind, TokenUsage};
use serde::{Deserialize, Serialize};

use crate::clock::Calendar;
use crate::ledger::OperationRecord;

/// Multiplier applied to the cost of cached calls to estimate what caching
/// saved: a cached call is assumed to cost a tenth of the uncached one.
const CACHE_SAVINGS_FACTOR: f64 = 9.0;

/// Share of the window's total that better model and prompt choices could
/// plausibly save.
const POTENTIAL_SAVINGS_RATIO: f64 = 0.3;

/// Totals for one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyCostSummary {
    pub date: NaiveDate,
    pub total_cost: f64,
    pub operation_count: usize,
    pub tokens: TokenUsage,
    pub by_operation: BTreeMap<OperationKind, f64>,
    pub by_model: BTreeMap<String, f64>,
    /// Cost per hour of day, index 0 through 23.
    pub by_hour: [f64; 24],
}

impl DailyCostSummary {
    fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            total_cost: 0.0,
            operation_count: 0,
            tokens: TokenUsage::default(),
            by_operation: BTreeMap::new(),
            by_model: BTreeMap::new(),
            by_hour: [0.0; 24],
        }
    }
}

/// One ranked category of a breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryCost {
    pub category: String,
    pub cost: f64,
    /// Share of the window total, 0 to 100.
    pub percentage: f64,
}

/// Heuristic savings estimates. Not accounting facts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SavingsEstimate {
    /// Roughly what cached calls would have cost without the cache, minus what they did cost.
    pub from_caching: f64,
    /// Roughly what optimization could still save.
    pub potential: f64,
}

/// Cost over a window split by operation kind and by model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub window_start: DateTime<Utc>,
    pub total: f64,
    /// Descending by cost.
    pub by_operation: Vec<CategoryCost>,
    /// Descending by cost.
    pub by_model: Vec<CategoryCost>,
    pub savings: SavingsEstimate,
}

/// One day of a trend series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageTrendPoint {
    pub date: NaiveDate,
    pub cost: f64,
    pub operations: usize,
}

/// Pure queries over one consistent slice of records, evaluated at `now`.
pub struct Aggregator<'a> {
    records: &'a [OperationRecord],
    calendar: Calendar,
    now: DateTime<Utc>,
}

impl<'a> Aggregator<'a> {
    pub fn new(records: &'a [OperationRecord], calendar: Calendar, now: DateTime<Utc>) -> Self {
        Self {
            records,
            calendar,
            now,
        }
    }

    /// Today's calendar date.
    pub fn today(&self) -> NaiveDate {
        self.calendar.date_of(self.now)
    }

    /// Summary of today's records.
    pub fn today_summary(&self) -> DailyCostSummary {
        self.daily_summary(self.today())
    }

    /// Summary of the records whose calendar date is `date`.
    pub fn daily_summary(&self, date: NaiveDate) -> DailyCostSummary {
        let mut summary = DailyCostSummary::empty(date);
        for record in self
            .records
            .iter()
            .filter(|r| self.calendar.date_of(r.timestamp) == date)
        {
            summary.total_cost += record.cost;
            summary.operation_count += 1;
            summary.tokens = summary.tokens.saturating_add(record.tokens);
            *summary.by_operation.entry(record.operation).or_default() += record.cost;
            *summary.by_model.entry(record.model.clone()).or_default() += record.cost;
            let hour = self.calendar.hour_of(record.timestamp) as usize;
            if let Some(bucket) = summary.by_hour.get_mut(hour) {
                *bucket += record.cost;
            }
        }
        summary
    }

    /// Cost since the first instant of the current calendar month.
    pub fn month_to_date_cost(&self) -> f64 {
        let start = self.calendar.start_of_month(self.now);
        self.records
            .iter()
            .filter(|r| r.timestamp >= start)
            .map(|r| r.cost)
            .sum()
    }

    /// Breakdown of records at or after `window_start`.
    pub fn breakdown(&self, window_start: DateTime<Utc>) -> CostBreakdown {
        let mut total = 0.0;
        let mut from_caching = 0.0;
        let mut by_operation: HashMap<String, f64> = HashMap::new();
        let mut by_model: HashMap<String, f64> = HashMap::new();

        for record in self.records.iter().filter(|r| r.timestamp >= window_start) {
            total += record.cost;
            *by_operation.entry(record.operation.to_string()).or_default() += record.cost;
            *by_model.entry(record.model.clone()).or_default() += record.cost;
            if record.cached {
                from_caching += record.cost * CACHE_SAVINGS_FACTOR;
            }
        }

        CostBreakdown {
            window_start,
            total,
            by_operation: rank(by_operation, total),
            by_model: rank(by_model, total),
            savings: SavingsEstimate {
                from_caching,
                potential: total * POTENTIAL_SAVINGS_RATIO,
            },
        }
    }

    /// Daily cost for the last `days` calendar days ending today, oldest first.
    ///
    /// Returns exactly `days` points, idle days at zero. The series only comes
    /// up short when it would reach before the earliest representable date.
    pub fn trend(&self, days: u32) -> Vec<UsageTrendPoint> {
        let mut per_day: HashMap<NaiveDate, (f64, usize)> = HashMap::new();
        for record in self.records {
            let entry = per_day
                .entry(self.calendar.date_of(record.timestamp))
                .or_default();
            entry.0 += record.cost;
            entry.1 += 1;
        }

        let today = self.today();
        (0..days)
            .rev()
            .filter_map(|back| {
                let date = today.checked_sub_days(Days::new(u64::from(back)))?;
                let (cost, operations) = per_day.get(&date).copied().unwrap_or_default();
                Some(UsageTrendPoint {
                    date,
                    cost,
                    operations,
                })
            })
            .collect()
    }

    /// Cost of records newer than `now - window`.
    ///
    /// A window reaching past the earliest representable instant covers
    /// every record.
    pub fn session_cost(&self, window: Duration) -> f64 {
        let since = self.now.checked_sub_signed(window);
        self.records
            .iter()
            .filter(|r| since.is_none_or(|since| r.timestamp > since))
            .map(|r| r.cost)
            .sum()
    }
}

fn rank(costs: HashMap<String, f64>, total: f64) -> Vec<CategoryCost> {
    let mut ranked: Vec<CategoryCost> = costs
        .into_iter()
        .map(|(category, cost)| CategoryCost {
            percentage: if total > 0.0 { cost / total * 100.0 } else { 0.0 },
            category,
            cost,
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.cost
            .total_cmp(&a.cost)
            .then_with(|| a.category.cmp(&b.category))
    });
    ranked
}
