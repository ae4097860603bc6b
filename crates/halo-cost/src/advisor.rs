// SPDX-FileCopyrightText: 2026 Halo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Heuristic cost optimization suggestions.
//!
//! Suggestions are advice only; nothing here changes how operations run,
//! whatever the budget's `auto_optimize` flag says.

use serde::Serialize;
use strum::Display;

use halo_core::ModelTier;

use crate::aggregate::CostBreakdown;
use crate::ledger::OperationRecord;
use crate::pricing::PricingTable;

/// How many of the most recent records the batching rule looks at.
pub const BATCHING_SAMPLE: usize = 100;

/// Mean gap between calls, in seconds, below which batching is suggested.
const BATCHING_INTERVAL_SECS: f64 = 60.0;

/// Share of spend above which a premium model is worth flagging.
const PREMIUM_SHARE_PERCENT: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SuggestionKind {
    Model,
    Caching,
    Batching,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub kind: SuggestionKind,
    pub description: String,
    pub estimated_savings: f64,
}

/// Run every rule over `breakdown` and the most recent records.
///
/// Rules fire independently and are emitted in the order model mix,
/// caching, batching. Nothing fires when the window cost nothing.
pub fn suggest(
    breakdown: &CostBreakdown,
    records: &[OperationRecord],
    pricing: &PricingTable,
) -> Vec<Suggestion> {
    let total = breakdown.total;
    if total <= 0.0 {
        return Vec::new();
    }

    let mut suggestions = Vec::new();

    if let Some(top) = breakdown.by_model.first()
        && pricing.tier_of(&top.category) == ModelTier::Premium
        && top.percentage > PREMIUM_SHARE_PERCENT
    {
        suggestions.push(Suggestion {
            kind: SuggestionKind::Model,
            description: format!(
                "{} accounts for {:.0}% of spend; route routine work to a balanced model",
                top.category, top.percentage
            ),
            estimated_savings: top.cost * 0.6,
        });
    }

    if breakdown.savings.from_caching < total * 0.1 {
        suggestions.push(Suggestion {
            kind: SuggestionKind::Caching,
            description: "Few calls reuse cached prompts; cache stable system prompts and context"
                .to_string(),
            estimated_savings: total * 0.2,
        });
    }

    if let Some(interval) = mean_interval_secs(records)
        && interval < BATCHING_INTERVAL_SECS
    {
        suggestions.push(Suggestion {
            kind: SuggestionKind::Batching,
            description: format!(
                "Calls arrive every {interval:.0}s on average; batch related requests"
            ),
            estimated_savings: total * 0.15,
        });
    }

    suggestions
}

/// Mean gap between consecutive records among the last [`BATCHING_SAMPLE`].
///
/// Gaps are signed, so a record appended slightly out of timestamp order
/// cancels against its neighbour instead of inflating the mean.
fn mean_interval_secs(records: &[OperationRecord]) -> Option<f64> {
    let recent = &records[records.len().saturating_sub(BATCHING_SAMPLE)..];
    if recent.len() < 2 {
        return None;
    }
    let gaps: f64 = recent
        .windows(2)
        .map(|pair| (pair[1].timestamp - pair[0].timestamp).num_milliseconds() as f64)
        .sum();
    Some(gaps / 1000.0 / (recent.len() - 1) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Aggregator;
    use crate::clock::Calendar;
    use chrono::{DateTime, Duration, Utc};
    use halo_core::{OperationKind, RecordId, TokenUsage};

    fn start() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-10T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn records(model: &str, count: usize, gap: Duration, cached: bool) -> Vec<OperationRecord> {
        (0..count)
            .map(|i| OperationRecord {
                id: RecordId(i as u64 + 1),
                timestamp: start() + gap * i as i32,
                operation: OperationKind::Chat,
                model: model.to_string(),
                tokens: TokenUsage::new(1000, 1000, if cached { 500 } else { 0 }),
                cost: 1.0,
                success: true,
                cached,
            })
            .collect()
    }

    fn run(records: &[OperationRecord]) -> Vec<Suggestion> {
        let now = start() + Duration::days(1);
        let agg = Aggregator::new(records, Calendar::utc(), now);
        let breakdown = agg.breakdown(start() - Duration::days(1));
        suggest(&breakdown, records, &PricingTable::builtin())
    }

    #[test]
    fn out_of_order_appends_do_not_inflate_the_interval() {
        let mut recs = records("claude-3-5-sonnet-20240620", 4, Duration::seconds(100), false);
        recs[2].timestamp = start();
        recs[3].timestamp = start() + Duration::seconds(100);
        let interval = mean_interval_secs(&recs).unwrap();
        assert!((interval - 100.0 / 3.0).abs() < 1e-9);
        assert!(run(&recs).iter().any(|s| s.kind == SuggestionKind::Batching));
    }

    #[test]
    fn empty_ledger_yields_nothing() {
        assert!(run(&[]).is_empty());
    }

    #[test]
    fn rapid_premium_uncached_traffic_fires_all_rules_in_order() {
        let records = records("claude-3-opus-20240229", 10, Duration::seconds(5), false);
        let suggestions = run(&records);
        let kinds: Vec<SuggestionKind> = suggestions.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                SuggestionKind::Model,
                SuggestionKind::Caching,
                SuggestionKind::Batching
            ]
        );
        assert!((suggestions[0].estimated_savings - 6.0).abs() < 1e-9);
        assert!((suggestions[1].estimated_savings - 2.0).abs() < 1e-9);
        assert!((suggestions[2].estimated_savings - 1.5).abs() < 1e-9);
    }

    #[test]
    fn sparse_cached_balanced_traffic_fires_nothing() {
        let records = records("claude-3-5-sonnet-20240620", 5, Duration::minutes(10), true);
        assert!(run(&records).is_empty());
    }

    #[test]
    fn single_record_cannot_trigger_batching() {
        let records = records("claude-3-5-sonnet-20240620", 1, Duration::seconds(1), true);
        assert!(run(&records).is_empty());
    }

    #[test]
    fn batching_only_considers_the_latest_sample() {
        let mut old = records("claude-3-5-sonnet-20240620", 50, Duration::seconds(1), true);
        let late_start = start() + Duration::hours(2);
        for (i, record) in records("claude-3-5-sonnet-20240620", BATCHING_SAMPLE, Duration::minutes(5), true)
            .into_iter()
            .enumerate()
        {
            old.push(OperationRecord {
                id: RecordId(1_000 + i as u64),
                timestamp: late_start + Duration::minutes(5) * i as i32,
                ..record
            });
        }
        let interval = mean_interval_secs(&old).unwrap();
        assert!((interval - 300.0).abs() < 1e-9);
    }
}
