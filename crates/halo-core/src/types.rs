// SPDX-FileCopyrightText: 2026 Halo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common value types shared by the metering crates.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::error::HaloError;

/// Identifier of a ledger record.
///
/// Identifiers are strictly increasing in append order and never reused
/// within one ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The kind of AI work that consumed tokens.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum OperationKind {
    /// A chat turn.
    Chat,
    /// A web or document search.
    Search,
    /// Analysis of a user file.
    FileAnalysis,
    /// Code generation.
    CodeGeneration,
    /// An automated task run.
    TaskAutomation,
}

impl OperationKind {
    /// Parse a caller-supplied kind, rejecting unknown names as invalid input.
    pub fn parse(value: &str) -> Result<Self, HaloError> {
        Self::from_str(value.trim()).map_err(|_| {
            HaloError::invalid(
                "operation kind",
                format!(
                    "`{value}` is not one of chat, search, file-analysis, code-generation, task-automation"
                ),
            )
        })
    }
}

/// Token counts for one completed operation.
///
/// `total` equals `input + output + cached` for every usage the meter
/// accepts. The fields are public, so the meter re-checks
/// [`TokenUsage::is_consistent`] before pricing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input: u64,
    pub output: u64,
    pub cached: u64,
    pub total: u64,
}

impl TokenUsage {
    /// Build a usage from non-negative counts.
    ///
    /// `total` saturates on overflow; such a usage is not consistent and the
    /// meter refuses it. Use [`TokenUsage::checked`] to catch that early.
    pub fn new(input: u64, output: u64, cached: u64) -> Self {
        Self {
            input,
            output,
            cached,
            total: input.saturating_add(output).saturating_add(cached),
        }
    }

    /// Build a usage, failing when the counts do not fit a `u64` total.
    pub fn checked(input: u64, output: u64, cached: u64) -> Result<Self, HaloError> {
        let total = input
            .checked_add(output)
            .and_then(|sum| sum.checked_add(cached))
            .ok_or_else(|| HaloError::invalid("tokens", "token total overflows"))?;
        Ok(Self {
            input,
            output,
            cached,
            total,
        })
    }

    /// Build a usage from signed counts as reported by upstream callers.
    ///
    /// Negative counts are rejected rather than clamped so upstream bugs
    /// surface at the boundary.
    pub fn try_new(input: i64, output: i64, cached: i64) -> Result<Self, HaloError> {
        let check = |field: &str, value: i64| {
            u64::try_from(value).map_err(|_| {
                HaloError::invalid(field, format!("token count must be non-negative, got {value}"))
            })
        };
        Self::checked(
            check("input tokens", input)?,
            check("output tokens", output)?,
            check("cached tokens", cached)?,
        )
    }

    /// Whether the usage carried any cached tokens.
    pub fn is_cached(&self) -> bool {
        self.cached > 0
    }

    /// Whether `total` is consistent with the component counts.
    pub fn is_consistent(&self) -> bool {
        self.input
            .checked_add(self.output)
            .and_then(|sum| sum.checked_add(self.cached))
            == Some(self.total)
    }

    /// Component-wise sum, used when folding many usages into one total.
    pub fn saturating_add(self, other: Self) -> Self {
        Self {
            input: self.input.saturating_add(other.input),
            output: self.output.saturating_add(other.output),
            cached: self.cached.saturating_add(other.cached),
            total: self.total.saturating_add(other.total),
        }
    }
}

/// A budget accounting period.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BudgetPeriod {
    Daily,
    Monthly,
}

/// Price class of a model, used by the optimization advisor.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ModelTier {
    /// Top-end models (the Opus family).
    Premium,
    /// General-purpose models; also the tier of unknown models.
    Balanced,
    /// Small, cheap models (the Haiku family).
    Economy,
}

impl ModelTier {
    /// Infer the tier from a model identifier by family name.
    pub fn infer(model: &str) -> Self {
        let lower = model.to_lowercase();
        if lower.contains("opus") {
            Self::Premium
        } else if lower.contains("haiku") {
            Self::Economy
        } else {
            Self::Balanced
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn checked_rejects_overflowing_totals() {
        let err = TokenUsage::checked(u64::MAX, 1, 0).unwrap_err();
        assert!(matches!(err, HaloError::InvalidInput { .. }));
        assert!(!TokenUsage::new(u64::MAX, 1, 0).is_consistent());
        assert!(TokenUsage::try_new(i64::MAX, i64::MAX, 1).is_ok());
        assert!(TokenUsage::checked(u64::MAX, 0, 0).unwrap().is_consistent());
    }

    #[test]
    fn operation_kind_uses_kebab_case_names() {
        assert_eq!(OperationKind::FileAnalysis.to_string(), "file-analysis");
        assert_eq!(
            OperationKind::parse("code-generation").unwrap(),
            OperationKind::CodeGeneration
        );
        let json = serde_json::to_string(&OperationKind::TaskAutomation).unwrap();
        assert_eq!(json, "\"task-automation\"");
    }

    #[test]
    fn every_kind_parses_from_its_display_name() {
        for kind in OperationKind::iter() {
            assert_eq!(OperationKind::parse(&kind.to_string()).unwrap(), kind);
        }
    }

    #[test]
    fn unknown_kind_is_invalid_input() {
        let err = OperationKind::parse("summarize").unwrap_err();
        assert!(matches!(err, HaloError::InvalidInput { .. }));
        assert!(err.to_string().contains("summarize"));
    }

    #[test]
    fn negative_tokens_are_rejected() {
        let err = TokenUsage::try_new(10, -1, 0).unwrap_err();
        assert!(err.to_string().contains("output tokens"));
        assert!(TokenUsage::try_new(0, 0, -5).is_err());
    }

    #[test]
    fn total_includes_cached_tokens() {
        let usage = TokenUsage::try_new(1000, 2000, 300).unwrap();
        assert_eq!(usage.total, 3300);
        assert!(usage.is_cached());
        assert!(usage.is_consistent());
        assert!(!TokenUsage::new(1, 1, 0).is_cached());
    }

    #[test]
    fn inconsistent_total_is_detected() {
        let usage = TokenUsage {
            input: 1,
            output: 2,
            cached: 3,
            total: 7,
        };
        assert!(!usage.is_consistent());
    }

    #[test]
    fn tier_is_inferred_from_family() {
        assert_eq!(ModelTier::infer("claude-3-opus-20240229"), ModelTier::Premium);
        assert_eq!(ModelTier::infer("Claude-3-5-Haiku-20241022"), ModelTier::Economy);
        assert_eq!(ModelTier::infer("claude-3-5-sonnet-20240620"), ModelTier::Balanced);
        assert_eq!(ModelTier::infer("some-new-model"), ModelTier::Balanced);
    }

    #[test]
    fn budget_period_names() {
        assert_eq!(BudgetPeriod::Daily.to_string(), "daily");
        assert_eq!("monthly".parse::<BudgetPeriod>().unwrap(), BudgetPeriod::Monthly);
    }

    proptest::proptest! {
        #[test]
        fn try_new_accepts_every_non_negative_triple(
            input in 0i64..10_000_000,
            output in 0i64..10_000_000,
            cached in 0i64..10_000_000,
        ) {
            let usage = TokenUsage::try_new(input, output, cached).unwrap();
            proptest::prop_assert!(usage.is_consistent());
            proptest::prop_assert_eq!(usage.total as i64, input + output + cached);
        }
    }
}
