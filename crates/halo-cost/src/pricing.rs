// SPDX-FileCopyrightText: 2026 Halo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Model pricing tables and cost calculation.
//!
//! Rates are USD per million tokens, as published by Anthropic for the
//! Claude 3 / 3.5 / 4 model families:
//!
//! Claude Opus:       input=$15.00/MTok, output=$75.00/MTok, cached=$1.50/MTok
//! Claude Sonnet:     input=$3.00/MTok,  output=$15.00/MTok, cached=$0.30/MTok
//! Claude 3/3.5 Haiku: input=$0.25/MTok, output=$1.25/MTok,  cached=$0.025/MTok
//!
//! Historical records keep the cost computed when they were recorded; a
//! pricing change never re-prices the ledger.

use std::collections::HashMap;

use halo_config::model::PricingConfig;
use halo_core::{HaloError, ModelTier, TokenUsage};
use serde::Serialize;

/// Per-model pricing in USD per million tokens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModelRate {
    /// Cost per million input tokens.
    pub input_per_mtok: f64,
    /// Cost per million output tokens.
    pub output_per_mtok: f64,
    /// Cost per million cached tokens.
    pub cached_per_mtok: f64,
    /// Price class of the model.
    pub tier: ModelTier,
}

impl ModelRate {
    const fn new(input: f64, output: f64, cached: f64, tier: ModelTier) -> Self {
        Self {
            input_per_mtok: input,
            output_per_mtok: output,
            cached_per_mtok: cached,
            tier,
        }
    }
}

const OPUS: ModelRate = ModelRate::new(15.0, 75.0, 1.5, ModelTier::Premium);
const SONNET: ModelRate = ModelRate::new(3.0, 15.0, 0.30, ModelTier::Balanced);
const HAIKU: ModelRate = ModelRate::new(0.25, 1.25, 0.025, ModelTier::Economy);

/// Model identifier whose rates price unknown models unless configured otherwise.
pub const DEFAULT_PRICING_MODEL: &str = "claude-3-sonnet-20240229";

const BUILTIN_RATES: &[(&str, ModelRate)] = &[
    ("claude-3-opus-20240229", OPUS),
    ("claude-3-sonnet-20240229", SONNET),
    ("claude-3-haiku-20240229", HAIKU),
    ("claude-3-haiku-20240307", HAIKU),
    ("claude-3-5-sonnet-20240620", SONNET),
    ("claude-3-5-sonnet-20241022", SONNET),
    ("claude-3-5-haiku-20241022", HAIKU),
    ("claude-sonnet-4-20250514", SONNET),
    ("claude-opus-4-20250514", OPUS),
];

/// Calculate cost in USD for a given token usage and rate.
///
/// Formula: sum of (tokens / 1_000_000) * price_per_million for each token type.
pub fn calculate_cost(usage: &TokenUsage, rate: &ModelRate) -> f64 {
    let input = (usage.input as f64 / 1_000_000.0) * rate.input_per_mtok;
    let output = (usage.output as f64 / 1_000_000.0) * rate.output_per_mtok;
    let cached = (usage.cached as f64 / 1_000_000.0) * rate.cached_per_mtok;
    input + output + cached
}

/// Rough token estimate for a piece of text: one token per four characters.
pub fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() as u64).div_ceil(4)
}

/// Lookup table from exact model identifier to rate.
///
/// Unknown models are charged at the default model's rate so that cost
/// recording never fails on a new model name.
#[derive(Debug, Clone)]
pub struct PricingTable {
    rates: HashMap<String, ModelRate>,
    default_model: String,
}

impl Default for PricingTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PricingTable {
    /// The built-in table with Sonnet as the fallback tier.
    pub fn builtin() -> Self {
        Self {
            rates: BUILTIN_RATES
                .iter()
                .map(|(model, rate)| (model.to_string(), *rate))
                .collect(),
            default_model: DEFAULT_PRICING_MODEL.to_string(),
        }
    }

    /// The built-in table with configured entries layered on top.
    pub fn from_config(config: &PricingConfig) -> Result<Self, HaloError> {
        let mut table = Self::builtin();
        for entry in &config.models {
            let rate = ModelRate {
                input_per_mtok: entry.input_per_mtok,
                output_per_mtok: entry.output_per_mtok,
                cached_per_mtok: entry.cached_per_mtok,
                tier: entry.tier.unwrap_or_else(|| ModelTier::infer(&entry.model)),
            };
            table.insert(&entry.model, rate)?;
        }
        table.set_default_model(&config.default_model)?;
        Ok(table)
    }

    /// Add or replace the rate for `model`.
    pub fn insert(&mut self, model: &str, rate: ModelRate) -> Result<(), HaloError> {
        let rates = [rate.input_per_mtok, rate.output_per_mtok, rate.cached_per_mtok];
        if model.trim().is_empty() {
            return Err(HaloError::invalid("model", "pricing entry needs a model name"));
        }
        if rates.iter().any(|r| !(r.is_finite() && *r >= 0.0)) {
            return Err(HaloError::invalid(
                "rate",
                format!("rates for `{model}` must be finite and non-negative"),
            ));
        }
        self.rates.insert(model.to_string(), rate);
        Ok(())
    }

    /// Choose which known model prices unknown ones.
    pub fn set_default_model(&mut self, model: &str) -> Result<(), HaloError> {
        if !self.rates.contains_key(model) {
            return Err(HaloError::Config(format!(
                "pricing.default_model `{model}` has no pricing entry"
            )));
        }
        self.default_model = model.to_string();
        Ok(())
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    pub fn is_known(&self, model: &str) -> bool {
        self.rates.contains_key(model)
    }

    /// Rate for `model`, falling back to the default model's rate.
    pub fn rate_for(&self, model: &str) -> ModelRate {
        self.rates
            .get(model)
            .or_else(|| self.rates.get(&self.default_model))
            .copied()
            .unwrap_or(SONNET)
    }

    /// Price class of `model`; unknown models are classed by family name.
    pub fn tier_of(&self, model: &str) -> ModelTier {
        self.rates
            .get(model)
            .map(|rate| rate.tier)
            .unwrap_or_else(|| ModelTier::infer(model))
    }

    /// Cost of `tokens` on `model`. Deterministic and never negative.
    pub fn calculate(&self, model: &str, tokens: &TokenUsage) -> f64 {
        calculate_cost(tokens, &self.rate_for(model))
    }

    /// Known models in name order.
    pub fn models(&self) -> Vec<(&str, ModelRate)> {
        let mut models: Vec<_> = self
            .rates
            .iter()
            .map(|(name, rate)| (name.as_str(), *rate))
            .collect();
        models.sort_by(|a, b| a.0.cmp(b.0));
        models
    }
}
