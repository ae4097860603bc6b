// SPDX-FileCopyrightText: 2026 Halo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Halo usage meter.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::path::PathBuf;

use halo_core::ModelTier;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Top-level Halo configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HaloConfig {
    /// Process-level settings.
    #[serde(default)]
    pub meter: MeterConfig,

    /// Where the ledger and budget documents live.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Budget used until one has been saved.
    #[serde(default)]
    pub budget: BudgetConfig,

    /// Pricing table overrides.
    #[serde(default)]
    pub pricing: PricingConfig,

    /// Calendar bucketing policy.
    #[serde(default)]
    pub calendar: CalendarConfig,
}

/// Process-level settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MeterConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Persistence backend selection.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Deserialize, Serialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StorageBackend {
    /// One JSON file per document under `data_dir`.
    #[default]
    File,
    /// A key/value table in the SQLite database at `database_path`.
    Sqlite,
    /// Nothing is written; state is lost at exit.
    Memory,
}

/// Storage backend settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Which backend holds the documents.
    #[serde(default)]
    pub backend: StorageBackend,

    /// Directory used by the file backend.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Database file used by the SQLite backend.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            data_dir: default_data_dir(),
            database_path: default_database_path(),
        }
    }
}

fn data_home() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("halo"))
        .unwrap_or_else(|| PathBuf::from(".halo"))
}

fn default_data_dir() -> String {
    data_home().display().to_string()
}

fn default_database_path() -> String {
    data_home().join("halo.db").display().to_string()
}

/// Budget applied when no budget document has been persisted yet.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BudgetConfig {
    /// Daily spending limit in USD. `None` means no limit.
    #[serde(default = "default_daily_limit")]
    pub daily_limit_usd: Option<f64>,

    /// Monthly spending limit in USD. `None` means no limit.
    #[serde(default = "default_monthly_limit")]
    pub monthly_limit_usd: Option<f64>,

    /// Fraction of a limit at which a warning is raised.
    #[serde(default = "default_warning_threshold")]
    pub warning_threshold: f64,

    /// Advise callers to stop spending once a limit is reached.
    #[serde(default = "default_true")]
    pub hard_stop: bool,

    /// Informational flag surfaced to callers; the meter never acts on it.
    #[serde(default = "default_true")]
    pub auto_optimize: bool,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            daily_limit_usd: default_daily_limit(),
            monthly_limit_usd: default_monthly_limit(),
            warning_threshold: default_warning_threshold(),
            hard_stop: true,
            auto_optimize: true,
        }
    }
}

fn default_daily_limit() -> Option<f64> {
    Some(10.0)
}

fn default_monthly_limit() -> Option<f64> {
    Some(200.0)
}

fn default_warning_threshold() -> f64 {
    0.8
}

fn default_true() -> bool {
    true
}

/// Pricing table settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PricingConfig {
    /// Model whose rates are charged for unknown model identifiers.
    #[serde(default = "default_pricing_model")]
    pub default_model: String,

    /// Extra or replacement entries layered over the built-in table.
    #[serde(default)]
    pub models: Vec<ModelRateConfig>,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            default_model: default_pricing_model(),
            models: Vec::new(),
        }
    }
}

fn default_pricing_model() -> String {
    "claude-3-sonnet-20240229".to_string()
}

/// One pricing entry, in USD per million tokens.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ModelRateConfig {
    /// Exact model identifier.
    pub model: String,
    /// Cost per million input tokens.
    pub input_per_mtok: f64,
    /// Cost per million output tokens.
    pub output_per_mtok: f64,
    /// Cost per million cached tokens.
    #[serde(default)]
    pub cached_per_mtok: f64,
    /// Price class; inferred from the model name when omitted.
    #[serde(default)]
    pub tier: Option<ModelTier>,
}

/// Time zone used for day, hour and month boundaries.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Deserialize, Serialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TimeZonePolicy {
    /// The system's local time zone.
    #[default]
    Local,
    /// Coordinated Universal Time.
    Utc,
}

/// Calendar bucketing settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CalendarConfig {
    /// Time zone for all day/hour/month bucketing.
    #[serde(default)]
    pub time_zone: TimeZonePolicy,
}
