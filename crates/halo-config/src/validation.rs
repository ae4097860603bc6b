// SPDX-FileCopyrightText: 2026 Halo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as non-negative limits, threshold ranges and non-empty paths.

use std::collections::HashSet;

use crate::diagnostic::ConfigError;
use crate::model::{HaloConfig, StorageBackend};

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &HaloConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    for (name, limit) in [
        ("budget.daily_limit_usd", config.budget.daily_limit_usd),
        ("budget.monthly_limit_usd", config.budget.monthly_limit_usd),
    ] {
        if let Some(value) = limit
            && !(value.is_finite() && value >= 0.0)
        {
            fail(format!("{name} must be a non-negative amount, got {value}"));
        }
    }

    let threshold = config.budget.warning_threshold;
    if !(0.0..=1.0).contains(&threshold) {
        fail(format!(
            "budget.warning_threshold must be between 0 and 1, got {threshold}"
        ));
    }

    match config.storage.backend {
        StorageBackend::File if config.storage.data_dir.trim().is_empty() => {
            fail("storage.data_dir must not be empty".to_string());
        }
        StorageBackend::Sqlite if config.storage.database_path.trim().is_empty() => {
            fail("storage.database_path must not be empty".to_string());
        }
        _ => {}
    }

    let mut seen = HashSet::new();
    for (i, entry) in config.pricing.models.iter().enumerate() {
        if entry.model.trim().is_empty() {
            fail(format!("pricing.models[{i}].model must not be empty"));
            continue;
        }
        if !seen.insert(entry.model.as_str()) {
            fail(format!(
                "duplicate pricing entry for model `{}`",
                entry.model
            ));
        }
        for (field, rate) in [
            ("input_per_mtok", entry.input_per_mtok),
            ("output_per_mtok", entry.output_per_mtok),
            ("cached_per_mtok", entry.cached_per_mtok),
        ] {
            if !(rate.is_finite() && rate >= 0.0) {
                fail(format!(
                    "pricing.models[{i}].{field} must be non-negative, got {rate}"
                ));
            }
        }
    }

    if config.pricing.default_model.trim().is_empty() {
        fail("pricing.default_model must not be empty".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelRateConfig;

    fn rate(model: &str, input: f64) -> ModelRateConfig {
        ModelRateConfig {
            model: model.to_string(),
            input_per_mtok: input,
            output_per_mtok: 1.0,
            cached_per_mtok: 0.1,
            tier: None,
        }
    }

    fn has_message(errors: &[ConfigError], needle: &str) -> bool {
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains(needle)))
    }

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&HaloConfig::default()).is_ok());
    }

    #[test]
    fn negative_limit_fails_validation() {
        let mut config = HaloConfig::default();
        config.budget.daily_limit_usd = Some(-5.0);
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "daily_limit_usd"));
    }

    #[test]
    fn threshold_outside_unit_range_fails() {
        let mut config = HaloConfig::default();
        config.budget.warning_threshold = 1.5;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "warning_threshold"));
    }

    #[test]
    fn empty_path_only_matters_for_selected_backend() {
        let mut config = HaloConfig::default();
        config.storage.database_path = String::new();
        assert!(validate_config(&config).is_ok());

        config.storage.backend = StorageBackend::Sqlite;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "database_path"));
    }

    #[test]
    fn pricing_entries_are_checked() {
        let mut config = HaloConfig::default();
        config.pricing.models = vec![rate("custom", -1.0), rate("custom", 1.0), rate(" ", 1.0)];
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "input_per_mtok"));
        assert!(has_message(&errors, "duplicate pricing entry"));
        assert!(has_message(&errors, "models[2].model"));
    }

    #[test]
    fn collects_every_error() {
        let mut config = HaloConfig::default();
        config.budget.daily_limit_usd = Some(-1.0);
        config.budget.monthly_limit_usd = Some(f64::NAN);
        config.budget.warning_threshold = -0.1;
        assert_eq!(validate_config(&config).unwrap_err().len(), 3);
    }
}
