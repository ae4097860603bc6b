// SPDX-FileCopyrightText: 2026 Halo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./halo.toml` > `~/.config/halo/halo.toml` > `/etc/halo/halo.toml`
//! with environment variable overrides via `HALO_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::HaloConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/halo/halo.toml` (system-wide)
/// 3. `~/.config/halo/halo.toml` (user XDG config)
/// 4. `./halo.toml` (local directory)
/// 5. `HALO_*` environment variables
pub fn load_config() -> Result<HaloConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<HaloConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(HaloConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<HaloConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(HaloConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading.
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(HaloConfig::default()))
        .merge(Toml::file("/etc/halo/halo.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("halo/halo.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("halo.toml"))
        .merge(env_provider())
}

/// Create the environment variable provider using explicit `map()` for section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores: `HALO_BUDGET_DAILY_LIMIT_USD` must map to
/// `budget.daily_limit_usd`, not `budget.daily.limit.usd`.
fn env_provider() -> Env {
    Env::prefixed("HALO_").map(|key| {
        // `key` is the lowercased env var name with prefix stripped.
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("meter_", "meter.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("budget_", "budget.", 1)
            .replacen("pricing_", "pricing.", 1)
            .replacen("calendar_", "calendar.", 1);
        mapped.into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{StorageBackend, TimeZonePolicy};

    #[test]
    fn env_overrides_map_to_sections() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("HALO_BUDGET_DAILY_LIMIT_USD", "25.5");
            jail.set_env("HALO_STORAGE_BACKEND", "sqlite");
            jail.set_env("HALO_CALENDAR_TIME_ZONE", "utc");
            let config: HaloConfig = Figment::new()
                .merge(Serialized::defaults(HaloConfig::default()))
                .merge(env_provider())
                .extract()?;
            assert_eq!(config.budget.daily_limit_usd, Some(25.5));
            assert_eq!(config.storage.backend, StorageBackend::Sqlite);
            assert_eq!(config.calendar.time_zone, TimeZonePolicy::Utc);
            Ok(())
        });
    }

    #[test]
    fn file_values_override_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "custom.toml",
                r#"
[budget]
monthly_limit_usd = 50.0
hard_stop = false
"#,
            )?;
            let config = load_config_from_path(Path::new("custom.toml"))?;
            assert_eq!(config.budget.monthly_limit_usd, Some(50.0));
            assert!(!config.budget.hard_stop);
            assert_eq!(config.budget.daily_limit_usd, Some(10.0));
            Ok(())
        });
    }
}
