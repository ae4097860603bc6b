// SPDX-FileCopyrightText: 2026 Halo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Terminal output: JSON for scripts, aligned text with optional colors for people.

use std::io::IsTerminal;

use colored::Colorize;
use halo_core::HaloError;
use serde::Serialize;

/// How command results are printed.
pub struct Output {
    json: bool,
    color: bool,
}

/// Severity of a status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Ok,
    Warn,
    Fail,
}

impl Output {
    /// Colors are used only when not disabled and stdout is a terminal.
    pub fn new(json: bool, plain: bool) -> Self {
        Self {
            json,
            color: !plain && std::io::stdout().is_terminal(),
        }
    }

    pub fn is_json(&self) -> bool {
        self.json
    }

    /// Print `value` as pretty JSON.
    pub fn print_json<T: Serialize>(&self, value: &T) -> Result<(), HaloError> {
        let text = serde_json::to_string_pretty(value)
            .map_err(|e| HaloError::Internal(format!("failed to encode output: {e}")))?;
        println!("{text}");
        Ok(())
    }

    pub fn heading(&self, title: &str) {
        println!();
        if self.color {
            println!("  {}", title.bold());
        } else {
            println!("  {title}");
        }
        println!("  {}", "-".repeat(40));
    }

    /// `label: value`, aligned.
    pub fn field(&self, label: &str, value: impl std::fmt::Display) {
        println!("    {:<14}{value}", format!("{label}:"));
    }

    /// A marker for `level`, colored or bracketed.
    pub fn marker(&self, level: Level) -> String {
        match (level, self.color) {
            (Level::Ok, true) => "✓".green().to_string(),
            (Level::Warn, true) => "!".yellow().to_string(),
            (Level::Fail, true) => "✗".red().to_string(),
            (Level::Ok, false) => "[OK]".to_string(),
            (Level::Warn, false) => "[WARN]".to_string(),
            (Level::Fail, false) => "[FAIL]".to_string(),
        }
    }

    pub fn blank(&self) {
        println!();
    }
}

/// Dollar amount with four decimals below a cent, two otherwise.
pub fn usd(amount: f64) -> String {
    if amount != 0.0 && amount.abs() < 0.01 {
        format!("${amount:.4}")
    } else {
        format!("${amount:.2}")
    }
}

/// Fixed-width bar of `width` cells filled to `percent`.
pub fn bar(percent: f64, width: usize) -> String {
    let clamped = percent.clamp(0.0, 100.0);
    let filled = ((clamped / 100.0) * width as f64).round() as usize;
    format!("{}{}", "#".repeat(filled), ".".repeat(width - filled.min(width)))
}
