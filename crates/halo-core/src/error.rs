// SPDX-FileCopyrightText: 2026 Halo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Halo usage meter.

use thiserror::Error;

use crate::types::{BudgetPeriod, RecordId};

/// The primary error type used across the metering crates.
///
/// None of these failures is fatal: after any single failed call the meter
/// stays queryable on whatever state it last held.
#[derive(Debug, Error)]
pub enum HaloError {
    /// Configuration errors (invalid TOML, bad values discovered at runtime).
    #[error("configuration error: {0}")]
    Config(String),

    /// Caller-supplied data was rejected before any state changed.
    #[error("invalid {field}: {message}")]
    InvalidInput { field: String, message: String },

    /// A storage backend failed to read or write a document.
    #[error("storage error for `{key}`: {source}")]
    Storage {
        key: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A mutation was applied in memory but its durable write failed.
    ///
    /// The in-memory state keeps the change; the write is retried on the next
    /// mutating call or an explicit flush.
    #[error("{what} kept in memory but not persisted: {source}")]
    NotPersisted {
        what: String,
        record_id: Option<RecordId>,
        source: Box<HaloError>,
    },

    /// An import document was not valid JSON or not a compatible export.
    #[error("malformed import: {message}")]
    MalformedImport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Advisory: a hard-stop budget limit has been reached for a period.
    #[error("{period} budget exhausted: {message}")]
    BudgetExhausted {
        period: BudgetPeriod,
        message: String,
    },

    /// Rendering an export failed.
    #[error("export error: {message}")]
    Export { message: String },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl HaloError {
    /// Shorthand for an [`HaloError::InvalidInput`].
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Wrap any error as a storage failure for `key`.
    pub fn storage(
        key: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Storage {
            key: key.into(),
            source: source.into(),
        }
    }

    /// Returns true for failures where the in-memory change survived.
    pub fn is_not_persisted(&self) -> bool {
        matches!(self, Self::NotPersisted { .. })
    }
}
