// SPDX-FileCopyrightText: 2026 Halo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Halo usage meter.
//!
//! This crate provides the error type, the value types exchanged between
//! operation callers and the meter, and the storage contract every
//! persistence backend implements.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::HaloError;
pub use traits::StorageAdapter;
pub use types::{BudgetPeriod, ModelTier, OperationKind, RecordId, TokenUsage};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn halo_error_messages_name_the_failure() {
        let invalid = HaloError::invalid("model", "must not be empty");
        assert_eq!(invalid.to_string(), "invalid model: must not be empty");

        let storage = HaloError::storage("halo-budget-settings", std::io::Error::other("disk full"));
        assert!(storage.to_string().contains("halo-budget-settings"));
        assert!(storage.to_string().contains("disk full"));

        let not_persisted = HaloError::NotPersisted {
            what: "record 7".into(),
            record_id: Some(RecordId(7)),
            source: Box::new(storage),
        };
        assert!(not_persisted.is_not_persisted());
        assert!(not_persisted.to_string().starts_with("record 7 kept in memory"));

        let exhausted = HaloError::BudgetExhausted {
            period: BudgetPeriod::Daily,
            message: "limit reached".into(),
        };
        assert_eq!(exhausted.to_string(), "daily budget exhausted: limit reached");
    }

    #[test]
    fn storage_adapter_is_object_safe() {
        fn _assert_object_safe(_: &dyn StorageAdapter) {}
    }
}
