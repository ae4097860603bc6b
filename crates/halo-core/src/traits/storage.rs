// SPDX-FileCopyrightText: 2026 Halo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for persistence backends.

use async_trait::async_trait;

use crate::error::HaloError;

/// Key/value persistence for whole documents.
///
/// The meter keeps two independent documents (the ledger and the budget),
/// each loaded and saved as an opaque byte blob under its own key. The
/// concrete medium (files, SQLite, memory) is up to the implementation.
#[async_trait]
pub trait StorageAdapter: Send + Sync + 'static {
    /// Returns the human-readable name of this backend, used in logs.
    fn name(&self) -> &str;

    /// Load the document stored under `key`, or `None` if nothing was saved.
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, HaloError>;

    /// Replace the document stored under `key`.
    async fn save(&self, key: &str, bytes: &[u8]) -> Result<(), HaloError>;
}
