// SPDX-FileCopyrightText: 2026 Halo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter with injectable failures.
//!
//! `FlakyStore` wraps a [`MemoryStore`] and fails reads or writes on demand,
//! so tests can drive the meter's persistence-failure paths deterministically.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use halo_core::{HaloError, StorageAdapter};
use halo_storage::MemoryStore;

/// A memory-backed store whose loads and saves can be made to fail.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    fail_saves: AtomicBool,
    fail_loads: AtomicBool,
    fail_next: AtomicUsize,
    saves: AtomicUsize,
    failed_saves: AtomicUsize,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following save fail (or succeed again).
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Make only the next `count` saves fail.
    pub fn fail_next_saves(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    /// Make every following load fail (or succeed again).
    pub fn fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    /// Successful saves so far.
    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Rejected saves so far.
    pub fn failed_saves(&self) -> usize {
        self.failed_saves.load(Ordering::SeqCst)
    }

    /// Read a document straight from the backing map, bypassing injected failures.
    pub async fn peek(&self, key: &str) -> Option<Vec<u8>> {
        self.inner.load(key).await.ok().flatten()
    }

    /// Seed a document, bypassing injected failures.
    pub async fn seed(&self, key: &str, bytes: &[u8]) {
        let _ = self.inner.save(key, bytes).await;
    }
}

#[async_trait]
impl StorageAdapter for FlakyStore {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, HaloError> {
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(HaloError::storage(key, "injected read failure"));
        }
        self.inner.load(key).await
    }

    async fn save(&self, key: &str, bytes: &[u8]) -> Result<(), HaloError> {
        let fail_once = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail_once || self.fail_saves.load(Ordering::SeqCst) {
            self.failed_saves.fetch_add(1, Ordering::SeqCst);
            return Err(HaloError::storage(key, "injected write failure (quota exceeded)"));
        }
        self.inner.save(key, bytes).await?;
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
