// SPDX-FileCopyrightText: 2026 Halo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Volatile document store for tests and `backend = "memory"`.

use std::collections::HashMap;

use async_trait::async_trait;
use halo_core::{HaloError, StorageAdapter};
use tokio::sync::Mutex;

/// Document store that keeps everything in a process-local map.
#[derive(Default)]
pub struct MemoryStore {
    documents: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents currently held.
    pub async fn len(&self) -> usize {
        self.documents.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.lock().await.is_empty()
    }
}

#[async_trait]
impl StorageAdapter for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, HaloError> {
        Ok(self.documents.lock().await.get(key).cloned())
    }

    async fn save(&self, key: &str, bytes: &[u8]) -> Result<(), HaloError> {
        self.documents
            .lock()
            .await
            .insert(key.to_string(), bytes.to_vec());
        Ok(())
    }
}
