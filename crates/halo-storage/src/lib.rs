// SPDX-FileCopyrightText: 2026 Halo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Document storage backends for the Halo usage meter.
//!
//! Each backend implements [`halo_core::StorageAdapter`]; [`open_store`]
//! picks one from the `[storage]` configuration section.

pub mod file;
pub mod memory;
pub mod sqlite;

use std::sync::Arc;

use halo_config::model::{StorageBackend, StorageConfig};
use halo_core::{HaloError, StorageAdapter};

pub use file::FileStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Build the storage backend selected by `config`.
pub async fn open_store(config: &StorageConfig) -> Result<Arc<dyn StorageAdapter>, HaloError> {
    let store: Arc<dyn StorageAdapter> = match config.backend {
        StorageBackend::File => Arc::new(FileStore::new(&config.data_dir)),
        StorageBackend::Sqlite => Arc::new(SqliteStore::open(&config.database_path).await?),
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
    };
    tracing::debug!(backend = store.name(), "storage backend ready");
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_store_honours_backend_selection() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = StorageConfig {
            backend: StorageBackend::Memory,
            data_dir: dir.path().join("docs").display().to_string(),
            database_path: dir.path().join("halo.db").display().to_string(),
        };
        assert_eq!(open_store(&config).await.unwrap().name(), "memory");

        config.backend = StorageBackend::File;
        assert_eq!(open_store(&config).await.unwrap().name(), "file");

        config.backend = StorageBackend::Sqlite;
        assert_eq!(open_store(&config).await.unwrap().name(), "sqlite");
    }
}
