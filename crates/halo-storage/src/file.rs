// SPDX-FileCopyrightText: 2026 Halo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Directory-backed document store: one `<key>.json` file per document.
//!
//! Writes go to a sibling temp file that is then renamed over the target,
//! so a crash mid-write leaves the previous document intact.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use halo_core::{HaloError, StorageAdapter};
use tracing::debug;

/// Document store writing one file per key under a directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `dir`. The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The directory documents are written to.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, HaloError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(HaloError::invalid(
                "storage key",
                format!("`{key}` may only contain ASCII letters, digits, `-` and `_`"),
            ));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

#[async_trait]
impl StorageAdapter for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, HaloError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(HaloError::storage(key, e)),
        }
    }

    async fn save(&self, key: &str, bytes: &[u8]) -> Result<(), HaloError> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension("json.tmp");

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| HaloError::storage(key, e))?;
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| HaloError::storage(key, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| HaloError::storage(key, e))?;

        debug!(key, path = %path.display(), bytes = bytes.len(), "document written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn round_trips_a_document() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().join("data"));
        assert!(store.load("halo-cost-tracking").await.unwrap().is_none());

        store.save("halo-cost-tracking", b"[]").await.unwrap();
        assert!(dir.path().join("data/halo-cost-tracking.json").exists());
        assert!(!dir.path().join("data/halo-cost-tracking.json.tmp").exists());
        assert_eq!(
            store.load("halo-cost-tracking").await.unwrap().as_deref(),
            Some(&b"[]"[..])
        );
    }

    #[tokio::test]
    async fn rejects_path_like_keys() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let err = store.save("../escape", b"x").await.unwrap_err();
        assert!(matches!(err, HaloError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn unreadable_location_is_a_storage_error() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();
        let store = FileStore::new(&blocker);
        let err = store.save("budget", b"{}").await.unwrap_err();
        assert!(matches!(err, HaloError::Storage { .. }));
    }
}
