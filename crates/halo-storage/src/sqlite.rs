// SPDX-FileCopyrightText: 2026 Halo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the StorageAdapter trait.
//!
//! Documents live in a single `documents` key/value table. All statements
//! run on tokio-rusqlite's background thread, which also serializes writes.

use std::path::Path;

use async_trait::async_trait;
use halo_core::{HaloError, StorageAdapter};
use rusqlite::{OptionalExtension, params};
use tracing::debug;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS documents (
        key TEXT PRIMARY KEY NOT NULL,
        body BLOB NOT NULL,
        updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
    );";

/// SQLite-backed document store.
pub struct SqliteStore {
    conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and ensure the schema exists.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, HaloError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| HaloError::storage(path.display().to_string(), e))?;
        }
        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| HaloError::storage(path.display().to_string(), e))?;
        let store = Self::with_connection(conn).await?;
        debug!(path = %path.display(), "SQLite document store opened");
        Ok(store)
    }

    /// Open a private in-memory database.
    pub async fn open_in_memory() -> Result<Self, HaloError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(|e| HaloError::storage(":memory:", e))?;
        Self::with_connection(conn).await
    }

    async fn with_connection(conn: tokio_rusqlite::Connection) -> Result<Self, HaloError> {
        conn.call(|conn| -> Result<(), rusqlite::Error> {
            // In-memory databases answer "memory" instead of "wal".
            let _mode: String =
                conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await
        .map_err(|e| HaloError::storage("documents", e))?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl StorageAdapter for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, HaloError> {
        let owned = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<Vec<u8>>, rusqlite::Error> {
                conn.query_row(
                    "SELECT body FROM documents WHERE key = ?1",
                    params![owned],
                    |row| row.get(0),
                )
                .optional()
            })
            .await
            .map_err(|e| HaloError::storage(key, e))
    }

    async fn save(&self, key: &str, bytes: &[u8]) -> Result<(), HaloError> {
        let owned = key.to_string();
        let body = bytes.to_vec();
        self.conn
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "INSERT INTO documents (key, body) VALUES (?1, ?2) \
                     ON CONFLICT(key) DO UPDATE SET body = excluded.body, \
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                    params![owned, body],
                )?;
                Ok(())
            })
            .await
            .map_err(|e| HaloError::storage(key, e))?;
        debug!(key, bytes = bytes.len(), "document saved to SQLite");
        Ok(())
    }
}
