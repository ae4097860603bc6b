// SPDX-FileCopyrightText: 2026 Halo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cost ledger: the append-only system of record for completed operations.
//!
//! Readers take lock-free snapshots (`arc-swap`), so a query never observes
//! a half-applied append. All mutations go through one async mutex, which
//! makes identifier assignment, the in-memory append and the durable write
//! of the whole ledger document a single serialized step.
//!
//! The in-memory ledger is updated before the write is attempted. When the
//! write fails the record stays, the document is marked dirty, and the next
//! mutation (or [`CostLedger::flush`]) writes it again.

use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use halo_core::{HaloError, OperationKind, RecordId, StorageAdapter, TokenUsage};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Storage key of the ledger document.
pub const LEDGER_KEY: &str = "halo-cost-tracking";

/// One completed operation and what it cost. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRecord {
    pub id: RecordId,
    pub timestamp: DateTime<Utc>,
    pub operation: OperationKind,
    pub model: String,
    pub tokens: TokenUsage,
    /// Cost in USD, fixed at the pricing in effect when recorded.
    pub cost: f64,
    pub success: bool,
    /// True iff `tokens.cached > 0`.
    pub cached: bool,
}

/// Everything about a record except its identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRecord {
    pub timestamp: DateTime<Utc>,
    pub operation: OperationKind,
    pub model: String,
    pub tokens: TokenUsage,
    pub cost: f64,
    pub success: bool,
}

impl OperationRecord {
    fn from_pending(id: RecordId, pending: PendingRecord) -> Self {
        Self {
            id,
            cached: pending.tokens.is_cached(),
            timestamp: pending.timestamp,
            operation: pending.operation,
            model: pending.model,
            tokens: pending.tokens,
            cost: pending.cost,
            success: pending.success,
        }
    }
}

/// Identifier for a record appended after `last` at `timestamp`.
///
/// Follows the timestamp in microseconds, but never repeats or goes
/// backwards even when records share a timestamp or the clock steps back.
fn next_id(last: Option<RecordId>, timestamp: DateTime<Utc>) -> RecordId {
    let from_time = u64::try_from(timestamp.timestamp_micros()).unwrap_or(0);
    match last {
        Some(RecordId(prev)) => RecordId(from_time.max(prev.saturating_add(1))),
        None => RecordId(from_time),
    }
}

#[derive(Default)]
struct WriterState {
    /// The last durable write failed; the stored document is stale.
    dirty: bool,
}

/// Append-only ledger persisted as one document through a [`StorageAdapter`].
pub struct CostLedger {
    records: ArcSwap<Vec<OperationRecord>>,
    writer: Mutex<WriterState>,
    store: Arc<dyn StorageAdapter>,
}

impl CostLedger {
    /// Create an empty ledger over `store` without reading it.
    pub fn new(store: Arc<dyn StorageAdapter>) -> Self {
        Self {
            records: ArcSwap::from_pointee(Vec::new()),
            writer: Mutex::new(WriterState::default()),
            store,
        }
    }

    /// Load the ledger document from `store`.
    ///
    /// A missing document yields an empty ledger. An unreadable or corrupt
    /// one also yields an empty ledger, together with the error so the
    /// caller can report it; startup never fails on bad persisted state.
    pub async fn load(store: Arc<dyn StorageAdapter>) -> (Self, Option<HaloError>) {
        let ledger = Self::new(store);
        let loaded = match ledger.store.load(LEDGER_KEY).await {
            Ok(None) => Ok(Vec::new()),
            Ok(Some(bytes)) => serde_json::from_slice::<Vec<OperationRecord>>(&bytes)
                .map_err(|e| HaloError::storage(LEDGER_KEY, e)),
            Err(e) => Err(e),
        };
        match loaded {
            Ok(records) => {
                debug!(
                    backend = ledger.store.name(),
                    records = records.len(),
                    "ledger loaded"
                );
                ledger.records.store(Arc::new(records));
                (ledger, None)
            }
            Err(e) => {
                warn!(error = %e, "ledger could not be loaded, starting empty");
                (ledger, Some(e))
            }
        }
    }

    /// Consistent view of every record in append order.
    pub fn snapshot(&self) -> Arc<Vec<OperationRecord>> {
        self.records.load_full()
    }

    pub fn len(&self) -> usize {
        self.records.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.load().is_empty()
    }

    /// Records matching `predicate`, in append order.
    pub fn query<F>(&self, predicate: F) -> Vec<OperationRecord>
    where
        F: Fn(&OperationRecord) -> bool,
    {
        self.records
            .load()
            .iter()
            .filter(|record| predicate(record))
            .cloned()
            .collect()
    }

    /// Append a record, assigning its identifier, and persist the ledger.
    ///
    /// On a failed write the record is still in the ledger and the returned
    /// [`HaloError::NotPersisted`] carries its identifier.
    pub async fn append(&self, pending: PendingRecord) -> Result<OperationRecord, HaloError> {
        let mut writer = self.writer.lock().await;

        let current = self.records.load_full();
        let id = next_id(current.last().map(|r| r.id), pending.timestamp);
        let record = OperationRecord::from_pending(id, pending);

        let mut next = Vec::with_capacity(current.len() + 1);
        next.extend(current.iter().cloned());
        next.push(record.clone());
        self.records.store(Arc::new(next));

        info!(
            id = %record.id,
            operation = %record.operation,
            model = %record.model,
            input_tokens = record.tokens.input,
            output_tokens = record.tokens.output,
            cached_tokens = record.tokens.cached,
            cost_usd = record.cost,
            "cost recorded"
        );

        self.persist(&mut writer)
            .await
            .map_err(|source| HaloError::NotPersisted {
                what: format!("record {id}"),
                record_id: Some(id),
                source: Box::new(source),
            })?;
        Ok(record)
    }

    /// Remove every record, or only those timestamped before `before`.
    ///
    /// Returns how many records were removed.
    pub async fn clear_history(&self, before: Option<DateTime<Utc>>) -> Result<usize, HaloError> {
        let mut writer = self.writer.lock().await;
        let current = self.records.load_full();
        let kept: Vec<OperationRecord> = match before {
            Some(cutoff) => current
                .iter()
                .filter(|r| r.timestamp >= cutoff)
                .cloned()
                .collect(),
            None => Vec::new(),
        };
        let removed = current.len() - kept.len();
        self.records.store(Arc::new(kept));
        info!(removed, ?before, "ledger history cleared");

        self.persist(&mut writer)
            .await
            .map_err(|source| HaloError::NotPersisted {
                what: "history trim".to_string(),
                record_id: None,
                source: Box::new(source),
            })?;
        Ok(removed)
    }

    /// Replace the whole ledger, e.g. from an import. Records must already
    /// be validated.
    pub async fn replace(&self, records: Vec<OperationRecord>) -> Result<(), HaloError> {
        let mut writer = self.writer.lock().await;
        let count = records.len();
        self.records.store(Arc::new(records));
        info!(records = count, "ledger replaced");

        self.persist(&mut writer)
            .await
            .map_err(|source| HaloError::NotPersisted {
                what: "imported ledger".to_string(),
                record_id: None,
                source: Box::new(source),
            })
    }

    /// Retry the durable write if the last one failed.
    pub async fn flush(&self) -> Result<(), HaloError> {
        let mut writer = self.writer.lock().await;
        if writer.dirty {
            self.persist(&mut writer).await?;
        }
        Ok(())
    }

    /// Whether the stored document lags behind memory.
    pub async fn is_dirty(&self) -> bool {
        self.writer.lock().await.dirty
    }

    /// Write the current snapshot. Caller holds the writer lock.
    async fn persist(&self, writer: &mut WriterState) -> Result<(), HaloError> {
        let snapshot = self.records.load_full();
        let bytes = serde_json::to_vec(snapshot.as_ref())
            .map_err(|e| HaloError::Internal(format!("ledger serialization failed: {e}")))?;
        match self.store.save(LEDGER_KEY, &bytes).await {
            Ok(()) => {
                writer.dirty = false;
                Ok(())
            }
            Err(e) => {
                writer.dirty = true;
                warn!(
                    backend = self.store.name(),
                    error = %e,
                    records = snapshot.len(),
                    "ledger write failed; will retry on next change"
                );
                Err(e)
            }
        }
    }
}
