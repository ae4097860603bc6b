// SPDX-FileCopyrightText: 2026 Halo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for metering integration tests.
//!
//! `TestHarness` assembles a [`UsageMeter`] over a chosen storage backend
//! with a [`ManualClock`], so calendar-sensitive behavior is deterministic.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use halo_config::HaloConfig;
use halo_config::model::{StorageBackend, TimeZonePolicy};
use halo_core::{HaloError, OperationKind, StorageAdapter, TokenUsage};
use halo_cost::{Clock, ManualClock, OperationRecord, PendingRecord, UsageMeter};
use halo_storage::{FileStore, SqliteStore};

use crate::flaky_store::FlakyStore;

/// Model used by [`TestHarness::record`] when none is given.
pub const TEST_MODEL: &str = "claude-3-5-sonnet-20240620";

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    config: HaloConfig,
    start: DateTime<Utc>,
    backend: StorageBackend,
    flaky: Option<Arc<FlakyStore>>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        let mut config = HaloConfig::default();
        config.calendar.time_zone = TimeZonePolicy::Utc;
        Self {
            config,
            start: DateTime::from_timestamp(1_773_133_200, 0).unwrap_or_default(),
            backend: StorageBackend::Memory,
            flaky: None,
        }
    }

    /// Start the manual clock at `start` (UTC calendar).
    pub fn starting_at(mut self, start: DateTime<Utc>) -> Self {
        self.start = start;
        self
    }

    /// Set the daily and monthly limits used as the initial budget.
    pub fn with_budget(mut self, daily: Option<f64>, monthly: Option<f64>) -> Self {
        self.config.budget.daily_limit_usd = daily;
        self.config.budget.monthly_limit_usd = monthly;
        self
    }

    /// Use a temp-dir backed store of the given kind.
    pub fn with_backend(mut self, backend: StorageBackend) -> Self {
        self.backend = backend;
        self
    }

    /// Use a failure-injecting store shared with the caller.
    pub fn with_flaky_store(mut self, store: Arc<FlakyStore>) -> Self {
        self.flaky = Some(store);
        self
    }

    /// Adjust the configuration before the meter is opened.
    pub fn configure(mut self, f: impl FnOnce(&mut HaloConfig)) -> Self {
        f(&mut self.config);
        self
    }

    /// Build the harness. Load errors fail the build.
    pub async fn build(self) -> Result<TestHarness, HaloError> {
        let temp_dir = tempfile::TempDir::new().map_err(|e| HaloError::storage("tempdir", e))?;

        let store: Arc<dyn StorageAdapter> = match (&self.flaky, self.backend) {
            (Some(flaky), _) => flaky.clone(),
            (None, StorageBackend::Memory) => Arc::new(halo_storage::MemoryStore::new()),
            (None, StorageBackend::File) => Arc::new(FileStore::new(temp_dir.path())),
            (None, StorageBackend::Sqlite) => {
                Arc::new(SqliteStore::open(temp_dir.path().join("halo.db")).await?)
            }
        };

        let clock = Arc::new(ManualClock::new(self.start));
        let (meter, mut errors) =
            UsageMeter::open_with_clock(store.clone(), &self.config, clock.clone()).await?;
        if let Some(first) = errors.drain(..).next() {
            return Err(first);
        }

        Ok(TestHarness {
            meter: Arc::new(meter),
            clock,
            store,
            config: self.config,
            _temp_dir: temp_dir,
        })
    }
}

/// A meter, its clock and its store, kept alive together.
pub struct TestHarness {
    pub meter: Arc<UsageMeter>,
    pub clock: Arc<ManualClock>,
    pub store: Arc<dyn StorageAdapter>,
    pub config: HaloConfig,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Record a chat operation on [`TEST_MODEL`].
    pub async fn record(&self, input: u64, output: u64) -> Result<OperationRecord, HaloError> {
        self.meter
            .record_operation(
                OperationKind::Chat,
                TEST_MODEL,
                TokenUsage::new(input, output, 0),
                true,
            )
            .await
    }

    /// Append a record that cost exactly `usd`, bypassing the pricing table.
    pub async fn record_cost(&self, usd: f64) -> Result<OperationRecord, HaloError> {
        self.meter
            .ledger()
            .append(PendingRecord {
                timestamp: self.clock.now(),
                operation: OperationKind::Chat,
                model: TEST_MODEL.to_string(),
                tokens: TokenUsage::new(1000, 1000, 0),
                cost: usd,
                success: true,
            })
            .await
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }

    /// A second meter over the same store and clock, as after a restart.
    pub async fn reopen(&self) -> Result<(UsageMeter, Vec<HaloError>), HaloError> {
        UsageMeter::open_with_clock(self.store.clone(), &self.config, self.clock.clone()).await
    }
}
