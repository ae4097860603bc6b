// SPDX-FileCopyrightText: 2026 Halo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Halo integration tests.
//!
//! # Components
//!
//! - [`FlakyStore`] - storage adapter with injectable read and write failures
//! - [`TestHarness`] - a meter over temp storage driven by a manual clock

pub mod flaky_store;
pub mod harness;

pub use flaky_store::FlakyStore;
pub use harness::{TEST_MODEL, TestHarness};
