//! Shared test utilities for transplant integration tests.
//!
//! This module provides:
//! - `TestHarness` with temp directories and fake trackers
//! - Builders for listings, torrents and settings

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::{FakeHost, FakeTracker, TestHarness};
