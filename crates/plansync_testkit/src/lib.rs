//! # PlanSync Testkit
//!
//! Test utilities for PlanSync.
//!
//! This crate provides:
//! - Store fixtures (in-memory and temp-dir backed)
//! - Sample records for every entity type
//! - Property-based test generators using proptest
//! - A sync harness wiring a store, a reference backend and a coordinator
//!
//! ## Usage
//!
//! ```rust,ignore
//! use plansync_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn pushes_a_task() {
//!     let harness = SyncHarness::new("user-1");
//!     let task = harness.repository().create(sample_task("user-1"))?;
//!     harness.coordinator().sync_all().await?;
//!     assert!(harness.backend().row("tasks", task.id()).is_some());
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod harness;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::harness::*;
}

pub use fixtures::*;
pub use generators::*;
pub use harness::*;
