//! # PlanSync Backend
//!
//! In-process reference backend for PlanSync.
//!
//! This crate provides:
//! - JSON tables addressed by table name and row id
//! - A realtime change feed with per-table, per-user filters
//! - HMAC-SHA256 access tokens
//! - Row ownership checks for signed-in sessions
//! - Fault injection for tests (offline, transient failures, failing tables)
//!
//! # Usage
//!
//! ```rust,ignore
//! use plansync_backend::MemoryBackend;
//!
//! let backend = MemoryBackend::default();
//! let session = backend.sign_in("user-1")?;
//! let client = backend.attach(&session)?;
//! // `client` implements `RemoteApi` and `RealtimeSource`.
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod auth;
mod backend;
mod config;
mod error;
mod feed;
mod tables;

pub use auth::TokenIssuer;
pub use backend::{BackendStats, MemoryBackend};
pub use config::BackendConfig;
pub use error::{BackendError, BackendResult};
