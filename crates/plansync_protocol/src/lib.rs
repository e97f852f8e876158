//! # PlanSync Protocol
//!
//! Sync vocabulary shared by the local store, the sync engine and the backend.
//!
//! This crate provides:
//! - Ledger records ([`PendingOperation`], [`SyncStatus`], [`OperationKind`])
//! - Remote DTO rows ([`RemoteRow`]) and the mapping to domain [`Entity`] values
//! - Remote change events ([`RemoteChange`]) and subscription filters
//! - Last-write-wins conflict resolution ([`ConflictResolver`])
//!
//! This crate has no I/O; it only defines data and pure decisions.
//!
//! [`Entity`]: plansync_model::Entity

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod change_feed;
mod conflict;
mod error;
mod operation;
mod pending;
mod row;

pub use change_feed::{ChangeFilter, ChangeKind, RemoteChange};
pub use conflict::{ConflictPolicy, ConflictRecord, ConflictResolver, DropReason, Resolution};
pub use error::{ProtocolError, ProtocolResult};
pub use operation::{OperationKind, SyncStatus};
pub use pending::PendingOperation;
pub use row::RemoteRow;
