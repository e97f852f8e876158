//! # PlanSync Sync Engine
//!
//! Offline-first sync between the local store and a remote backend.
//!
//! This crate provides:
//! - The pending-operation ledger (one record per row owed to the remote)
//! - The sync coordinator (parents-first push passes, full refresh)
//! - Last-write-wins application of remote snapshots
//! - Realtime change-feed listeners
//! - A background service reacting to connectivity and login
//!
//! ## Architecture
//!
//! Writes never wait on the network. The UI writes through
//! [`EntityRepository`], which stores the row and schedules a ledger record.
//! The [`SyncCoordinator`] later pushes each record and clears it on success.
//! Remote changes arrive through the [`RealtimeManager`] or a refresh and are
//! applied by the [`RemoteApplier`].
//!
//! ## Key Invariants
//!
//! - A row with an unresolved ledger record is never overwritten remotely
//! - The ledger holds at most one record per `(entity_id, entity_type)`
//! - The coordinator never pushes a record whose retry count has reached
//!   `max_retries`; such records stay `Failed` until requeued
//! - Parents are pushed before children
//!
//! Timestamps come from device clocks and there is no causal ordering, so a
//! device whose clock runs ahead can win writes it should lose.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod applier;
mod config;
mod connectivity;
mod coordinator;
mod error;
mod ledger;
mod mock;
mod realtime;
mod remote;
mod repository;
mod service;

pub use applier::{ApplyOutcome, RemoteApplier};
pub use config::{SyncConfig, ENV_ENTITY_DELAY_MS, ENV_MAX_RETRIES, ENV_SCHEMA};
pub use connectivity::ConnectivityMonitor;
pub use coordinator::{RefreshReport, SyncCoordinator, SyncPassReport, SyncState, SyncStats};
pub use error::{SyncError, SyncResult};
pub use ledger::PendingLedger;
pub use mock::{MockRemote, RemoteCall};
pub use realtime::RealtimeManager;
pub use remote::{ChangeSubscription, RealtimeSource, RemoteApi, Session};
pub use repository::{EntityRepository, RepositoryError, RepositoryResult};
pub use service::SyncService;
