//! # PlanSync Store
//!
//! Local persistence for PlanSync: one table per entity type plus the
//! pending-operation ledger, rebuilt on open from an append-only journal.
//!
//! ## Directory layout
//!
//! ```text
//! <store_path>/
//! ├─ LOCK          # Advisory lock for single-writer
//! └─ journal.log   # Append-only journal
//! ```
//!
//! ## Example
//!
//! ```rust
//! use plansync_model::{Entity, EntityType, Task};
//! use plansync_store::LocalStore;
//!
//! let store = LocalStore::open_in_memory();
//! let task = Entity::from(Task::new("user-1", "Write weekly plan"));
//! let id = task.id().to_string();
//! store.put(task).unwrap();
//! assert!(store.get(EntityType::Task, &id).is_some());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod config;
mod dir;
mod error;
mod file;
pub mod journal;
mod memory;
mod stats;
mod store;
mod tables;

pub use backend::JournalBackend;
pub use config::StoreConfig;
pub use dir::StoreDir;
pub use error::{StoreError, StoreResult};
pub use file::FileJournal;
pub use memory::MemoryJournal;
pub use stats::{StoreCounters, StoreStats};
pub use store::{CompactionReport, LocalStore};
