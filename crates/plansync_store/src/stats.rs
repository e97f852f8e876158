//! Store statistics.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Running operation counters.
///
/// All counters are atomic and can be read while operations are in progress.
#[derive(Debug, Default)]
pub struct StoreCounters {
    writes: AtomicU64,
    deletes: AtomicU64,
    ledger_writes: AtomicU64,
    bytes_written: AtomicU64,
    compactions: AtomicU64,
}

impl StoreCounters {
    pub(crate) fn record_write(&self, bytes: u64) {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_delete(&self, bytes: u64) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_ledger_write(&self, bytes: u64) {
        self.ledger_writes.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_compaction(&self) {
        self.compactions.fetch_add(1, Ordering::Relaxed);
    }

    /// Total entity writes.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Total entity deletes.
    pub fn deletes(&self) -> u64 {
        self.deletes.load(Ordering::Relaxed)
    }

    /// Total ledger upserts and clears.
    pub fn ledger_writes(&self) -> u64 {
        self.ledger_writes.load(Ordering::Relaxed)
    }

    /// Total journal bytes appended.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    /// Total compactions.
    pub fn compactions(&self) -> u64 {
        self.compactions.load(Ordering::Relaxed)
    }
}

/// A point-in-time view of the store.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct StoreStats {
    /// Row count per table name.
    pub tables: BTreeMap<String, usize>,
    /// Ledger records with status `pending`.
    pub pending: usize,
    /// Ledger records with status `failed`.
    pub failed: usize,
    /// Current journal size in bytes.
    pub journal_bytes: u64,
    /// Frames appended since open or the last compaction.
    pub journal_entries: u64,
    /// Entity writes since open.
    pub writes: u64,
    /// Entity deletes since open.
    pub deletes: u64,
    /// Ledger writes since open.
    pub ledger_writes: u64,
    /// Compactions since open.
    pub compactions: u64,
}

impl StoreStats {
    /// Total rows across all tables.
    #[must_use]
    pub fn total_rows(&self) -> usize {
        self.tables.values().sum()
    }
}
