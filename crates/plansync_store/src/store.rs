//! The local store.

use crate::backend::JournalBackend;
use crate::config::StoreConfig;
use crate::dir::StoreDir;
use crate::error::{StoreError, StoreResult};
use crate::file::FileJournal;
use crate::journal::{encode_frame, FrameReader, JournalEntry};
use crate::memory::MemoryJournal;
use crate::stats::{StoreCounters, StoreStats};
use crate::tables::Tables;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use plansync_model::{is_valid_id, Entity, EntityType};
use plansync_protocol::{PendingOperation, SyncStatus};
use std::path::Path;
use tracing::{debug, info, warn};

/// Journal handle plus bookkeeping guarded by the same lock.
struct Journal {
    backend: Box<dyn JournalBackend>,
    entries: u64,
    compacted_size: u64,
}

/// Result of a compaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactionReport {
    /// Journal size before compaction.
    pub bytes_before: u64,
    /// Journal size after compaction.
    pub bytes_after: u64,
    /// Frames written.
    pub entries: u64,
}

/// Journal-backed local persistence.
///
/// Holds one table per [`EntityType`] plus the pending-operation ledger.
/// Every mutation is appended to the journal before the in-memory tables are
/// updated, so a crash never leaves the tables ahead of the journal.
/// Mutations are atomic one at a time; there is no multi-mutation
/// transaction.
///
/// # Concurrency
///
/// Writers serialize on the journal lock. Readers only take the table lock
/// and never wait for journal I/O. Lock order is always journal, then tables.
pub struct LocalStore {
    journal: Mutex<Journal>,
    tables: RwLock<Tables>,
    config: StoreConfig,
    counters: StoreCounters,
    _dir: Option<StoreDir>,
}

impl LocalStore {
    /// Opens an empty in-memory store.
    #[must_use]
    pub fn open_in_memory() -> Self {
        Self::from_parts(
            Box::new(MemoryJournal::new()),
            Tables::default(),
            0,
            0,
            StoreConfig::default(),
            None,
        )
    }

    /// Opens (or creates) a file-backed store in `path`.
    ///
    /// Takes an exclusive lock on the directory for the lifetime of the store.
    pub fn open(path: &Path, config: StoreConfig) -> StoreResult<Self> {
        let dir = StoreDir::open(path, config.create_if_missing)?;
        let backend = FileJournal::open(&dir.journal_path())?;
        info!(path = %path.display(), "opening local store");
        Self::load(Box::new(backend), config, Some(dir))
    }

    /// Opens a store over an arbitrary journal backend, replaying it.
    pub fn with_backend(backend: Box<dyn JournalBackend>, config: StoreConfig) -> StoreResult<Self> {
        Self::load(backend, config, None)
    }

    fn load(
        mut backend: Box<dyn JournalBackend>,
        config: StoreConfig,
        dir: Option<StoreDir>,
    ) -> StoreResult<Self> {
        let data = backend.read_all()?;
        let mut reader = FrameReader::new(&data);
        let mut tables = Tables::default();
        let mut entries = 0u64;

        while let Some(frame) = reader.next_frame()? {
            let entry = JournalEntry::decode_payload(frame.kind, frame.payload)?;
            tables.apply(entry);
            entries += 1;
        }

        if reader.torn_tail() {
            let valid = reader.valid_len();
            warn!(
                valid_bytes = valid,
                total_bytes = data.len(),
                "discarding torn journal tail"
            );
            backend.replace(&data[..valid])?;
        }
        debug!(entries, "journal replayed");

        let size = backend.size()?;
        Ok(Self::from_parts(backend, tables, entries, size, config, dir))
    }

    fn from_parts(
        backend: Box<dyn JournalBackend>,
        tables: Tables,
        entries: u64,
        compacted_size: u64,
        config: StoreConfig,
        dir: Option<StoreDir>,
    ) -> Self {
        Self {
            journal: Mutex::new(Journal {
                backend,
                entries,
                compacted_size,
            }),
            tables: RwLock::new(tables),
            config,
            counters: StoreCounters::default(),
            _dir: dir,
        }
    }

    /// Returns the store configuration.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    // === Entity tables ===

    /// Inserts or replaces a row.
    pub fn put(&self, entity: Entity) -> StoreResult<()> {
        if !is_valid_id(entity.id()) || !is_valid_id(entity.user_id()) {
            return Err(StoreError::InvalidRecord(format!(
                "{} row has an empty or malformed id",
                entity.entity_type()
            )));
        }
        let mut journal = self.journal.lock();
        let bytes = self.commit_locked(&mut journal, JournalEntry::PutEntity(entity))?;
        self.counters.record_write(bytes);
        Ok(())
    }

    /// Reads a row.
    #[must_use]
    pub fn get(&self, entity_type: EntityType, id: &str) -> Option<Entity> {
        self.tables.read().get(entity_type, id).cloned()
    }

    /// Returns true if the row exists.
    #[must_use]
    pub fn contains(&self, entity_type: EntityType, id: &str) -> bool {
        self.tables.read().contains(entity_type, id)
    }

    /// Deletes a row, returning it if it existed.
    pub fn delete(&self, entity_type: EntityType, id: &str) -> StoreResult<Option<Entity>> {
        let mut journal = self.journal.lock();
        let Some(existing) = self.tables.read().get(entity_type, id).cloned() else {
            return Ok(None);
        };
        let bytes = self.commit_locked(
            &mut journal,
            JournalEntry::DeleteEntity {
                entity_type,
                id: id.to_string(),
            },
        )?;
        self.counters.record_delete(bytes);
        Ok(Some(existing))
    }

    /// Lists every row of a table, ordered by id.
    #[must_use]
    pub fn list(&self, entity_type: EntityType) -> Vec<Entity> {
        self.tables.read().list(entity_type).cloned().collect()
    }

    /// Lists the rows of a table owned by `user_id`.
    #[must_use]
    pub fn list_for_user(&self, entity_type: EntityType, user_id: &str) -> Vec<Entity> {
        self.tables
            .read()
            .list(entity_type)
            .filter(|e| e.user_id() == user_id)
            .cloned()
            .collect()
    }

    /// Number of rows in a table.
    #[must_use]
    pub fn count(&self, entity_type: EntityType) -> usize {
        self.tables.read().count(entity_type)
    }

    // === Ledger table ===

    /// Inserts or replaces the ledger record for `(op.entity_id, op.entity_type)`.
    ///
    /// The ledger keeps one record per key; an older request is overwritten,
    /// never queued behind the new one.
    pub fn upsert_pending(&self, op: PendingOperation) -> StoreResult<()> {
        let mut journal = self.journal.lock();
        let bytes = self.commit_locked(&mut journal, JournalEntry::UpsertPending(op))?;
        self.counters.record_ledger_write(bytes);
        Ok(())
    }

    /// Reads the ledger record for a key.
    #[must_use]
    pub fn pending(&self, entity_id: &str, entity_type: EntityType) -> Option<PendingOperation> {
        self.tables.read().pending(entity_type, entity_id).cloned()
    }

    /// Removes the ledger record for a key. Returns true if one existed.
    pub fn clear_pending(&self, entity_id: &str, entity_type: EntityType) -> StoreResult<bool> {
        self.clear_pending_if(entity_id, entity_type, |_| true)
    }

    /// Removes the ledger record for a key if `predicate` accepts it.
    ///
    /// The check and the removal happen under the writer lock, so no other
    /// write to the ledger can slip in between.
    pub fn clear_pending_if<F>(
        &self,
        entity_id: &str,
        entity_type: EntityType,
        predicate: F,
    ) -> StoreResult<bool>
    where
        F: FnOnce(&PendingOperation) -> bool,
    {
        let mut journal = self.journal.lock();
        let matches = self
            .tables
            .read()
            .pending(entity_type, entity_id)
            .is_some_and(predicate);
        if !matches {
            return Ok(false);
        }
        let bytes = self.commit_locked(
            &mut journal,
            JournalEntry::ClearPending {
                entity_type,
                id: entity_id.to_string(),
            },
        )?;
        self.counters.record_ledger_write(bytes);
        Ok(true)
    }

    /// Read-modify-writes the ledger record for a key.
    ///
    /// `update` returns false to leave the record untouched. Returns the
    /// written record, or `None` if there was no record or nothing was written.
    pub fn update_pending<F>(
        &self,
        entity_id: &str,
        entity_type: EntityType,
        update: F,
    ) -> StoreResult<Option<PendingOperation>>
    where
        F: FnOnce(&mut PendingOperation) -> bool,
    {
        let mut journal = self.journal.lock();
        let Some(mut op) = self.tables.read().pending(entity_type, entity_id).cloned() else {
            return Ok(None);
        };
        if !update(&mut op) {
            return Ok(None);
        }
        let bytes = self.commit_locked(&mut journal, JournalEntry::UpsertPending(op.clone()))?;
        self.counters.record_ledger_write(bytes);
        Ok(Some(op))
    }

    /// Unresolved ledger records of one type.
    ///
    /// The order within a type carries no meaning.
    #[must_use]
    pub fn pending_for_type(&self, entity_type: EntityType) -> Vec<PendingOperation> {
        self.tables
            .read()
            .ledger()
            .filter(|op| op.entity_type == entity_type && op.is_unresolved())
            .cloned()
            .collect()
    }

    /// Every ledger record.
    #[must_use]
    pub fn all_pending(&self) -> Vec<PendingOperation> {
        self.tables.read().ledger().cloned().collect()
    }

    /// Ledger records whose last push failed.
    #[must_use]
    pub fn failed(&self) -> Vec<PendingOperation> {
        self.tables
            .read()
            .ledger()
            .filter(|op| op.status == SyncStatus::Failed)
            .cloned()
            .collect()
    }

    /// Resets every `Failed` record to `Pending` with a fresh retry budget.
    ///
    /// Returns the number of records requeued.
    pub fn requeue_failed(&self, now: DateTime<Utc>) -> StoreResult<usize> {
        let mut journal = self.journal.lock();
        let failed: Vec<PendingOperation> = self
            .tables
            .read()
            .ledger()
            .filter(|op| op.status == SyncStatus::Failed)
            .cloned()
            .collect();

        for mut op in failed.iter().cloned() {
            op.requeue(now);
            let bytes = self.commit_locked(&mut journal, JournalEntry::UpsertPending(op))?;
            self.counters.record_ledger_write(bytes);
        }
        if !failed.is_empty() {
            info!(count = failed.len(), "requeued failed ledger records");
        }
        Ok(failed.len())
    }

    // === Maintenance ===

    /// Rewrites the journal so it holds only live state.
    pub fn compact(&self) -> StoreResult<CompactionReport> {
        let mut journal = self.journal.lock();
        self.compact_locked(&mut journal)
    }

    /// Current journal size in bytes.
    pub fn journal_size(&self) -> StoreResult<u64> {
        self.journal.lock().backend.size()
    }

    /// Flushes the journal to durable storage.
    pub fn sync(&self) -> StoreResult<()> {
        self.journal.lock().backend.sync()
    }

    /// Returns running counters.
    #[must_use]
    pub fn counters(&self) -> &StoreCounters {
        &self.counters
    }

    /// Returns a point-in-time view of the store.
    pub fn stats(&self) -> StoreResult<StoreStats> {
        let journal = self.journal.lock();
        let tables = self.tables.read();
        Ok(StoreStats {
            tables: EntityType::sync_order()
                .into_iter()
                .map(|t| (t.table_name().to_string(), tables.count(t)))
                .collect(),
            pending: tables.ledger_count(SyncStatus::Pending),
            failed: tables.ledger_count(SyncStatus::Failed),
            journal_bytes: journal.backend.size()?,
            journal_entries: journal.entries,
            writes: self.counters.writes(),
            deletes: self.counters.deletes(),
            ledger_writes: self.counters.ledger_writes(),
            compactions: self.counters.compactions(),
        })
    }

    // === Internals ===

    /// Appends an entry, applies it, and compacts if the journal grew past
    /// the threshold. Returns the number of bytes appended.
    fn commit_locked(&self, journal: &mut Journal, entry: JournalEntry) -> StoreResult<u64> {
        let frame = encode_frame(entry.kind().as_byte(), &entry.encode_payload()?)?;
        journal.backend.append(&frame)?;
        if self.config.sync_on_write {
            journal.backend.sync()?;
        }
        journal.entries += 1;
        self.tables.write().apply(entry);

        if self.should_compact(journal)? {
            if let Err(err) = self.compact_locked(journal) {
                warn!(error = %err, "automatic compaction failed");
            }
        }
        Ok(frame.len() as u64)
    }

    fn should_compact(&self, journal: &Journal) -> StoreResult<bool> {
        let threshold = self.config.compact_threshold;
        if threshold == 0 {
            return Ok(false);
        }
        let size = journal.backend.size()?;
        Ok(size > threshold && size > journal.compacted_size.saturating_mul(2))
    }

    fn compact_locked(&self, journal: &mut Journal) -> StoreResult<CompactionReport> {
        let bytes_before = journal.backend.size()?;
        let entries = self.tables.read().snapshot_entries();

        let mut image = Vec::new();
        for entry in &entries {
            image.extend(encode_frame(entry.kind().as_byte(), &entry.encode_payload()?)?);
        }
        journal.backend.replace(&image)?;

        let report = CompactionReport {
            bytes_before,
            bytes_after: image.len() as u64,
            entries: entries.len() as u64,
        };
        journal.entries = report.entries;
        journal.compacted_size = report.bytes_after;
        self.counters.record_compaction();
        info!(
            bytes_before = report.bytes_before,
            bytes_after = report.bytes_after,
            entries = report.entries,
            "journal compacted"
        );
        Ok(report)
    }
}

impl std::fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
