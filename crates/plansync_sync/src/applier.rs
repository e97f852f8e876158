//! Applies remote snapshots to the local store through the conflict resolver.

use crate::error::SyncResult;
use chrono::Utc;
use parking_lot::Mutex;
use plansync_model::{Entity, EntityType};
use plansync_protocol::{
    ChangeKind, ConflictPolicy, ConflictRecord, ConflictResolver, DropReason, RemoteChange,
    Resolution,
};
use plansync_store::LocalStore;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Dropped snapshots kept for inspection.
const CONFLICT_LOG_CAPACITY: usize = 256;

/// What happened to an incoming change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The snapshot was written locally.
    Applied,
    /// The local row was deleted.
    Deleted,
    /// The snapshot was dropped in favour of local state.
    Dropped(DropReason),
    /// Nothing to do (row already identical, or already gone).
    Ignored,
}

/// Writes remote snapshots into the local store when the resolver allows it.
///
/// Dropped snapshots are logged and counted; they are never surfaced to UI
/// callers.
#[derive(Debug)]
pub struct RemoteApplier {
    store: Arc<LocalStore>,
    resolver: ConflictResolver,
    conflicts: Mutex<VecDeque<ConflictRecord>>,
    applied: AtomicU64,
    dropped: AtomicU64,
}

impl RemoteApplier {
    /// Creates an applier with the given policy.
    pub fn new(store: Arc<LocalStore>, policy: ConflictPolicy) -> Self {
        Self {
            store,
            resolver: ConflictResolver::new(policy),
            conflicts: Mutex::new(VecDeque::new()),
            applied: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Applies one realtime change event.
    pub fn apply_change(&self, change: RemoteChange) -> SyncResult<ApplyOutcome> {
        let entity_type = change.entity_type()?;
        match change.kind {
            ChangeKind::Insert | ChangeKind::Update => {
                let entity = change.into_entity()?;
                self.apply_snapshot(entity)
            }
            ChangeKind::Delete => {
                let id = change.record_id()?.to_string();
                self.apply_delete(entity_type, &id)
            }
        }
    }

    /// Applies a full row snapshot.
    pub fn apply_snapshot(&self, entity: Entity) -> SyncResult<ApplyOutcome> {
        let entity_type = entity.entity_type();
        let local = self.store.get(entity_type, entity.id());
        let pending = self.store.pending(entity.id(), entity_type);

        let resolution = self.resolver.resolve(
            entity.updated_at(),
            local.as_ref().map(Entity::updated_at),
            pending.as_ref(),
        );
        match resolution {
            Resolution::ApplyRemote => {
                if local.as_ref() == Some(&entity) {
                    return Ok(ApplyOutcome::Ignored);
                }
                debug!(entity_type = %entity_type, id = entity.id(), "applying remote snapshot");
                self.store.put(entity)?;
                self.applied.fetch_add(1, Ordering::Relaxed);
                Ok(ApplyOutcome::Applied)
            }
            Resolution::KeepLocal(reason) => {
                self.record_drop(ConflictRecord {
                    entity_type,
                    entity_id: entity.id().to_string(),
                    local_updated_at: local.as_ref().map(Entity::updated_at),
                    incoming_updated_at: Some(entity.updated_at()),
                    reason,
                    resolved_at: Utc::now(),
                });
                Ok(ApplyOutcome::Dropped(reason))
            }
        }
    }

    /// Applies a remote delete.
    ///
    /// A pending local operation on the row wins over the delete.
    pub fn apply_delete(&self, entity_type: EntityType, id: &str) -> SyncResult<ApplyOutcome> {
        let pending = self.store.pending(id, entity_type);
        if pending.as_ref().is_some_and(|op| op.is_unresolved()) {
            self.record_drop(ConflictRecord {
                entity_type,
                entity_id: id.to_string(),
                local_updated_at: self.store.get(entity_type, id).map(|e| e.updated_at()),
                incoming_updated_at: None,
                reason: DropReason::PendingLocalChange,
                resolved_at: Utc::now(),
            });
            return Ok(ApplyOutcome::Dropped(DropReason::PendingLocalChange));
        }

        match self.store.delete(entity_type, id)? {
            Some(_) => {
                debug!(entity_type = %entity_type, id, "applied remote delete");
                self.applied.fetch_add(1, Ordering::Relaxed);
                Ok(ApplyOutcome::Deleted)
            }
            None => Ok(ApplyOutcome::Ignored),
        }
    }

    /// Snapshots applied or deletes performed.
    pub fn applied_count(&self) -> u64 {
        self.applied.load(Ordering::Relaxed)
    }

    /// Snapshots dropped in favour of local state.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Most recent dropped snapshots, oldest first.
    pub fn recent_conflicts(&self) -> Vec<ConflictRecord> {
        self.conflicts.lock().iter().cloned().collect()
    }

    fn record_drop(&self, record: ConflictRecord) {
        debug!(
            entity_type = %record.entity_type,
            id = %record.entity_id,
            reason = %record.reason,
            "dropped remote snapshot"
        );
        self.dropped.fetch_add(1, Ordering::Relaxed);
        let mut log = self.conflicts.lock();
        if log.len() == CONFLICT_LOG_CAPACITY {
            log.pop_front();
        }
        log.push_back(record);
    }
}
