//! The pending-operation ledger.
//!
//! Every local mutation leaves one ledger record saying what the remote still
//! needs to hear about that row. The record is cleared once the push lands.

use crate::connectivity::ConnectivityMonitor;
use crate::error::SyncResult;
use chrono::Utc;
use parking_lot::RwLock;
use plansync_model::EntityType;
use plansync_protocol::{OperationKind, PendingOperation};
use plansync_store::LocalStore;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Schedules and settles pending operations in the local store.
///
/// # Concurrency
///
/// Each ledger write is atomic on its own. Two writers scheduling the same
/// key race and the last write wins; nothing merges their requests.
#[derive(Debug)]
pub struct PendingLedger {
    store: Arc<LocalStore>,
    connectivity: ConnectivityMonitor,
    trigger: RwLock<Option<mpsc::UnboundedSender<EntityType>>>,
}

impl PendingLedger {
    /// Creates a ledger over `store`.
    pub fn new(store: Arc<LocalStore>, connectivity: ConnectivityMonitor) -> Self {
        Self {
            store,
            connectivity,
            trigger: RwLock::new(None),
        }
    }

    /// Installs the channel used to request a sync pass for one entity type.
    pub fn set_trigger(&self, trigger: mpsc::UnboundedSender<EntityType>) {
        *self.trigger.write() = Some(trigger);
    }

    /// Records that `entity_id` needs `operation` pushed.
    ///
    /// Replaces any earlier record for the key outright, resetting the retry
    /// count and last error. If the device is online, a sync pass for the
    /// entity type is requested right away.
    pub fn schedule_sync_operation(
        &self,
        entity_id: &str,
        entity_type: EntityType,
        operation: OperationKind,
    ) -> SyncResult<PendingOperation> {
        let op = PendingOperation::scheduled(entity_id, entity_type, operation, Utc::now());
        self.store.upsert_pending(op.clone())?;
        debug!(
            entity_type = %entity_type,
            entity_id,
            operation = operation.as_str(),
            "scheduled sync operation"
        );

        if self.connectivity.is_online() {
            self.request_sync(entity_type);
        }
        Ok(op)
    }

    /// Clears the record for a key after a successful push.
    pub fn mark_synced(&self, entity_id: &str, entity_type: EntityType) -> SyncResult<bool> {
        Ok(self.store.clear_pending(entity_id, entity_type)?)
    }

    /// Records a failed push: bumps the retry count and stores the message.
    ///
    /// The count is not capped here; the coordinator stops pushing a record
    /// once it reaches `max_retries`.
    pub fn mark_failed(
        &self,
        entity_id: &str,
        entity_type: EntityType,
        error: &str,
    ) -> SyncResult<Option<PendingOperation>> {
        Ok(self.store.update_pending(entity_id, entity_type, |op| {
            op.record_failure(error, Utc::now());
            true
        })?)
    }

    /// Clears the record only if it still describes `pushed`.
    ///
    /// A record rescheduled while the push was in flight is left for the next
    /// pass. Returns true if the record was cleared.
    pub fn complete(&self, pushed: &PendingOperation) -> SyncResult<bool> {
        let cleared = self
            .store
            .clear_pending_if(&pushed.entity_id, pushed.entity_type, |current| {
                current.same_request(pushed)
            })?;
        if !cleared {
            trace!(entity_id = %pushed.entity_id, "ledger record changed during push");
        }
        Ok(cleared)
    }

    /// Records a failure only if the record still describes `attempted`.
    pub fn fail(&self, attempted: &PendingOperation, error: &str) -> SyncResult<Option<PendingOperation>> {
        Ok(self
            .store
            .update_pending(&attempted.entity_id, attempted.entity_type, |current| {
                if !current.same_request(attempted) {
                    return false;
                }
                current.record_failure(error, Utc::now());
                true
            })?)
    }

    /// Returns the unresolved record for a key, if any.
    pub fn get_pending_operation(
        &self,
        entity_id: &str,
        entity_type: EntityType,
    ) -> Option<PendingOperation> {
        self.store
            .pending(entity_id, entity_type)
            .filter(PendingOperation::is_unresolved)
    }

    /// Unresolved records of one type.
    pub fn pending_for_type(&self, entity_type: EntityType) -> Vec<PendingOperation> {
        self.store.pending_for_type(entity_type)
    }

    fn request_sync(&self, entity_type: EntityType) {
        if let Some(trigger) = self.trigger.read().as_ref() {
            if trigger.send(entity_type).is_err() {
                trace!(entity_type = %entity_type, "sync trigger listener is gone");
            }
        }
    }
}
