//! The pending-operation ledger record.

use crate::operation::{OperationKind, SyncStatus};
use chrono::{DateTime, Utc};
use plansync_model::EntityType;
use serde::{Deserialize, Serialize};

/// Sync bookkeeping for one record, keyed by `(entity_id, entity_type)`.
///
/// The ledger holds at most one of these per key. Scheduling a new operation
/// replaces the previous record outright.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingOperation {
    /// Id of the record to push.
    pub entity_id: String,
    /// Type of the record to push.
    pub entity_type: EntityType,
    /// Current sync state.
    pub status: SyncStatus,
    /// Push to perform.
    pub operation: OperationKind,
    /// Failed push attempts since the operation was scheduled.
    pub retry_count: u32,
    /// Message of the last failure.
    pub last_error: Option<String>,
    /// When the record was last written.
    pub updated_at: DateTime<Utc>,
}

impl PendingOperation {
    /// Creates a fresh `Pending` record.
    pub fn scheduled(
        entity_id: impl Into<String>,
        entity_type: EntityType,
        operation: OperationKind,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            entity_type,
            status: SyncStatus::Pending,
            operation,
            retry_count: 0,
            last_error: None,
            updated_at: now,
        }
    }

    /// Returns true if a push is still owed to the remote.
    #[must_use]
    pub fn is_unresolved(&self) -> bool {
        self.status != SyncStatus::Synced && self.operation != OperationKind::None
    }

    /// Returns true if the retry ceiling has been reached.
    #[must_use]
    pub fn is_exhausted(&self, max_retries: u32) -> bool {
        self.retry_count >= max_retries
    }

    /// Records a failed attempt.
    pub fn record_failure(&mut self, error: impl Into<String>, now: DateTime<Utc>) {
        self.status = SyncStatus::Failed;
        self.retry_count = self.retry_count.saturating_add(1);
        self.last_error = Some(error.into());
        self.updated_at = now;
    }

    /// Puts a failed record back in the queue with a fresh retry budget.
    pub fn requeue(&mut self, now: DateTime<Utc>) {
        self.status = SyncStatus::Pending;
        self.retry_count = 0;
        self.last_error = None;
        self.updated_at = now;
    }

    /// Returns true if `other` describes the same request as `self`.
    ///
    /// Used to detect whether a record was rescheduled while a push was in
    /// flight.
    #[must_use]
    pub fn same_request(&self, other: &PendingOperation) -> bool {
        self.entity_id == other.entity_id
            && self.entity_type == other.entity_type
            && self.operation == other.operation
            && self.updated_at == other.updated_at
    }
}
