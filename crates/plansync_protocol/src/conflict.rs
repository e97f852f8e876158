//! Conflict resolution between local state and incoming remote snapshots.
//!
//! The policy is last-write-wins on `updated_at`, with one override: a record
//! that still owes a push to the remote is never overwritten by an incoming
//! snapshot. The local edit wins until it has been pushed.
//!
//! Timestamps come from device clocks, so a device whose clock runs ahead can
//! win writes it should lose. There is no causal ordering here.

use crate::pending::PendingOperation;
use chrono::{DateTime, Utc};
use plansync_model::EntityType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How incoming snapshots are weighed against local rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Newer `updated_at` wins; ties go to the remote.
    #[default]
    LastWriteWins,
    /// The remote always wins unless a local push is pending.
    RemoteWins,
}

/// Why an incoming snapshot was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// The record has an unresolved pending operation.
    PendingLocalChange,
    /// The local row is strictly newer.
    LocalNewer,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::PendingLocalChange => f.write_str("pending local change"),
            DropReason::LocalNewer => f.write_str("local row is newer"),
        }
    }
}

/// Outcome of a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Write the incoming snapshot locally.
    ApplyRemote,
    /// Keep the local row and drop the snapshot.
    KeepLocal(DropReason),
}

impl Resolution {
    /// Returns true if the snapshot should be applied.
    #[must_use]
    pub fn applies(self) -> bool {
        matches!(self, Resolution::ApplyRemote)
    }
}

/// Decides whether an incoming remote snapshot replaces local state.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConflictResolver {
    policy: ConflictPolicy,
}

impl ConflictResolver {
    /// Creates a resolver with the given policy.
    #[must_use]
    pub fn new(policy: ConflictPolicy) -> Self {
        Self { policy }
    }

    /// Returns the active policy.
    #[must_use]
    pub fn policy(&self) -> ConflictPolicy {
        self.policy
    }

    /// Resolves an incoming snapshot.
    ///
    /// * `incoming` - `updated_at` of the remote snapshot
    /// * `local` - `updated_at` of the local row, if one exists
    /// * `pending` - the ledger record for the same key, if any
    #[must_use]
    pub fn resolve(
        &self,
        incoming: DateTime<Utc>,
        local: Option<DateTime<Utc>>,
        pending: Option<&PendingOperation>,
    ) -> Resolution {
        if pending.is_some_and(PendingOperation::is_unresolved) {
            return Resolution::KeepLocal(DropReason::PendingLocalChange);
        }
        match (self.policy, local) {
            (ConflictPolicy::LastWriteWins, Some(local)) if local > incoming => {
                Resolution::KeepLocal(DropReason::LocalNewer)
            }
            _ => Resolution::ApplyRemote,
        }
    }
}

/// A dropped snapshot, kept for logs and stats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRecord {
    /// Type of the record.
    pub entity_type: EntityType,
    /// Id of the record.
    pub entity_id: String,
    /// `updated_at` of the local row.
    pub local_updated_at: Option<DateTime<Utc>>,
    /// `updated_at` of the dropped snapshot.
    pub incoming_updated_at: Option<DateTime<Utc>>,
    /// Why it was dropped.
    pub reason: DropReason,
    /// When the decision was made.
    pub resolved_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::{OperationKind, SyncStatus};
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_767_225_600 + secs, 0).unwrap()
    }

    fn pending(status: SyncStatus, operation: OperationKind) -> PendingOperation {
        let mut op = PendingOperation::scheduled("t1", EntityType::Task, operation, ts(0));
        op.status = status;
        op
    }

    #[test]
    fn pending_change_wins() {
        let resolver = ConflictResolver::default();
        let op = pending(SyncStatus::Pending, OperationKind::Update);
        assert_eq!(
            resolver.resolve(ts(100), Some(ts(0)), Some(&op)),
            Resolution::KeepLocal(DropReason::PendingLocalChange)
        );

        // A failed push is still owed.
        let failed = pending(SyncStatus::Failed, OperationKind::Update);
        assert_eq!(
            resolver.resolve(ts(100), None, Some(&failed)),
            Resolution::KeepLocal(DropReason::PendingLocalChange)
        );
    }

    #[test]
    fn resolved_ledger_record_does_not_block() {
        let resolver = ConflictResolver::default();
        let synced = pending(SyncStatus::Synced, OperationKind::Update);
        assert_eq!(
            resolver.resolve(ts(100), Some(ts(0)), Some(&synced)),
            Resolution::ApplyRemote
        );
        let noop = pending(SyncStatus::Pending, OperationKind::None);
        assert!(resolver.resolve(ts(100), None, Some(&noop)).applies());
    }

    #[test]
    fn newer_local_wins_ties_go_remote() {
        let resolver = ConflictResolver::default();
        assert_eq!(
            resolver.resolve(ts(0), Some(ts(1)), None),
            Resolution::KeepLocal(DropReason::LocalNewer)
        );
        assert_eq!(resolver.resolve(ts(1), Some(ts(1)), None), Resolution::ApplyRemote);
        assert_eq!(resolver.resolve(ts(2), Some(ts(1)), None), Resolution::ApplyRemote);
        assert_eq!(resolver.resolve(ts(0), None, None), Resolution::ApplyRemote);
    }

    #[test]
    fn remote_wins_policy_ignores_timestamps() {
        let resolver = ConflictResolver::new(ConflictPolicy::RemoteWins);
        assert_eq!(
            resolver.resolve(ts(0), Some(ts(50)), None),
            Resolution::ApplyRemote
        );
        let op = pending(SyncStatus::Pending, OperationKind::Delete);
        assert!(!resolver.resolve(ts(0), Some(ts(50)), Some(&op)).applies());
    }

    proptest! {
        #[test]
        fn unresolved_pending_never_applies(
            incoming in -10_000i64..10_000,
            local in proptest::option::of(-10_000i64..10_000),
            op_code in 1u8..=3,
            failed in any::<bool>(),
        ) {
            let status = if failed { SyncStatus::Failed } else { SyncStatus::Pending };
            let op = pending(status, OperationKind::from_code(op_code).unwrap());
            for policy in [ConflictPolicy::LastWriteWins, ConflictPolicy::RemoteWins] {
                let r = ConflictResolver::new(policy)
                    .resolve(ts(incoming), local.map(ts), Some(&op));
                prop_assert_eq!(r, Resolution::KeepLocal(DropReason::PendingLocalChange));
            }
        }

        #[test]
        fn lww_applies_iff_not_older(incoming in -10_000i64..10_000, local in -10_000i64..10_000) {
            let r = ConflictResolver::default().resolve(ts(incoming), Some(ts(local)), None);
            prop_assert_eq!(r.applies(), incoming >= local);
        }
    }

    #[test]
    fn drop_reason_display() {
        assert_eq!(DropReason::LocalNewer.to_string(), "local row is newer");
    }
}
