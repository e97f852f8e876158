//! Ledger status and operation kinds.

use serde::{Deserialize, Serialize};

/// Sync state of a single record as tracked by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Local and remote agree.
    #[default]
    Synced,
    /// A push is waiting.
    Pending,
    /// The last push failed.
    Failed,
}

impl SyncStatus {
    /// Converts to a numeric code.
    #[must_use]
    pub const fn to_code(self) -> u8 {
        match self {
            SyncStatus::Synced => 0,
            SyncStatus::Pending => 1,
            SyncStatus::Failed => 2,
        }
    }

    /// Converts from a numeric code.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(SyncStatus::Synced),
            1 => Some(SyncStatus::Pending),
            2 => Some(SyncStatus::Failed),
            _ => None,
        }
    }

    /// Short lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            SyncStatus::Synced => "synced",
            SyncStatus::Pending => "pending",
            SyncStatus::Failed => "failed",
        }
    }
}

/// What a pending push must do on the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Nothing to push.
    #[default]
    None,
    /// Insert the row.
    Create,
    /// Replace the row.
    Update,
    /// Remove the row.
    Delete,
}

impl OperationKind {
    /// Converts to a numeric code.
    #[must_use]
    pub const fn to_code(self) -> u8 {
        match self {
            OperationKind::None => 0,
            OperationKind::Create => 1,
            OperationKind::Update => 2,
            OperationKind::Delete => 3,
        }
    }

    /// Converts from a numeric code.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(OperationKind::None),
            1 => Some(OperationKind::Create),
            2 => Some(OperationKind::Update),
            3 => Some(OperationKind::Delete),
            _ => None,
        }
    }

    /// Returns true if the push writes a row snapshot (create or update).
    #[must_use]
    pub const fn carries_row(self) -> bool {
        matches!(self, OperationKind::Create | OperationKind::Update)
    }

    /// Short lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            OperationKind::None => "none",
            OperationKind::Create => "create",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_codes() {
        for op in [
            OperationKind::None,
            OperationKind::Create,
            OperationKind::Update,
            OperationKind::Delete,
        ] {
            assert_eq!(OperationKind::from_code(op.to_code()), Some(op));
        }
        assert_eq!(OperationKind::from_code(99), None);
    }

    #[test]
    fn status_codes() {
        for status in [SyncStatus::Synced, SyncStatus::Pending, SyncStatus::Failed] {
            assert_eq!(SyncStatus::from_code(status.to_code()), Some(status));
        }
        assert_eq!(SyncStatus::from_code(3), None);
    }

    #[test]
    fn carries_row() {
        assert!(OperationKind::Create.carries_row());
        assert!(OperationKind::Update.carries_row());
        assert!(!OperationKind::Delete.carries_row());
        assert!(!OperationKind::None.carries_row());
    }
}
