//! Journal entry types and CBOR payload encoding.

use crate::error::{StoreError, StoreResult};
use plansync_model::{Entity, EntityType};
use plansync_protocol::PendingOperation;
use serde::{Deserialize, Serialize};

/// Kind byte of a journal frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EntryKind {
    /// Insert or replace an entity row.
    PutEntity = 1,
    /// Remove an entity row.
    DeleteEntity = 2,
    /// Insert or replace a ledger record.
    UpsertPending = 3,
    /// Remove a ledger record.
    ClearPending = 4,
}

impl EntryKind {
    /// Converts a byte to an entry kind.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::PutEntity),
            2 => Some(Self::DeleteEntity),
            3 => Some(Self::UpsertPending),
            4 => Some(Self::ClearPending),
            _ => None,
        }
    }

    /// Converts the kind to a byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// One journaled mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JournalEntry {
    /// Insert or replace an entity row.
    PutEntity(Entity),
    /// Remove an entity row.
    DeleteEntity {
        /// Table.
        entity_type: EntityType,
        /// Row id.
        id: String,
    },
    /// Insert or replace a ledger record.
    UpsertPending(PendingOperation),
    /// Remove a ledger record.
    ClearPending {
        /// Record type.
        entity_type: EntityType,
        /// Record id.
        id: String,
    },
}

impl JournalEntry {
    /// Returns the frame kind for this entry.
    #[must_use]
    pub fn kind(&self) -> EntryKind {
        match self {
            Self::PutEntity(_) => EntryKind::PutEntity,
            Self::DeleteEntity { .. } => EntryKind::DeleteEntity,
            Self::UpsertPending(_) => EntryKind::UpsertPending,
            Self::ClearPending { .. } => EntryKind::ClearPending,
        }
    }

    /// Encodes the entry payload as CBOR.
    pub fn encode_payload(&self) -> StoreResult<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).map_err(|e| StoreError::codec(e.to_string()))?;
        Ok(buf)
    }

    /// Decodes a payload and checks it against the frame's kind byte.
    pub fn decode_payload(kind: u8, payload: &[u8]) -> StoreResult<Self> {
        let expected = EntryKind::from_byte(kind)
            .ok_or_else(|| StoreError::corrupted(format!("unknown entry kind {kind}")))?;
        let entry: JournalEntry =
            ciborium::from_reader(payload).map_err(|e| StoreError::codec(e.to_string()))?;
        if entry.kind() != expected {
            return Err(StoreError::corrupted(format!(
                "entry kind mismatch: frame says {expected:?}, payload is {:?}",
                entry.kind()
            )));
        }
        Ok(entry)
    }
}
