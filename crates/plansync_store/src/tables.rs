//! In-memory tables rebuilt from the journal.

use crate::journal::JournalEntry;
use plansync_model::{Entity, EntityType};
use plansync_protocol::{PendingOperation, SyncStatus};
use std::collections::BTreeMap;

type Key = (EntityType, String);

/// Live state: one table per entity type plus the ledger table.
#[derive(Debug, Default)]
pub(crate) struct Tables {
    rows: BTreeMap<EntityType, BTreeMap<String, Entity>>,
    ledger: BTreeMap<Key, PendingOperation>,
}

impl Tables {
    /// Applies one journal entry.
    pub(crate) fn apply(&mut self, entry: JournalEntry) {
        match entry {
            JournalEntry::PutEntity(entity) => {
                self.rows
                    .entry(entity.entity_type())
                    .or_default()
                    .insert(entity.id().to_string(), entity);
            }
            JournalEntry::DeleteEntity { entity_type, id } => {
                if let Some(table) = self.rows.get_mut(&entity_type) {
                    table.remove(&id);
                }
            }
            JournalEntry::UpsertPending(op) => {
                self.ledger
                    .insert((op.entity_type, op.entity_id.clone()), op);
            }
            JournalEntry::ClearPending { entity_type, id } => {
                self.ledger.remove(&(entity_type, id));
            }
        }
    }

    pub(crate) fn get(&self, entity_type: EntityType, id: &str) -> Option<&Entity> {
        self.rows.get(&entity_type)?.get(id)
    }

    pub(crate) fn contains(&self, entity_type: EntityType, id: &str) -> bool {
        self.get(entity_type, id).is_some()
    }

    pub(crate) fn list(&self, entity_type: EntityType) -> impl Iterator<Item = &Entity> {
        self.rows.get(&entity_type).into_iter().flat_map(BTreeMap::values)
    }

    pub(crate) fn count(&self, entity_type: EntityType) -> usize {
        self.rows.get(&entity_type).map_or(0, BTreeMap::len)
    }

    pub(crate) fn pending(&self, entity_type: EntityType, id: &str) -> Option<&PendingOperation> {
        self.ledger.get(&(entity_type, id.to_string()))
    }

    pub(crate) fn ledger(&self) -> impl Iterator<Item = &PendingOperation> {
        self.ledger.values()
    }

    pub(crate) fn ledger_count(&self, status: SyncStatus) -> usize {
        self.ledger.values().filter(|op| op.status == status).count()
    }

    /// Entries that rebuild the current state from nothing.
    pub(crate) fn snapshot_entries(&self) -> Vec<JournalEntry> {
        let rows = self
            .rows
            .values()
            .flat_map(BTreeMap::values)
            .cloned()
            .map(JournalEntry::PutEntity);
        let ledger = self.ledger.values().cloned().map(JournalEntry::UpsertPending);
        rows.chain(ledger).collect()
    }
}
