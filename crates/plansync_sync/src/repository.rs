//! Local mutation API used by the UI layer.
//!
//! Every mutation lands in the local store first and then schedules the
//! matching ledger record; the network is never on the write path.

use crate::error::SyncError;
use crate::ledger::PendingLedger;
use chrono::Utc;
use plansync_model::{Entity, EntityType};
use plansync_protocol::OperationKind;
use plansync_store::LocalStore;
use std::sync::Arc;
use thiserror::Error;

/// Result type for repository calls.
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Errors surfaced to UI callers.
///
/// The detail is kept for logs; [`user_message`](Self::user_message) is the
/// only text meant for display.
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Reading local data failed.
    #[error("failed to load {entity_type}: {source}")]
    Load {
        /// Table being read.
        entity_type: EntityType,
        /// Underlying error.
        #[source]
        source: SyncError,
    },

    /// Writing local data failed.
    #[error("failed to save {entity_type} {id}: {source}")]
    Save {
        /// Table being written.
        entity_type: EntityType,
        /// Record id.
        id: String,
        /// Underlying error.
        #[source]
        source: SyncError,
    },
}

impl RepositoryError {
    /// Generic text for display.
    pub fn user_message(&self) -> &'static str {
        match self {
            RepositoryError::Load { .. } => "Error loading data",
            RepositoryError::Save { .. } => "Error saving data",
        }
    }

    fn save(entity_type: EntityType, id: &str, source: impl Into<SyncError>) -> Self {
        RepositoryError::Save {
            entity_type,
            id: id.to_string(),
            source: source.into(),
        }
    }
}

/// Writes entities locally and schedules their sync.
#[derive(Debug, Clone)]
pub struct EntityRepository {
    store: Arc<LocalStore>,
    ledger: Arc<PendingLedger>,
}

impl EntityRepository {
    /// Creates a repository.
    pub fn new(store: Arc<LocalStore>, ledger: Arc<PendingLedger>) -> Self {
        Self { store, ledger }
    }

    /// Stores a new entity and schedules a `Create`.
    pub fn create(&self, mut entity: Entity) -> RepositoryResult<Entity> {
        let entity_type = entity.entity_type();
        entity.touch(Utc::now());
        self.store
            .put(entity.clone())
            .map_err(|e| RepositoryError::save(entity_type, entity.id(), e))?;
        self.ledger
            .schedule_sync_operation(entity.id(), entity_type, OperationKind::Create)
            .map_err(|e| RepositoryError::save(entity_type, entity.id(), e))?;
        Ok(entity)
    }

    /// Replaces an existing entity and schedules an `Update`.
    pub fn update(&self, mut entity: Entity) -> RepositoryResult<Entity> {
        let entity_type = entity.entity_type();
        if !self.store.contains(entity_type, entity.id()) {
            return Err(RepositoryError::save(
                entity_type,
                entity.id(),
                SyncError::not_found(entity_type.table_name(), entity.id()),
            ));
        }
        entity.touch(Utc::now());
        self.store
            .put(entity.clone())
            .map_err(|e| RepositoryError::save(entity_type, entity.id(), e))?;
        self.ledger
            .schedule_sync_operation(entity.id(), entity_type, OperationKind::Update)
            .map_err(|e| RepositoryError::save(entity_type, entity.id(), e))?;
        Ok(entity)
    }

    /// Deletes an entity and schedules a `Delete`. Returns false if there was
    /// nothing to delete.
    pub fn delete(&self, entity_type: EntityType, id: &str) -> RepositoryResult<bool> {
        let removed = self
            .store
            .delete(entity_type, id)
            .map_err(|e| RepositoryError::save(entity_type, id, e))?;
        if removed.is_none() {
            return Ok(false);
        }
        self.ledger
            .schedule_sync_operation(id, entity_type, OperationKind::Delete)
            .map_err(|e| RepositoryError::save(entity_type, id, e))?;
        Ok(true)
    }

    /// Loads one entity.
    pub fn get(&self, entity_type: EntityType, id: &str) -> RepositoryResult<Entity> {
        self.store
            .get(entity_type, id)
            .ok_or_else(|| RepositoryError::Load {
                entity_type,
                source: SyncError::not_found(entity_type.table_name(), id),
            })
    }

    /// Loads one entity if it exists.
    pub fn find(&self, entity_type: EntityType, id: &str) -> Option<Entity> {
        self.store.get(entity_type, id)
    }

    /// Every entity of a type.
    pub fn list(&self, entity_type: EntityType) -> Vec<Entity> {
        self.store.list(entity_type)
    }

    /// Entities of a type owned by `user_id`.
    pub fn list_for_user(&self, entity_type: EntityType, user_id: &str) -> Vec<Entity> {
        self.store.list_for_user(entity_type, user_id)
    }
}
