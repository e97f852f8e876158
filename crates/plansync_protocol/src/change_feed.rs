//! Remote change events and subscription filters.

use crate::error::{ProtocolError, ProtocolResult};
use crate::row::{decode_entity, text_column};
use chrono::{DateTime, Utc};
use plansync_model::{Entity, EntityType};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Type of remote change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    /// Row was inserted.
    Insert,
    /// Row was updated.
    Update,
    /// Row was deleted.
    Delete,
}

/// A single change event from the backend's realtime feed.
///
/// Events are emitted only after the backend has committed the write. Insert
/// and update events carry the new row; delete events carry the old one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteChange {
    /// Database schema.
    pub schema: String,
    /// Table name.
    pub table: String,
    /// Type of change.
    pub kind: ChangeKind,
    /// Row after the change (insert/update).
    pub new_record: Option<Value>,
    /// Row before the change (update/delete). May hold only the key columns.
    pub old_record: Option<Value>,
    /// When the backend committed the change.
    pub commit_timestamp: DateTime<Utc>,
}

impl RemoteChange {
    /// Creates an insert event.
    pub fn insert(schema: impl Into<String>, table: impl Into<String>, row: Value) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            kind: ChangeKind::Insert,
            new_record: Some(row),
            old_record: None,
            commit_timestamp: Utc::now(),
        }
    }

    /// Creates an update event.
    pub fn update(
        schema: impl Into<String>,
        table: impl Into<String>,
        row: Value,
        old: Option<Value>,
    ) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            kind: ChangeKind::Update,
            new_record: Some(row),
            old_record: old,
            commit_timestamp: Utc::now(),
        }
    }

    /// Creates a delete event.
    pub fn delete(schema: impl Into<String>, table: impl Into<String>, old: Value) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            kind: ChangeKind::Delete,
            new_record: None,
            old_record: Some(old),
            commit_timestamp: Utc::now(),
        }
    }

    /// Entity type of the event's table.
    pub fn entity_type(&self) -> ProtocolResult<EntityType> {
        Ok(EntityType::parse_table(&self.table)?)
    }

    /// Id of the changed row, taken from the new record or else the old one.
    pub fn record_id(&self) -> ProtocolResult<&str> {
        self.new_record
            .as_ref()
            .or(self.old_record.as_ref())
            .ok_or_else(|| self.missing_snapshot())
            .and_then(|row| text_column(row, "id"))
    }

    /// The row snapshot carried by an insert or update.
    pub fn snapshot(&self) -> ProtocolResult<&Value> {
        self.new_record
            .as_ref()
            .ok_or_else(|| self.missing_snapshot())
    }

    /// Owner of the changed row, if the snapshot carries one.
    #[must_use]
    pub fn owner(&self) -> Option<&str> {
        let row = self.new_record.as_ref().or(self.old_record.as_ref())?;
        if self.table == EntityType::User.table_name() {
            return row.get("id").and_then(Value::as_str);
        }
        row.get("user_id").and_then(Value::as_str)
    }

    /// Maps the insert/update snapshot to a domain entity.
    pub fn into_entity(self) -> ProtocolResult<Entity> {
        let entity_type = self.entity_type()?;
        let table = self.table;
        let row = self
            .new_record
            .ok_or(ProtocolError::MissingSnapshot { table })?;
        decode_entity(entity_type, row)
    }

    fn missing_snapshot(&self) -> ProtocolError {
        ProtocolError::MissingSnapshot {
            table: self.table.clone(),
        }
    }
}

/// Subscription filter for the realtime feed.
///
/// Matches on schema and table, and optionally on the owning user so that a
/// client only sees its own rows.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChangeFilter {
    /// Schema to watch.
    pub schema: String,
    /// Table to watch.
    pub table: String,
    /// Only rows owned by this user.
    pub user_id: Option<String>,
}

impl ChangeFilter {
    /// Creates a filter for one table.
    pub fn table(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            user_id: None,
        }
    }

    /// Restricts the filter to one owner.
    #[must_use]
    pub fn for_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Returns true if `change` passes the filter.
    ///
    /// A change without a readable owner never passes a user filter.
    #[must_use]
    pub fn matches(&self, change: &RemoteChange) -> bool {
        if change.schema != self.schema || change.table != self.table {
            return false;
        }
        match &self.user_id {
            Some(user) => change.owner() == Some(user.as_str()),
            None => true,
        }
    }
}
