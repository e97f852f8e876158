//! Remote DTO rows and the mapping to domain entities.

use crate::error::{ProtocolError, ProtocolResult};
use chrono::{DateTime, Utc};
use plansync_model::{
    Category, DayActivity, Entity, EntityType, Goal, Sprint, Task, TaskGoalLink, User,
    WellnessCheckIn,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A row as the backend stores it: a table name plus a flat JSON object with
/// snake_case columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRow {
    /// Backend table name.
    pub table: String,
    /// Column values.
    pub value: Value,
}

impl RemoteRow {
    /// Creates a row from raw parts.
    pub fn new(table: impl Into<String>, value: Value) -> Self {
        Self {
            table: table.into(),
            value,
        }
    }

    /// Maps a domain entity to its DTO row.
    pub fn from_entity(entity: &Entity) -> ProtocolResult<Self> {
        let value = match entity {
            Entity::User(r) => serde_json::to_value(r)?,
            Entity::Category(r) => serde_json::to_value(r)?,
            Entity::Sprint(r) => serde_json::to_value(r)?,
            Entity::Goal(r) => serde_json::to_value(r)?,
            Entity::Task(r) => serde_json::to_value(r)?,
            Entity::DayActivity(r) => serde_json::to_value(r)?,
            Entity::WellnessCheckIn(r) => serde_json::to_value(r)?,
            Entity::TaskGoalLink(r) => serde_json::to_value(r)?,
        };
        Ok(Self::new(entity.entity_type().table_name(), value))
    }

    /// Maps the row back to a domain entity.
    pub fn into_entity(self) -> ProtocolResult<Entity> {
        let entity_type = EntityType::parse_table(&self.table)?;
        decode_entity(entity_type, self.value)
    }

    /// Entity type of the row's table.
    pub fn entity_type(&self) -> ProtocolResult<EntityType> {
        Ok(EntityType::parse_table(&self.table)?)
    }

    /// Value of the `id` column.
    pub fn id(&self) -> ProtocolResult<&str> {
        text_column(&self.value, "id")
    }

    /// Value of the `user_id` column. Rows of the `users` table own themselves.
    pub fn user_id(&self) -> ProtocolResult<&str> {
        if self.table == EntityType::User.table_name() {
            return self.id();
        }
        text_column(&self.value, "user_id")
    }

    /// Value of the `updated_at` column.
    pub fn updated_at(&self) -> ProtocolResult<DateTime<Utc>> {
        timestamp_column(&self.value, "updated_at")
    }
}

/// Decodes a snapshot of the given type into an [`Entity`].
pub(crate) fn decode_entity(entity_type: EntityType, value: Value) -> ProtocolResult<Entity> {
    fn decode<T: DeserializeOwned + Into<Entity>>(value: Value) -> ProtocolResult<Entity> {
        Ok(serde_json::from_value::<T>(value)?.into())
    }

    match entity_type {
        EntityType::User => decode::<User>(value),
        EntityType::Category => decode::<Category>(value),
        EntityType::Sprint => decode::<Sprint>(value),
        EntityType::Goal => decode::<Goal>(value),
        EntityType::Task => decode::<Task>(value),
        EntityType::DayActivity => decode::<DayActivity>(value),
        EntityType::WellnessCheckIn => decode::<WellnessCheckIn>(value),
        EntityType::TaskGoalLink => decode::<TaskGoalLink>(value),
    }
}

pub(crate) fn text_column<'a>(value: &'a Value, column: &'static str) -> ProtocolResult<&'a str> {
    value
        .get(column)
        .and_then(Value::as_str)
        .ok_or(ProtocolError::MissingColumn(column))
}

pub(crate) fn timestamp_column(value: &Value, column: &'static str) -> ProtocolResult<DateTime<Utc>> {
    let raw = text_column(value, column)?;
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|_| ProtocolError::InvalidTimestamp(raw.to_string()))
}
