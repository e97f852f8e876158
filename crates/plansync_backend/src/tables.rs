//! Table storage for the reference backend.

use crate::error::{BackendError, BackendResult};
use plansync_model::EntityType;
use plansync_protocol::RemoteRow;
use serde_json::Value;
use std::collections::BTreeMap;

/// JSON rows keyed by table, then by id.
#[derive(Debug, Default)]
pub(crate) struct Tables {
    rows: BTreeMap<&'static str, BTreeMap<String, Value>>,
}

impl Tables {
    fn table_mut(&mut self, table: &str) -> BackendResult<&mut BTreeMap<String, Value>> {
        let entity_type = EntityType::from_table(table)
            .ok_or_else(|| BackendError::UnknownTable(table.to_string()))?;
        Ok(self.rows.entry(entity_type.table_name()).or_default())
    }

    /// Inserts a new row.
    pub fn insert(&mut self, table: &str, id: &str, value: Value) -> BackendResult<()> {
        let rows = self.table_mut(table)?;
        if rows.contains_key(id) {
            return Err(BackendError::already_exists(table, id));
        }
        rows.insert(id.to_string(), value);
        Ok(())
    }

    /// Replaces an existing row, returning the previous value.
    pub fn update(&mut self, table: &str, id: &str, value: Value) -> BackendResult<Value> {
        let rows = self.table_mut(table)?;
        match rows.get_mut(id) {
            Some(existing) => Ok(std::mem::replace(existing, value)),
            None => Err(BackendError::not_found(table, id)),
        }
    }

    /// Inserts or replaces a row. Returns the previous value, if any.
    pub fn upsert(&mut self, table: &str, id: &str, value: Value) -> BackendResult<Option<Value>> {
        Ok(self.table_mut(table)?.insert(id.to_string(), value))
    }

    /// Removes a row.
    pub fn delete(&mut self, table: &str, id: &str) -> BackendResult<Value> {
        self.table_mut(table)?
            .remove(id)
            .ok_or_else(|| BackendError::not_found(table, id))
    }

    /// Looks up a row.
    pub fn get(&self, table: &str, id: &str) -> Option<RemoteRow> {
        self.rows
            .get(table)
            .and_then(|rows| rows.get(id))
            .map(|value| RemoteRow::new(table, value.clone()))
    }

    /// Every row of a table.
    pub fn list(&self, table: &str) -> Vec<RemoteRow> {
        self.rows
            .get(table)
            .map(|rows| {
                rows.values()
                    .map(|value| RemoteRow::new(table, value.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Row count of a table.
    pub fn count(&self, table: &str) -> usize {
        self.rows.get(table).map_or(0, BTreeMap::len)
    }
}
