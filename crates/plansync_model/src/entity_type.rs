//! Entity types, remote table names and sync ordering.

use crate::error::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of a domain record.
///
/// Each type maps to one remote table and one local table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// Account owner.
    User,
    /// Task/goal category.
    Category,
    /// Time-boxed sprint.
    Sprint,
    /// Long-running goal.
    Goal,
    /// Single task.
    Task,
    /// Planned block in a day.
    DayActivity,
    /// Daily wellness check-in.
    WellnessCheckIn,
    /// Task ↔ goal cross-reference.
    TaskGoalLink,
}

impl EntityType {
    /// All entity types in declaration order.
    pub const ALL: [EntityType; 8] = [
        EntityType::User,
        EntityType::Category,
        EntityType::Sprint,
        EntityType::Goal,
        EntityType::Task,
        EntityType::DayActivity,
        EntityType::WellnessCheckIn,
        EntityType::TaskGoalLink,
    ];

    /// Returns the remote (and local) table name.
    #[must_use]
    pub const fn table_name(self) -> &'static str {
        match self {
            EntityType::User => "users",
            EntityType::Category => "categories",
            EntityType::Sprint => "sprints",
            EntityType::Goal => "goals",
            EntityType::Task => "tasks",
            EntityType::DayActivity => "day_activities",
            EntityType::WellnessCheckIn => "wellness_checkins",
            EntityType::TaskGoalLink => "task_goal_links",
        }
    }

    /// Looks up an entity type by table name.
    #[must_use]
    pub fn from_table(table: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.table_name() == table)
    }

    /// Like [`from_table`](Self::from_table) but returns an error for unknown tables.
    pub fn parse_table(table: &str) -> ModelResult<Self> {
        Self::from_table(table).ok_or_else(|| ModelError::UnknownTable(table.to_string()))
    }

    /// Dependency tier used for sync ordering. Lower tiers sync first.
    #[must_use]
    pub const fn sync_tier(self) -> u8 {
        match self {
            EntityType::User => 0,
            EntityType::Category | EntityType::Sprint | EntityType::Goal => 1,
            EntityType::Task | EntityType::DayActivity | EntityType::WellnessCheckIn => 2,
            EntityType::TaskGoalLink => 3,
        }
    }

    /// Returns every entity type ordered parents-before-children.
    ///
    /// Types sharing a tier keep their declaration order, so the result is stable.
    #[must_use]
    pub fn sync_order() -> Vec<EntityType> {
        let mut order = Self::ALL.to_vec();
        order.sort_by_key(|t| t.sync_tier());
        order
    }

    /// Converts to a numeric code.
    #[must_use]
    pub const fn to_code(self) -> u8 {
        match self {
            EntityType::User => 1,
            EntityType::Category => 2,
            EntityType::Sprint => 3,
            EntityType::Goal => 4,
            EntityType::Task => 5,
            EntityType::DayActivity => 6,
            EntityType::WellnessCheckIn => 7,
            EntityType::TaskGoalLink => 8,
        }
    }

    /// Converts from a numeric code.
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.to_code() == code)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}
