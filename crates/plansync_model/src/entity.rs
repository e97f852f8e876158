//! Tagged union over all record types.

use crate::entity_type::EntityType;
use crate::records::{
    Category, DayActivity, Goal, Sprint, Task, TaskGoalLink, User, WellnessCheckIn,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Any domain record.
///
/// Stores, ledgers and the sync engine handle records through this type so
/// that one table layer serves every entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    /// A user.
    User(User),
    /// A category.
    Category(Category),
    /// A sprint.
    Sprint(Sprint),
    /// A goal.
    Goal(Goal),
    /// A task.
    Task(Task),
    /// A day activity.
    DayActivity(DayActivity),
    /// A wellness check-in.
    WellnessCheckIn(WellnessCheckIn),
    /// A task/goal link.
    TaskGoalLink(TaskGoalLink),
}

macro_rules! each_record {
    ($self:expr, $rec:ident => $body:expr) => {
        match $self {
            Entity::User($rec) => $body,
            Entity::Category($rec) => $body,
            Entity::Sprint($rec) => $body,
            Entity::Goal($rec) => $body,
            Entity::Task($rec) => $body,
            Entity::DayActivity($rec) => $body,
            Entity::WellnessCheckIn($rec) => $body,
            Entity::TaskGoalLink($rec) => $body,
        }
    };
}

impl Entity {
    /// Record id.
    #[must_use]
    pub fn id(&self) -> &str {
        each_record!(self, r => &r.id)
    }

    /// Entity type of the record.
    #[must_use]
    pub fn entity_type(&self) -> EntityType {
        match self {
            Entity::User(_) => EntityType::User,
            Entity::Category(_) => EntityType::Category,
            Entity::Sprint(_) => EntityType::Sprint,
            Entity::Goal(_) => EntityType::Goal,
            Entity::Task(_) => EntityType::Task,
            Entity::DayActivity(_) => EntityType::DayActivity,
            Entity::WellnessCheckIn(_) => EntityType::WellnessCheckIn,
            Entity::TaskGoalLink(_) => EntityType::TaskGoalLink,
        }
    }

    /// Owning user. For a [`User`] record this is its own id.
    #[must_use]
    pub fn user_id(&self) -> &str {
        match self {
            Entity::User(u) => &u.id,
            Entity::Category(r) => &r.user_id,
            Entity::Sprint(r) => &r.user_id,
            Entity::Goal(r) => &r.user_id,
            Entity::Task(r) => &r.user_id,
            Entity::DayActivity(r) => &r.user_id,
            Entity::WellnessCheckIn(r) => &r.user_id,
            Entity::TaskGoalLink(r) => &r.user_id,
        }
    }

    /// Last-modified time.
    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        each_record!(self, r => r.updated_at)
    }

    /// Overwrites the last-modified time.
    pub fn set_updated_at(&mut self, at: DateTime<Utc>) {
        each_record!(self, r => r.updated_at = at)
    }

    /// Stamps a local modification at `now`.
    ///
    /// The stamp never moves backwards: if `now` is not after the current
    /// value, the record is stamped one millisecond past it instead.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        let current = self.updated_at();
        let stamp = if now > current {
            now
        } else {
            current + Duration::milliseconds(1)
        };
        self.set_updated_at(stamp);
    }

    /// Parent records this record references, as `(type, id)` pairs.
    #[must_use]
    pub fn references(&self) -> Vec<(EntityType, &str)> {
        let mut refs = Vec::new();
        match self {
            Entity::User(_) | Entity::Category(_) | Entity::Sprint(_) => {}
            Entity::Goal(g) => {
                if let Some(c) = &g.category_id {
                    refs.push((EntityType::Category, c.as_str()));
                }
            }
            Entity::Task(t) => {
                if let Some(s) = &t.sprint_id {
                    refs.push((EntityType::Sprint, s.as_str()));
                }
                if let Some(c) = &t.category_id {
                    refs.push((EntityType::Category, c.as_str()));
                }
            }
            Entity::DayActivity(a) => {
                if let Some(t) = &a.task_id {
                    refs.push((EntityType::Task, t.as_str()));
                }
            }
            Entity::WellnessCheckIn(_) => {}
            Entity::TaskGoalLink(l) => {
                refs.push((EntityType::Task, l.task_id.as_str()));
                refs.push((EntityType::Goal, l.goal_id.as_str()));
            }
        }
        if !matches!(self, Entity::User(_)) {
            refs.insert(0, (EntityType::User, self.user_id()));
        }
        refs
    }
}

macro_rules! impl_from_record {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for Entity {
                fn from(record: $variant) -> Self {
                    Entity::$variant(record)
                }
            }
        )*
    };
}

impl_from_record!(
    User,
    Category,
    Sprint,
    Goal,
    Task,
    DayActivity,
    WellnessCheckIn,
    TaskGoalLink,
);
