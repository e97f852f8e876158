//! # PlanSync Model
//!
//! Domain records for PlanSync.
//!
//! This crate provides:
//! - Record types (tasks, sprints, goals, day activities, check-ins, ...)
//! - [`EntityType`] with remote table names and sync tiers
//! - [`Entity`], a tagged union over every record type
//! - Status, priority and mood enums
//!
//! This is a pure data crate with no I/O operations.
//!
//! ## Sync Tiers
//!
//! Entity types are synced parents-first:
//!
//! ```text
//! tier 0: users
//! tier 1: categories, sprints, goals
//! tier 2: tasks, day_activities, wellness_checkins
//! tier 3: task_goal_links
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod entity;
mod entity_type;
mod error;
mod id;
mod records;
mod status;

pub use entity::Entity;
pub use entity_type::EntityType;
pub use error::{ModelError, ModelResult};
pub use id::{is_valid_id, new_id};
pub use records::{
    Category, DayActivity, Goal, Sprint, Task, TaskGoalLink, User, WellnessCheckIn,
};
pub use status::{GoalStatus, Mood, Priority, SprintStatus, TaskStatus};
