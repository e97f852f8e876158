//! Record types.
//!
//! Field names double as the backend's column names, so the serde form of a
//! record is also its remote row.

use crate::error::{ModelError, ModelResult};
use crate::id::new_id;
use crate::status::{GoalStatus, Mood, Priority, SprintStatus, TaskStatus};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Account owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Record id (also the auth user id).
    pub id: String,
    /// Login email.
    pub email: String,
    /// Name shown in the app.
    pub display_name: String,
    /// IANA timezone name used for day planning.
    pub timezone: String,
    /// Last-modified time.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Creates a user with the given auth id.
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        let email = email.into();
        let display_name = email.split('@').next().unwrap_or_default().to_string();
        Self {
            id: id.into(),
            email,
            display_name,
            timezone: "UTC".to_string(),
            updated_at: Utc::now(),
        }
    }
}

/// Task/goal category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    /// Record id.
    pub id: String,
    /// Owner.
    pub user_id: String,
    /// Display name.
    pub name: String,
    /// Hex colour, e.g. `#4f46e5`.
    pub color: Option<String>,
    /// Last-modified time.
    pub updated_at: DateTime<Utc>,
}

impl Category {
    /// Creates a category.
    pub fn new(user_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            user_id: user_id.into(),
            name: name.into(),
            color: None,
            updated_at: Utc::now(),
        }
    }
}

/// Time-boxed sprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sprint {
    /// Record id.
    pub id: String,
    /// Owner.
    pub user_id: String,
    /// Display name.
    pub name: String,
    /// First day.
    pub start_date: NaiveDate,
    /// Last day (inclusive).
    pub end_date: NaiveDate,
    /// Lifecycle.
    pub status: SprintStatus,
    /// Last-modified time.
    pub updated_at: DateTime<Utc>,
}

impl Sprint {
    /// Creates a planned sprint.
    ///
    /// Fails if `end_date` is before `start_date`.
    pub fn new(
        user_id: impl Into<String>,
        name: impl Into<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> ModelResult<Self> {
        if end_date < start_date {
            return Err(ModelError::invalid_field(
                "end_date",
                format!("{end_date} is before start date {start_date}"),
            ));
        }
        Ok(Self {
            id: new_id(),
            user_id: user_id.into(),
            name: name.into(),
            start_date,
            end_date,
            status: SprintStatus::Planned,
            updated_at: Utc::now(),
        })
    }

    /// Returns true if `day` falls inside the sprint.
    #[must_use]
    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start_date <= day && day <= self.end_date
    }
}

/// Long-running goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    /// Record id.
    pub id: String,
    /// Owner.
    pub user_id: String,
    /// Short title.
    pub title: String,
    /// Longer description.
    pub description: Option<String>,
    /// Optional category.
    pub category_id: Option<String>,
    /// Target day.
    pub target_date: Option<NaiveDate>,
    /// Percent complete (0..=100).
    pub progress: u8,
    /// Lifecycle.
    pub status: GoalStatus,
    /// Last-modified time.
    pub updated_at: DateTime<Utc>,
}

impl Goal {
    /// Creates an active goal with no progress.
    pub fn new(user_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            user_id: user_id.into(),
            title: title.into(),
            description: None,
            category_id: None,
            target_date: None,
            progress: 0,
            status: GoalStatus::Active,
            updated_at: Utc::now(),
        }
    }

    /// Sets progress, marking the goal achieved at 100.
    pub fn set_progress(&mut self, progress: u8) -> ModelResult<()> {
        if progress > 100 {
            return Err(ModelError::invalid_field(
                "progress",
                format!("{progress} exceeds 100"),
            ));
        }
        self.progress = progress;
        if progress == 100 {
            self.status = GoalStatus::Achieved;
        }
        Ok(())
    }
}

/// A single task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Record id.
    pub id: String,
    /// Owner.
    pub user_id: String,
    /// Short title.
    pub title: String,
    /// Longer description.
    pub description: Option<String>,
    /// Lifecycle.
    pub status: TaskStatus,
    /// Priority.
    pub priority: Priority,
    /// Sprint the task is planned into.
    pub sprint_id: Option<String>,
    /// Optional category.
    pub category_id: Option<String>,
    /// Due day.
    pub due_date: Option<NaiveDate>,
    /// Estimated effort.
    pub estimate_minutes: Option<u32>,
    /// When the task was finished.
    pub completed_at: Option<DateTime<Utc>>,
    /// Last-modified time.
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Creates a todo task with medium priority.
    pub fn new(user_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            user_id: user_id.into(),
            title: title.into(),
            description: None,
            status: TaskStatus::Todo,
            priority: Priority::Medium,
            sprint_id: None,
            category_id: None,
            due_date: None,
            estimate_minutes: None,
            completed_at: None,
            updated_at: Utc::now(),
        }
    }

    /// Marks the task done at `now`.
    pub fn complete(&mut self, now: DateTime<Utc>) {
        self.status = TaskStatus::Done;
        self.completed_at = Some(now);
    }

    /// Returns true if the task is open and its due day has passed.
    #[must_use]
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        !self.status.is_closed() && self.due_date.is_some_and(|due| due < today)
    }
}

/// A planned block in a day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayActivity {
    /// Record id.
    pub id: String,
    /// Owner.
    pub user_id: String,
    /// The day this block belongs to.
    pub date: NaiveDate,
    /// What the block is for.
    pub title: String,
    /// Start, in minutes after midnight.
    pub start_minute: u16,
    /// Length in minutes.
    pub duration_minutes: u16,
    /// Task worked on during this block.
    pub task_id: Option<String>,
    /// Whether the block was done.
    pub completed: bool,
    /// Last-modified time.
    pub updated_at: DateTime<Utc>,
}

impl DayActivity {
    const MINUTES_PER_DAY: u16 = 24 * 60;

    /// Creates a block. The block must end by midnight.
    pub fn new(
        user_id: impl Into<String>,
        date: NaiveDate,
        title: impl Into<String>,
        start_minute: u16,
        duration_minutes: u16,
    ) -> ModelResult<Self> {
        if u32::from(start_minute) + u32::from(duration_minutes) > u32::from(Self::MINUTES_PER_DAY)
        {
            return Err(ModelError::invalid_field(
                "duration_minutes",
                "activity runs past midnight",
            ));
        }
        Ok(Self {
            id: new_id(),
            user_id: user_id.into(),
            date,
            title: title.into(),
            start_minute,
            duration_minutes,
            task_id: None,
            completed: false,
            updated_at: Utc::now(),
        })
    }

    /// End of the block, in minutes after midnight.
    #[must_use]
    pub fn end_minute(&self) -> u16 {
        self.start_minute.saturating_add(self.duration_minutes)
    }

    /// Returns true if two blocks on the same day overlap.
    #[must_use]
    pub fn overlaps(&self, other: &DayActivity) -> bool {
        self.date == other.date
            && self.start_minute < other.end_minute()
            && other.start_minute < self.end_minute()
    }
}

/// Daily wellness check-in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WellnessCheckIn {
    /// Record id.
    pub id: String,
    /// Owner.
    pub user_id: String,
    /// Day of the check-in.
    pub date: NaiveDate,
    /// Mood score.
    pub mood: Mood,
    /// Energy, 1..=5.
    pub energy: u8,
    /// Hours slept the night before.
    pub sleep_hours: Option<f32>,
    /// Free text.
    pub notes: Option<String>,
    /// Last-modified time.
    pub updated_at: DateTime<Utc>,
}

impl WellnessCheckIn {
    /// Creates a check-in.
    pub fn new(
        user_id: impl Into<String>,
        date: NaiveDate,
        mood: Mood,
        energy: u8,
    ) -> ModelResult<Self> {
        if !(1..=5).contains(&energy) {
            return Err(ModelError::invalid_field(
                "energy",
                format!("{energy} is outside 1..=5"),
            ));
        }
        Ok(Self {
            id: new_id(),
            user_id: user_id.into(),
            date,
            mood,
            energy,
            sleep_hours: None,
            notes: None,
            updated_at: Utc::now(),
        })
    }
}

/// Cross-reference between a task and a goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskGoalLink {
    /// Record id.
    pub id: String,
    /// Owner.
    pub user_id: String,
    /// Linked task.
    pub task_id: String,
    /// Linked goal.
    pub goal_id: String,
    /// Last-modified time.
    pub updated_at: DateTime<Utc>,
}

impl TaskGoalLink {
    /// Links a task to a goal.
    pub fn new(
        user_id: impl Into<String>,
        task_id: impl Into<String>,
        goal_id: impl Into<String>,
    ) -> Self {
        Self {
            id: new_id(),
            user_id: user_id.into(),
            task_id: task_id.into(),
            goal_id: goal_id.into(),
            updated_at: Utc::now(),
        }
    }
}
