//! Status, priority and mood enums.

use crate::error::ModelError;
use serde::{Deserialize, Serialize};

/// Lifecycle of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not started.
    #[default]
    Todo,
    /// Being worked on.
    InProgress,
    /// Finished.
    Done,
    /// Dropped.
    Cancelled,
}

impl TaskStatus {
    /// Returns true if the task no longer needs attention.
    #[must_use]
    pub fn is_closed(self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Cancelled)
    }
}

/// Task priority.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Whenever.
    Low,
    /// Normal.
    #[default]
    Medium,
    /// Soon.
    High,
    /// Now.
    Urgent,
}

/// Lifecycle of a sprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SprintStatus {
    /// Scheduled, not started.
    #[default]
    Planned,
    /// Running.
    Active,
    /// Closed.
    Completed,
}

/// Lifecycle of a goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    /// Being pursued.
    #[default]
    Active,
    /// Reached.
    Achieved,
    /// Given up.
    Abandoned,
}

/// Self-reported mood on a 1..=5 scale.
///
/// Serialized as its numeric score to match the backend column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Mood {
    /// 1
    Awful,
    /// 2
    Low,
    /// 3
    #[default]
    Okay,
    /// 4
    Good,
    /// 5
    Great,
}

impl Mood {
    /// Numeric score (1..=5).
    #[must_use]
    pub const fn score(self) -> u8 {
        match self {
            Mood::Awful => 1,
            Mood::Low => 2,
            Mood::Okay => 3,
            Mood::Good => 4,
            Mood::Great => 5,
        }
    }
}

impl TryFrom<u8> for Mood {
    type Error = ModelError;

    fn try_from(score: u8) -> Result<Self, Self::Error> {
        match score {
            1 => Ok(Mood::Awful),
            2 => Ok(Mood::Low),
            3 => Ok(Mood::Okay),
            4 => Ok(Mood::Good),
            5 => Ok(Mood::Great),
            other => Err(ModelError::invalid_code("mood", i64::from(other))),
        }
    }
}

impl From<Mood> for u8 {
    fn from(mood: Mood) -> Self {
        mood.score()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mood_scores() {
        for score in 1..=5u8 {
            let mood = Mood::try_from(score).unwrap();
            assert_eq!(mood.score(), score);
        }
        assert!(Mood::try_from(0).is_err());
        assert!(Mood::try_from(6).is_err());
    }

    #[test]
    fn mood_serializes_as_number() {
        let json = serde_json::to_string(&Mood::Good).unwrap();
        assert_eq!(json, "4");
        let back: Mood = serde_json::from_str("2").unwrap();
        assert_eq!(back, Mood::Low);
        assert!(serde_json::from_str::<Mood>("9").is_err());
    }

    #[test]
    fn status_wire_names() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
        assert!(TaskStatus::Done.is_closed());
        assert!(!TaskStatus::Todo.is_closed());
        assert!(Priority::Urgent > Priority::Low);
    }
}
