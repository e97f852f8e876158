//! Store fixtures and sample records.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use plansync_model::{
    Category, DayActivity, Entity, Goal, Mood, Sprint, Task, TaskGoalLink, User, WellnessCheckIn,
};
use plansync_store::{LocalStore, StoreConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// A local store with automatic cleanup.
pub struct TestStore {
    /// The store.
    pub store: Arc<LocalStore>,
    /// The temporary directory (kept alive to prevent cleanup).
    temp_dir: Option<TempDir>,
}

impl TestStore {
    /// Creates an in-memory store.
    pub fn memory() -> Self {
        Self {
            store: Arc::new(LocalStore::open_in_memory()),
            temp_dir: None,
        }
    }

    /// Creates a store in a fresh temporary directory.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = LocalStore::open(temp_dir.path(), StoreConfig::default())
            .expect("Failed to open file store");
        Self {
            store: Arc::new(store),
            temp_dir: Some(temp_dir),
        }
    }

    /// Store directory, if file-backed.
    pub fn path(&self) -> Option<&Path> {
        self.temp_dir.as_ref().map(TempDir::path)
    }

    /// Closes the store and reopens it from the same directory.
    ///
    /// Panics for in-memory stores or if the store is still shared.
    pub fn reopen(self) -> Self {
        let temp_dir = self.temp_dir.expect("Only file stores can be reopened");
        let path: PathBuf = temp_dir.path().to_path_buf();
        drop(
            Arc::try_unwrap(self.store)
                .expect("Store is still shared; drop other handles before reopening"),
        );
        let store =
            LocalStore::open(&path, StoreConfig::default()).expect("Failed to reopen file store");
        Self {
            store: Arc::new(store),
            temp_dir: Some(temp_dir),
        }
    }
}

impl std::ops::Deref for TestStore {
    type Target = LocalStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// A fixed instant for deterministic tests.
pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 30, 0)
        .single()
        .expect("valid timestamp")
}

/// A fixed day for deterministic tests.
pub fn fixed_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 2).expect("valid date")
}

/// A user record.
pub fn sample_user(user_id: &str) -> Entity {
    User::new(user_id, format!("{user_id}@example.com")).into()
}

/// A category.
pub fn sample_category(user_id: &str) -> Entity {
    Category::new(user_id, "Deep work").into()
}

/// A two-week sprint starting on [`fixed_day`].
pub fn sample_sprint(user_id: &str) -> Entity {
    let start = fixed_day();
    let end = start + chrono::Duration::days(13);
    Sprint::new(user_id, "Sprint 12", start, end)
        .expect("valid sprint")
        .into()
}

/// A goal.
pub fn sample_goal(user_id: &str) -> Entity {
    Goal::new(user_id, "Ship the beta").into()
}

/// A task.
pub fn sample_task(user_id: &str) -> Entity {
    Task::new(user_id, "Write release notes").into()
}

/// A one-hour block starting at 09:00 on [`fixed_day`].
pub fn sample_day_activity(user_id: &str) -> Entity {
    DayActivity::new(user_id, fixed_day(), "Focus block", 9 * 60, 60)
        .expect("valid activity")
        .into()
}

/// A check-in on [`fixed_day`].
pub fn sample_check_in(user_id: &str) -> Entity {
    WellnessCheckIn::new(user_id, fixed_day(), Mood::Good, 4)
        .expect("valid check-in")
        .into()
}

/// One record of every type, with foreign keys pointing at each other.
///
/// Returned in sync order: parents before children.
pub fn sample_graph(user_id: &str) -> Vec<Entity> {
    let user = User::new(user_id, format!("{user_id}@example.com"));
    let category = Category::new(user_id, "Health");
    let start = fixed_day();
    let sprint = Sprint::new(user_id, "Sprint 1", start, start + chrono::Duration::days(6))
        .expect("valid sprint");
    let mut goal = Goal::new(user_id, "Run a 10k");
    goal.category_id = Some(category.id.clone());

    let mut task = Task::new(user_id, "Book physio");
    task.sprint_id = Some(sprint.id.clone());
    task.category_id = Some(category.id.clone());
    let mut activity =
        DayActivity::new(user_id, start, "Run", 7 * 60, 45).expect("valid activity");
    activity.task_id = Some(task.id.clone());
    let check_in = WellnessCheckIn::new(user_id, start, Mood::Great, 5).expect("valid check-in");
    let link = TaskGoalLink::new(user_id, task.id.clone(), goal.id.clone());

    vec![
        user.into(),
        category.into(),
        sprint.into(),
        goal.into(),
        task.into(),
        activity.into(),
        check_in.into(),
        link.into(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use plansync_model::EntityType;

    #[test]
    fn memory_store() {
        let store = TestStore::memory();
        assert!(store.path().is_none());
        store.put(sample_task("u1")).unwrap();
        assert_eq!(store.count(EntityType::Task), 1);
    }

    #[test]
    fn file_store_survives_reopen() {
        let store = TestStore::file();
        let goal = sample_goal("u1");
        store.put(goal.clone()).unwrap();

        let store = store.reopen();
        assert_eq!(store.get(EntityType::Goal, goal.id()), Some(goal));
    }

    #[test]
    fn graph_covers_every_type_in_order() {
        let graph = sample_graph("u1");
        let types: Vec<EntityType> = graph.iter().map(Entity::entity_type).collect();
        assert_eq!(types, EntityType::sync_order());

        // Every reference points at an earlier record.
        for (i, entity) in graph.iter().enumerate() {
            for (parent_type, parent_id) in entity.references() {
                assert!(graph[..i]
                    .iter()
                    .any(|p| p.entity_type() == parent_type && p.id() == parent_id));
            }
        }
    }
}
