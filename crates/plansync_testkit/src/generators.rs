//! Property-based test generators using proptest.

use chrono::{DateTime, Duration, TimeZone, Utc};
use plansync_model::{Entity, EntityType, Priority, Task, TaskStatus};
use plansync_protocol::{OperationKind, PendingOperation, SyncStatus};
use proptest::prelude::*;

/// Seconds covered by [`timestamp_strategy`]: one year.
const TIMESTAMP_SPAN_SECS: i64 = 365 * 24 * 60 * 60;

fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0)
        .single()
        .expect("valid epoch")
}

/// Strategy for record ids.
pub fn entity_id_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z0-9]{1,8}(-[a-z0-9]{1,8}){0,3}").expect("Invalid regex")
}

/// Strategy for owner ids drawn from a small pool, so ownership collides.
pub fn user_id_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["u1", "u2", "u3"]).prop_map(str::to_string)
}

/// Strategy for millisecond-precision timestamps within 2026.
pub fn timestamp_strategy() -> impl Strategy<Value = DateTime<Utc>> {
    (0..TIMESTAMP_SPAN_SECS, 0i64..1000)
        .prop_map(|(secs, millis)| epoch() + Duration::seconds(secs) + Duration::milliseconds(millis))
}

/// Strategy for a pair of timestamps where the second is strictly later.
pub fn ordered_timestamps_strategy() -> impl Strategy<Value = (DateTime<Utc>, DateTime<Utc>)> {
    (timestamp_strategy(), 1i64..86_400_000)
        .prop_map(|(earlier, gap_ms)| (earlier, earlier + Duration::milliseconds(gap_ms)))
}

/// Strategy for entity types.
pub fn entity_type_strategy() -> impl Strategy<Value = EntityType> {
    prop::sample::select(EntityType::ALL.to_vec())
}

/// Strategy for operation kinds that carry a request.
pub fn operation_kind_strategy() -> impl Strategy<Value = OperationKind> {
    prop_oneof![
        Just(OperationKind::Create),
        Just(OperationKind::Update),
        Just(OperationKind::Delete),
    ]
}

fn task_status_strategy() -> impl Strategy<Value = TaskStatus> {
    prop_oneof![
        Just(TaskStatus::Todo),
        Just(TaskStatus::InProgress),
        Just(TaskStatus::Done),
        Just(TaskStatus::Cancelled),
    ]
}

fn priority_strategy() -> impl Strategy<Value = Priority> {
    prop_oneof![
        Just(Priority::Low),
        Just(Priority::Medium),
        Just(Priority::High),
        Just(Priority::Urgent),
    ]
}

/// Strategy for tasks with arbitrary content.
pub fn task_strategy() -> impl Strategy<Value = Task> {
    (
        entity_id_strategy(),
        user_id_strategy(),
        "[A-Za-z ]{1,40}",
        prop::option::of("[A-Za-z .,]{0,80}"),
        task_status_strategy(),
        priority_strategy(),
        prop::option::of(0u32..600),
        timestamp_strategy(),
    )
        .prop_map(
            |(id, user_id, title, description, status, priority, estimate, updated_at)| {
                let mut task = Task::new(user_id, title);
                task.id = id;
                task.description = description;
                task.status = status;
                task.priority = priority;
                task.estimate_minutes = estimate;
                task.updated_at = updated_at;
                task
            },
        )
}

/// Strategy for task entities.
pub fn task_entity_strategy() -> impl Strategy<Value = Entity> {
    task_strategy().prop_map(Entity::from)
}

/// Strategy for ledger records in any state.
pub fn pending_operation_strategy() -> impl Strategy<Value = PendingOperation> {
    (
        entity_id_strategy(),
        entity_type_strategy(),
        operation_kind_strategy(),
        prop_oneof![Just(SyncStatus::Pending), Just(SyncStatus::Failed)],
        0u32..10,
        timestamp_strategy(),
    )
        .prop_map(|(id, entity_type, operation, status, retry_count, at)| {
            let mut op = PendingOperation::scheduled(id, entity_type, operation, at);
            op.status = status;
            op.retry_count = retry_count;
            if status == SyncStatus::Failed {
                op.last_error = Some("remote error".to_string());
            }
            op
        })
}
