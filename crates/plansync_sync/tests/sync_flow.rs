//! End-to-end sync flows against the reference backend.

use chrono::{Duration, Utc};
use plansync_model::{Entity, EntityType, Task};
use plansync_protocol::{OperationKind, SyncStatus};
use plansync_sync::{ConnectivityMonitor, PendingLedger, SyncConfig, SyncError, SyncState};
use plansync_testkit::prelude::*;
use std::time::Duration as StdDuration;
use tokio_util::sync::CancellationToken;

async fn eventually<F>(mut check: F)
where
    F: FnMut() -> bool,
{
    let result = tokio::time::timeout(StdDuration::from_secs(5), async {
        while !check() {
            tokio::time::sleep(StdDuration::from_millis(10)).await;
        }
    })
    .await;
    assert!(result.is_ok(), "condition not reached in time");
}

fn task(entity: &Entity) -> Task {
    match entity {
        Entity::Task(t) => t.clone(),
        other => panic!("expected a task, got {other:?}"),
    }
}

#[tokio::test]
async fn offline_edits_are_pushed_after_reconnect() {
    let harness = SyncHarness::new("u1");
    harness.set_online(false);

    let created = harness.repository().create(sample_task("u1")).unwrap();
    let op = harness
        .ledger()
        .get_pending_operation(created.id(), EntityType::Task)
        .unwrap();
    assert_eq!(op.operation, OperationKind::Create);
    assert_eq!(op.status, SyncStatus::Pending);

    let err = harness.coordinator().sync_all().await.unwrap_err();
    assert!(matches!(err, SyncError::NotConnected));
    assert!(harness.backend().row("tasks", created.id()).is_none());

    harness.set_online(true);
    let report = harness.coordinator().sync_all().await.unwrap();
    assert_eq!(report.pushed, 1);
    assert_eq!(harness.coordinator().state(), SyncState::Synced);
    harness.assert_remote_matches(&created);
    harness.assert_ledger_empty();
}

#[tokio::test]
async fn update_and_delete_propagate() {
    let harness = SyncHarness::new("u1");
    let repo = harness.repository();

    let created = repo.create(sample_task("u1")).unwrap();
    harness.coordinator().sync_all().await.unwrap();

    let mut edited = task(&created);
    edited.title = "Write release notes (v2)".into();
    let updated = repo.update(Entity::from(edited)).unwrap();
    harness.coordinator().sync_all().await.unwrap();
    harness.assert_remote_matches(&updated);

    assert!(repo.delete(EntityType::Task, created.id()).unwrap());
    let op = harness
        .ledger()
        .get_pending_operation(created.id(), EntityType::Task)
        .unwrap();
    assert_eq!(op.operation, OperationKind::Delete);

    harness.coordinator().sync_all().await.unwrap();
    assert!(harness.backend().row("tasks", created.id()).is_none());
    harness.assert_ledger_empty();
}

#[tokio::test]
async fn failing_pushes_stop_at_the_retry_ceiling() {
    let harness = SyncHarness::with_config(
        "u1",
        SyncConfig::new()
            .with_entity_delay(StdDuration::ZERO)
            .with_max_retries(2),
        TestStore::memory(),
    );
    harness.backend().fail_table("tasks");
    let created = harness.repository().create(sample_task("u1")).unwrap();

    for _ in 0..2 {
        let report = harness.coordinator().sync_all().await.unwrap();
        assert_eq!(report.failed, 1);
    }
    let report = harness.coordinator().sync_all().await.unwrap();
    assert_eq!(report.failed, 0);
    assert_eq!(report.skipped, 1);

    let op = harness.store().pending(created.id(), EntityType::Task).unwrap();
    assert_eq!(op.status, SyncStatus::Failed);
    assert_eq!(op.retry_count, 2);
    assert!(op.last_error.is_some());
    assert!(harness.coordinator().stats().last_error.is_some());

    harness.backend().clear_faults();
    assert_eq!(harness.store().requeue_failed(Utc::now()).unwrap(), 1);
    let report = harness.coordinator().sync_all().await.unwrap();
    assert_eq!(report.pushed, 1);
    harness.assert_remote_matches(&created);
    harness.assert_ledger_empty();
}

#[tokio::test]
async fn transient_failure_is_retried_on_the_next_pass() {
    let harness = SyncHarness::new("u1");
    let created = harness.repository().create(sample_task("u1")).unwrap();

    harness.backend().fail_next(1);
    let report = harness.coordinator().sync_all().await.unwrap();
    assert_eq!(report.failed, 1);
    let op = harness.store().pending(created.id(), EntityType::Task).unwrap();
    assert_eq!(op.retry_count, 1);

    let report = harness.coordinator().sync_all().await.unwrap();
    assert_eq!(report.pushed, 1);
    harness.assert_ledger_empty();
}

#[tokio::test]
async fn refresh_keeps_pending_local_edits() {
    let harness = SyncHarness::new("u1");
    let local = harness.repository().create(sample_task("u1")).unwrap();

    // Another device wrote a newer version of the same task.
    let mut remote = task(&local);
    remote.title = "Edited elsewhere".into();
    remote.updated_at = local.updated_at() + Duration::hours(1);
    harness.remote_write(&Entity::from(remote));

    // And a task this device has never seen.
    let mut other = task(&sample_task("u1"));
    other.updated_at = Utc::now();
    let other = Entity::from(other);
    harness.remote_write(&other);

    let report = harness.coordinator().refresh_from_remote("u1").await.unwrap();
    assert_eq!(report.applied, 1);
    assert_eq!(report.dropped, 1);

    assert_eq!(harness.store().get(EntityType::Task, local.id()), Some(local));
    assert_eq!(harness.store().get(EntityType::Task, other.id()), Some(other));
    assert_eq!(harness.applier().recent_conflicts().len(), 1);
}

#[tokio::test]
async fn refresh_applies_newer_remote_rows_once_synced() {
    let harness = SyncHarness::new("u1");
    let local = harness.repository().create(sample_task("u1")).unwrap();
    harness.coordinator().sync_all().await.unwrap();

    let mut remote = task(&local);
    remote.title = "Edited elsewhere".into();
    remote.updated_at = local.updated_at() + Duration::minutes(5);
    let remote = Entity::from(remote);
    harness.remote_write(&remote);

    let report = harness.coordinator().refresh_from_remote("u1").await.unwrap();
    assert_eq!(report.applied, 1);
    assert_eq!(harness.store().get(EntityType::Task, local.id()), Some(remote));
}

#[tokio::test]
async fn realtime_feed_applies_remote_changes() {
    let harness = SyncHarness::new("u1");
    let shutdown = CancellationToken::new();
    let realtime = harness.realtime(shutdown.clone());
    realtime.subscribe("u1").await.unwrap();
    assert!(realtime.is_subscribed());
    assert_eq!(realtime.subscribed_user().as_deref(), Some("u1"));

    let mut incoming = task(&sample_task("u1"));
    incoming.updated_at = Utc::now();
    let incoming = Entity::from(incoming);
    harness.remote_write(&incoming);

    let store = harness.store().clone();
    let id = incoming.id().to_string();
    eventually(|| store.get(EntityType::Task, &id).is_some()).await;

    harness.backend().remote_delete("tasks", &id).unwrap();
    eventually(|| store.get(EntityType::Task, &id).is_none()).await;
    assert!(realtime.events_received() >= 2);

    realtime.unsubscribe().await;
    assert!(!realtime.is_subscribed());
    shutdown.cancel();
}

#[tokio::test]
async fn realtime_feed_does_not_clobber_pending_edits() {
    let harness = SyncHarness::new("u1");
    let realtime = harness.realtime(CancellationToken::new());
    realtime.subscribe("u1").await.unwrap();

    let local = harness.repository().create(sample_task("u1")).unwrap();
    let mut remote = task(&local);
    remote.title = "Edited elsewhere".into();
    remote.updated_at = local.updated_at() + Duration::hours(1);
    harness.remote_write(&Entity::from(remote));

    let applier = harness.applier().clone();
    eventually(|| applier.dropped_count() >= 1).await;
    assert_eq!(harness.store().get(EntityType::Task, local.id()), Some(local));

    realtime.unsubscribe().await;
}

#[tokio::test]
async fn foreign_rows_are_never_listed() {
    let harness = SyncHarness::new("u1");
    harness.remote_write(&sample_task("u2"));

    let report = harness.coordinator().refresh_from_remote("u1").await.unwrap();
    assert_eq!(report.applied, 0);
    assert_eq!(harness.store().count(EntityType::Task), 0);

    let err = harness
        .coordinator()
        .refresh_from_remote("u2")
        .await
        .unwrap_err();
    assert!(!matches!(err, SyncError::NotConnected));
}

#[test]
fn ledger_survives_restart() {
    let test_store = TestStore::file();
    let id = {
        let ledger = PendingLedger::new(test_store.store.clone(), ConnectivityMonitor::new(false));
        ledger
            .schedule_sync_operation("t1", EntityType::Task, OperationKind::Update)
            .unwrap();
        ledger
            .schedule_sync_operation("t1", EntityType::Task, OperationKind::Delete)
            .unwrap()
            .entity_id
    };

    let test_store = test_store.reopen();
    let op = test_store.pending(&id, EntityType::Task).unwrap();
    assert_eq!(op.operation, OperationKind::Delete);
    assert_eq!(test_store.all_pending().len(), 1);
}
