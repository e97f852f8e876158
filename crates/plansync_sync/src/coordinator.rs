//! Sync coordinator: pushes the pending ledger and refreshes from the remote.

use crate::applier::{ApplyOutcome, RemoteApplier};
use crate::config::SyncConfig;
use crate::connectivity::ConnectivityMonitor;
use crate::error::{SyncError, SyncResult};
use crate::ledger::PendingLedger;
use crate::remote::RemoteApi;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use plansync_model::EntityType;
use plansync_protocol::{OperationKind, PendingOperation, RemoteRow};
use plansync_store::LocalStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// The current state of the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No pass has run yet.
    Idle,
    /// Pushing ledger records.
    Pushing,
    /// Pulling remote tables.
    Refreshing,
    /// The last pass completed.
    Synced,
    /// The last pass stopped on an error.
    Error,
}

impl SyncState {
    /// Returns true if a pass is running.
    pub fn is_active(&self) -> bool {
        matches!(self, SyncState::Pushing | SyncState::Refreshing)
    }

    /// Returns true if a new pass can start.
    pub fn can_start_sync(&self) -> bool {
        matches!(self, SyncState::Idle | SyncState::Synced | SyncState::Error)
    }
}

/// Statistics about sync passes.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Push passes that ran to the end.
    pub passes_completed: u64,
    /// Records pushed and cleared.
    pub operations_pushed: u64,
    /// Failed pushes.
    pub failures: u64,
    /// Records skipped at the retry ceiling.
    pub skipped: u64,
    /// Records cleared without a remote call.
    pub cleared: u64,
    /// Remote snapshots written locally by refreshes.
    pub remote_changes_applied: u64,
    /// Remote snapshots dropped by refreshes.
    pub conflicts_dropped: u64,
    /// Last error message.
    pub last_error: Option<String>,
    /// When the last push pass finished.
    pub last_pass_at: Option<DateTime<Utc>>,
}

/// Result of one push pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPassReport {
    /// Records pushed and cleared.
    pub pushed: u64,
    /// Records whose push failed this pass.
    pub failed: u64,
    /// Records skipped at the retry ceiling.
    pub skipped: u64,
    /// Records cleared without a remote call.
    pub cleared: u64,
    /// Wall time of the pass.
    pub duration: Duration,
}

impl SyncPassReport {
    fn merge(&mut self, other: &SyncPassReport) {
        self.pushed += other.pushed;
        self.failed += other.failed;
        self.skipped += other.skipped;
        self.cleared += other.cleared;
    }
}

/// Result of a full refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    /// Snapshots written locally.
    pub applied: u64,
    /// Snapshots dropped in favour of local state.
    pub dropped: u64,
    /// Snapshots identical to the local row.
    pub ignored: u64,
    /// Rows that could not be mapped to an entity.
    pub malformed: u64,
}

enum PushOutcome {
    Pushed,
    Cleared,
}

/// Drives the pending ledger to the remote, one entity at a time.
///
/// Types are visited parents-first so that a child row never reaches the
/// remote before the rows it references. Passes are serialised: a second
/// caller waits for the running pass to finish.
pub struct SyncCoordinator {
    config: SyncConfig,
    store: Arc<LocalStore>,
    ledger: Arc<PendingLedger>,
    remote: Arc<dyn RemoteApi>,
    applier: Arc<RemoteApplier>,
    connectivity: ConnectivityMonitor,
    state: RwLock<SyncState>,
    stats: RwLock<SyncStats>,
    pass_lock: Mutex<()>,
}

impl SyncCoordinator {
    /// Creates a coordinator.
    pub fn new(
        config: SyncConfig,
        store: Arc<LocalStore>,
        ledger: Arc<PendingLedger>,
        remote: Arc<dyn RemoteApi>,
        applier: Arc<RemoteApplier>,
        connectivity: ConnectivityMonitor,
    ) -> Self {
        Self {
            config,
            store,
            ledger,
            remote,
            applier,
            connectivity,
            state: RwLock::new(SyncState::Idle),
            stats: RwLock::new(SyncStats::default()),
            pass_lock: Mutex::new(()),
        }
    }

    /// Gets the current state.
    pub fn state(&self) -> SyncState {
        *self.state.read()
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Pushes every unresolved ledger record, parents first.
    pub async fn sync_all(&self) -> SyncResult<SyncPassReport> {
        self.run_pass(&EntityType::sync_order()).await
    }

    /// Pushes the unresolved ledger records of one type.
    pub async fn sync_entity_type(&self, entity_type: EntityType) -> SyncResult<SyncPassReport> {
        self.run_pass(&[entity_type]).await
    }

    async fn run_pass(&self, types: &[EntityType]) -> SyncResult<SyncPassReport> {
        if !self.connectivity.is_online() {
            return Err(SyncError::NotConnected);
        }

        if self.state().is_active() {
            debug!("waiting for the running pass");
        }
        let _guard = self.pass_lock.lock().await;
        let start = Instant::now();
        self.begin(SyncState::Pushing);

        let mut report = SyncPassReport::default();
        let mut first = true;
        for &entity_type in types {
            match self.push_type(entity_type, &mut first).await {
                Ok(partial) => report.merge(&partial),
                Err(e) => {
                    self.handle_error(&e);
                    return Err(e);
                }
            }
        }
        report.duration = start.elapsed();

        self.set_state(SyncState::Synced);
        {
            let mut stats = self.stats.write();
            stats.passes_completed += 1;
            stats.operations_pushed += report.pushed;
            stats.failures += report.failed;
            stats.skipped += report.skipped;
            stats.cleared += report.cleared;
            stats.last_pass_at = Some(Utc::now());
            // Records left at the retry ceiling keep the error visible.
            if report.failed == 0 && report.skipped == 0 {
                stats.last_error = None;
            }
        }
        if report.pushed + report.failed > 0 {
            info!(
                pushed = report.pushed,
                failed = report.failed,
                skipped = report.skipped,
                cleared = report.cleared,
                duration_ms = report.duration.as_millis() as u64,
                "sync pass finished"
            );
        }
        Ok(report)
    }

    /// Pushes one type's records. `first` is shared across the pass so the
    /// delay also separates the last record of one type from the next type.
    async fn push_type(
        &self,
        entity_type: EntityType,
        first: &mut bool,
    ) -> SyncResult<SyncPassReport> {
        let mut report = SyncPassReport::default();
        let records = self.ledger.pending_for_type(entity_type);
        if records.is_empty() {
            return Ok(report);
        }
        debug!(entity_type = %entity_type, count = records.len(), "pushing ledger records");

        for op in records {
            if op.is_exhausted(self.config.max_retries) {
                warn!(
                    entity_type = %entity_type,
                    entity_id = %op.entity_id,
                    retry_count = op.retry_count,
                    last_error = op.last_error.as_deref().unwrap_or(""),
                    "retry ceiling reached, leaving record failed"
                );
                report.skipped += 1;
                continue;
            }

            if !*first && !self.config.entity_delay.is_zero() {
                tokio::time::sleep(self.config.entity_delay).await;
            }
            *first = false;

            if !self.connectivity.is_online() {
                return Err(SyncError::NotConnected);
            }

            match self.push_one(&op).await {
                Ok(PushOutcome::Pushed) => {
                    self.ledger.complete(&op)?;
                    report.pushed += 1;
                }
                Ok(PushOutcome::Cleared) => {
                    self.ledger.complete(&op)?;
                    report.cleared += 1;
                }
                Err(e) => {
                    let message = e.to_string();
                    warn!(
                        entity_type = %entity_type,
                        entity_id = %op.entity_id,
                        operation = op.operation.as_str(),
                        error = %message,
                        "push failed"
                    );
                    self.ledger.fail(&op, &message)?;
                    self.stats.write().last_error = Some(message);
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    async fn push_one(&self, op: &PendingOperation) -> SyncResult<PushOutcome> {
        let table = op.entity_type.table_name();
        match op.operation {
            OperationKind::None => Ok(PushOutcome::Cleared),
            OperationKind::Create | OperationKind::Update => {
                let Some(entity) = self.store.get(op.entity_type, &op.entity_id) else {
                    debug!(entity_id = %op.entity_id, "local row is gone, clearing record");
                    return Ok(PushOutcome::Cleared);
                };
                let row = RemoteRow::from_entity(&entity)?;
                if op.operation == OperationKind::Create {
                    match self.remote.insert(row.clone()).await {
                        Err(SyncError::AlreadyExists { .. }) => self.remote.update(row).await?,
                        other => other?,
                    }
                } else {
                    match self.remote.update(row.clone()).await {
                        Err(SyncError::NotFound { .. }) => self.remote.insert(row).await?,
                        other => other?,
                    }
                }
                Ok(PushOutcome::Pushed)
            }
            OperationKind::Delete => match self.remote.delete(table, &op.entity_id).await {
                Ok(()) | Err(SyncError::NotFound { .. }) => Ok(PushOutcome::Pushed),
                Err(e) => Err(e),
            },
        }
    }

    /// Pulls every table owned by `user_id` and applies the rows through the
    /// conflict resolver.
    ///
    /// Rows that cannot be mapped are logged and skipped.
    pub async fn refresh_from_remote(&self, user_id: &str) -> SyncResult<RefreshReport> {
        if !self.connectivity.is_online() {
            return Err(SyncError::NotConnected);
        }

        let _guard = self.pass_lock.lock().await;
        self.begin(SyncState::Refreshing);

        let mut report = RefreshReport::default();
        for entity_type in EntityType::sync_order() {
            let rows = match self
                .remote
                .list_for_user(entity_type.table_name(), user_id)
                .await
            {
                Ok(rows) => rows,
                Err(e) => {
                    self.handle_error(&e);
                    return Err(e);
                }
            };

            for row in rows {
                let entity = match row.into_entity() {
                    Ok(entity) => entity,
                    Err(e) => {
                        warn!(entity_type = %entity_type, error = %e, "skipping malformed remote row");
                        report.malformed += 1;
                        continue;
                    }
                };
                match self.applier.apply_snapshot(entity) {
                    Ok(ApplyOutcome::Applied | ApplyOutcome::Deleted) => report.applied += 1,
                    Ok(ApplyOutcome::Dropped(_)) => report.dropped += 1,
                    Ok(ApplyOutcome::Ignored) => report.ignored += 1,
                    Err(e) => {
                        self.handle_error(&e);
                        return Err(e);
                    }
                }
            }
        }

        self.set_state(SyncState::Synced);
        {
            let mut stats = self.stats.write();
            stats.remote_changes_applied += report.applied;
            stats.conflicts_dropped += report.dropped;
        }
        info!(
            user_id,
            applied = report.applied,
            dropped = report.dropped,
            malformed = report.malformed,
            "refresh from remote finished"
        );
        Ok(report)
    }

    fn set_state(&self, state: SyncState) {
        *self.state.write() = state;
    }

    /// Enters `next` while holding the pass lock.
    ///
    /// No other pass can be running here, so a state that cannot start a
    /// sync means the previous pass was dropped mid-flight.
    fn begin(&self, next: SyncState) {
        let mut state = self.state.write();
        if !state.can_start_sync() {
            warn!(previous = ?*state, "previous pass was abandoned");
        }
        *state = next;
    }

    fn handle_error(&self, error: &SyncError) {
        self.set_state(SyncState::Error);
        self.stats.write().last_error = Some(error.to_string());
    }
}

impl std::fmt::Debug for SyncCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncCoordinator")
            .field("config", &self.config)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockRemote, RemoteCall};
    use plansync_model::{Category, Entity, Goal, Task, TaskGoalLink};
    use plansync_protocol::{ConflictPolicy, SyncStatus};

    struct Fixture {
        store: Arc<LocalStore>,
        ledger: Arc<PendingLedger>,
        remote: Arc<MockRemote>,
        connectivity: ConnectivityMonitor,
        coordinator: SyncCoordinator,
    }

    fn fixture(config: SyncConfig) -> Fixture {
        let store = Arc::new(LocalStore::open_in_memory());
        let connectivity = ConnectivityMonitor::new(true);
        let ledger = Arc::new(PendingLedger::new(store.clone(), connectivity.clone()));
        let remote = Arc::new(MockRemote::new());
        let applier = Arc::new(RemoteApplier::new(store.clone(), config.conflict_policy));
        let coordinator = SyncCoordinator::new(
            config,
            store.clone(),
            ledger.clone(),
            remote.clone(),
            applier,
            connectivity.clone(),
        );
        Fixture {
            store,
            ledger,
            remote,
            connectivity,
            coordinator,
        }
    }

    fn fast() -> SyncConfig {
        SyncConfig::new().with_entity_delay(Duration::ZERO)
    }

    fn create(f: &Fixture, entity: Entity) -> Entity {
        f.store.put(entity.clone()).unwrap();
        f.ledger
            .schedule_sync_operation(entity.id(), entity.entity_type(), OperationKind::Create)
            .unwrap();
        entity
    }

    #[test]
    fn sync_state_checks() {
        assert!(SyncState::Idle.can_start_sync());
        assert!(SyncState::Synced.can_start_sync());
        assert!(SyncState::Error.can_start_sync());
        assert!(!SyncState::Pushing.can_start_sync());
        assert!(!SyncState::Refreshing.can_start_sync());

        assert!(SyncState::Pushing.is_active());
        assert!(!SyncState::Idle.is_active());
    }

    #[tokio::test]
    async fn pushes_creates_and_clears_ledger() {
        let f = fixture(fast());
        let task = create(&f, Task::new("u1", "write report").into());

        let report = f.coordinator.sync_all().await.unwrap();
        assert_eq!(report.pushed, 1);
        assert_eq!(report.failed, 0);
        assert!(f.remote.row("tasks", task.id()).is_some());
        assert!(f.store.pending(task.id(), EntityType::Task).is_none());
        assert_eq!(f.coordinator.state(), SyncState::Synced);
        assert_eq!(f.coordinator.stats().operations_pushed, 1);
    }

    #[tokio::test]
    async fn parents_push_before_children() {
        let f = fixture(fast());
        let link = create(&f, TaskGoalLink::new("u1", "t1", "g1").into());
        let task = create(&f, Task::new("u1", "t").into());
        let goal = create(&f, Goal::new("u1", "g").into());
        let category = create(&f, Category::new("u1", "c").into());

        f.coordinator.sync_all().await.unwrap();

        let order: Vec<String> = f
            .remote
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                RemoteCall::Insert { id, .. } => Some(id),
                _ => None,
            })
            .collect();
        let pos = |id: &str| order.iter().position(|x| x == id).unwrap();
        assert!(pos(category.id()) < pos(task.id()));
        assert!(pos(goal.id()) < pos(link.id()));
        assert!(pos(task.id()) < pos(link.id()));
    }

    #[tokio::test]
    async fn failure_is_recorded_and_batch_continues() {
        let f = fixture(fast());
        let first = create(&f, Task::new("u1", "a").into());
        let second = create(&f, Task::new("u1", "b").into());

        f.remote.fail_next(SyncError::remote_retryable("503"));
        let report = f.coordinator.sync_entity_type(EntityType::Task).await.unwrap();
        assert_eq!(report.pushed, 1);
        assert_eq!(report.failed, 1);

        let failed: Vec<_> = [&first, &second]
            .iter()
            .filter_map(|e| f.store.pending(e.id(), EntityType::Task))
            .collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].status, SyncStatus::Failed);
        assert_eq!(failed[0].retry_count, 1);
        assert!(failed[0].last_error.as_deref().unwrap().contains("503"));
        assert!(f.coordinator.stats().last_error.is_some());

        // Next pass retries it.
        let report = f.coordinator.sync_all().await.unwrap();
        assert_eq!(report.pushed, 1);
        assert!(f.store.all_pending().is_empty());
    }

    #[tokio::test]
    async fn retry_ceiling_skips_record() {
        let f = fixture(fast().with_max_retries(2));
        let task = create(&f, Task::new("u1", "flaky").into());

        for _ in 0..2 {
            f.remote.fail_next(SyncError::remote_retryable("timeout"));
            f.coordinator.sync_all().await.unwrap();
        }
        let op = f.store.pending(task.id(), EntityType::Task).unwrap();
        assert_eq!(op.retry_count, 2);

        let calls_before = f.remote.calls().len();
        let report = f.coordinator.sync_all().await.unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(f.remote.calls().len(), calls_before);

        let op = f.store.pending(task.id(), EntityType::Task).unwrap();
        assert_eq!(op.status, SyncStatus::Failed);
        assert_eq!(op.retry_count, 2);

        // A pass that only skips keeps the last error.
        let last_error = f.coordinator.stats().last_error.unwrap();
        assert!(last_error.contains("timeout"));
    }

    #[tokio::test(start_paused = true)]
    async fn entity_delay_separates_every_push() {
        let delay = Duration::from_millis(200);
        let f = fixture(SyncConfig::new().with_entity_delay(delay));
        create(&f, Category::new("u1", "c").into());
        create(&f, Task::new("u1", "a").into());
        create(&f, Task::new("u1", "b").into());

        let start = Instant::now();
        let report = f.coordinator.sync_all().await.unwrap();
        assert_eq!(report.pushed, 3);
        // Two gaps, one of them at the category -> task boundary.
        assert!(start.elapsed() >= delay * 2);
        assert!(report.duration >= delay * 2);
    }

    #[tokio::test]
    async fn concurrent_passes_push_each_record_once() {
        let f = fixture(fast());
        for title in ["a", "b", "c"] {
            create(&f, Task::new("u1", title).into());
        }

        let (left, right) = tokio::join!(f.coordinator.sync_all(), f.coordinator.sync_all());
        let left = left.unwrap();
        let right = right.unwrap();
        assert_eq!(left.pushed + right.pushed, 3);

        let inserts = f
            .remote
            .calls()
            .into_iter()
            .filter(|call| matches!(call, RemoteCall::Insert { .. }))
            .count();
        assert_eq!(inserts, 3);
        assert!(f.store.all_pending().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_pass_does_not_block_the_next() {
        let f = fixture(SyncConfig::new().with_entity_delay(Duration::from_millis(200)));
        create(&f, Task::new("u1", "a").into());
        create(&f, Task::new("u1", "b").into());

        let abandoned =
            tokio::time::timeout(Duration::from_millis(50), f.coordinator.sync_all()).await;
        assert!(abandoned.is_err());
        assert!(f.coordinator.state().is_active());

        let report = f.coordinator.sync_all().await.unwrap();
        assert_eq!(report.pushed, 1);
        assert_eq!(f.coordinator.state(), SyncState::Synced);
        assert!(f.store.all_pending().is_empty());
    }

    #[tokio::test]
    async fn offline_pass_is_refused_without_touching_ledger() {
        let f = fixture(fast());
        let task = create(&f, Task::new("u1", "offline").into());
        f.connectivity.set_online(false);

        let err = f.coordinator.sync_all().await.unwrap_err();
        assert!(matches!(err, SyncError::NotConnected));
        assert!(f.remote.calls().is_empty());
        let op = f.store.pending(task.id(), EntityType::Task).unwrap();
        assert_eq!(op.status, SyncStatus::Pending);
        assert_eq!(op.retry_count, 0);
    }

    #[tokio::test]
    async fn update_falls_back_to_insert() {
        let f = fixture(fast());
        let task: Entity = Task::new("u1", "never pushed").into();
        f.store.put(task.clone()).unwrap();
        f.ledger
            .schedule_sync_operation(task.id(), EntityType::Task, OperationKind::Update)
            .unwrap();

        let report = f.coordinator.sync_all().await.unwrap();
        assert_eq!(report.pushed, 1);
        assert!(f.remote.row("tasks", task.id()).is_some());
    }

    #[tokio::test]
    async fn create_of_existing_row_updates() {
        let f = fixture(fast());
        let mut task = Task::new("u1", "old");
        f.remote
            .seed(RemoteRow::from_entity(&Entity::from(task.clone())).unwrap())
            .unwrap();
        task.title = "new".into();
        let task = create(&f, task.into());

        f.coordinator.sync_all().await.unwrap();
        let row = f.remote.row("tasks", task.id()).unwrap();
        assert_eq!(row.value["title"], "new");
    }

    #[tokio::test]
    async fn delete_of_missing_row_succeeds() {
        let f = fixture(fast());
        f.ledger
            .schedule_sync_operation("ghost", EntityType::Goal, OperationKind::Delete)
            .unwrap();

        let report = f.coordinator.sync_all().await.unwrap();
        assert_eq!(report.pushed, 1);
        assert!(f.store.all_pending().is_empty());
    }

    #[tokio::test]
    async fn create_of_vanished_row_is_cleared() {
        let f = fixture(fast());
        f.ledger
            .schedule_sync_operation("gone", EntityType::Task, OperationKind::Create)
            .unwrap();

        let report = f.coordinator.sync_all().await.unwrap();
        assert_eq!(report.cleared, 1);
        assert!(f.remote.calls().is_empty());
        assert!(f.store.all_pending().is_empty());
    }

    #[tokio::test]
    async fn refresh_applies_remote_rows_and_respects_pending() {
        let f = fixture(fast());
        let remote_only: Entity = Task::new("u1", "from server").into();
        f.remote.seed(RemoteRow::from_entity(&remote_only).unwrap()).unwrap();

        let mut edited = Task::new("u1", "server title");
        f.remote
            .seed(RemoteRow::from_entity(&Entity::from(edited.clone())).unwrap())
            .unwrap();
        edited.title = "local edit".into();
        let edited = create(&f, edited.into());

        let other_user: Entity = Task::new("u2", "not mine").into();
        f.remote.seed(RemoteRow::from_entity(&other_user).unwrap()).unwrap();

        let report = f.coordinator.refresh_from_remote("u1").await.unwrap();
        assert_eq!(report.applied, 1);
        assert_eq!(report.dropped, 1);
        assert_eq!(f.store.get(EntityType::Task, remote_only.id()), Some(remote_only));
        assert_eq!(f.store.get(EntityType::Task, edited.id()), Some(edited));
        assert!(f.store.get(EntityType::Task, other_user.id()).is_none());
        assert_eq!(f.coordinator.stats().conflicts_dropped, 1);
    }

    #[tokio::test]
    async fn remote_error_during_refresh_sets_error_state() {
        let f = fixture(fast().with_conflict_policy(ConflictPolicy::RemoteWins));
        f.remote.fail_next(SyncError::remote_fatal("boom"));

        assert!(f.coordinator.refresh_from_remote("u1").await.is_err());
        assert_eq!(f.coordinator.state(), SyncState::Error);
        assert!(f.coordinator.stats().last_error.unwrap().contains("boom"));
    }
}
