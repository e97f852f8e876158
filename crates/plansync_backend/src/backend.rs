//! The in-process reference backend.

use crate::auth::TokenIssuer;
use crate::config::BackendConfig;
use crate::error::{BackendError, BackendResult};
use crate::feed::ChangeFeed;
use crate::tables::Tables;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use plansync_model::EntityType;
use plansync_protocol::{ChangeFilter, RemoteChange, RemoteRow};
use plansync_sync::{ChangeSubscription, RealtimeSource, RemoteApi, Session, SyncResult};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Write and feed counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendStats {
    /// Accepted writes per table.
    pub writes: BTreeMap<String, u64>,
    /// Writes refused (ownership, injected faults, missing rows).
    pub rejected: u64,
    /// Change events published.
    pub events_published: u64,
    /// Change events a lagging subscriber missed.
    pub events_dropped: u64,
}

#[derive(Debug, Default)]
struct Faults {
    fail_next: u32,
    failing_tables: BTreeSet<String>,
}

#[derive(Debug)]
struct Shared {
    config: BackendConfig,
    issuer: TokenIssuer,
    tables: RwLock<Tables>,
    feed: ChangeFeed,
    faults: Mutex<Faults>,
    online: AtomicBool,
    writes: Mutex<BTreeMap<String, u64>>,
    rejected: AtomicU64,
}

/// JSON tables with a realtime feed, in the shape of a hosted Postgres
/// backend.
///
/// Clones share state. A handle returned by [`attach`](Self::attach) acts for
/// one signed-in user and may only read and write rows whose `user_id`
/// column names that user; an unattached handle acts as the service role.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    shared: Arc<Shared>,
    user_id: Option<String>,
}

impl MemoryBackend {
    /// Creates an empty backend.
    pub fn new(config: BackendConfig) -> Self {
        let issuer = TokenIssuer::new(config.auth_secret.clone(), config.token_ttl);
        let feed = ChangeFeed::new(config.feed_capacity);
        Self {
            shared: Arc::new(Shared {
                config,
                issuer,
                tables: RwLock::new(Tables::default()),
                feed,
                faults: Mutex::new(Faults::default()),
                online: AtomicBool::new(true),
                writes: Mutex::new(BTreeMap::new()),
                rejected: AtomicU64::new(0),
            }),
            user_id: None,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &BackendConfig {
        &self.shared.config
    }

    /// Issues a session for `user_id`.
    pub fn sign_in(&self, user_id: &str) -> BackendResult<Session> {
        let token = self.shared.issuer.issue(user_id)?;
        info!(user_id, "issued session");
        Ok(Session::new(user_id, token))
    }

    /// Returns a handle scoped to the session's user.
    ///
    /// The session's token must validate and name the same user.
    pub fn attach(&self, session: &Session) -> BackendResult<MemoryBackend> {
        let user_id = self.shared.issuer.validate(&session.access_token)?;
        if user_id != session.user_id {
            return Err(BackendError::NotAuthorized(
                "token was issued for another user".into(),
            ));
        }
        Ok(Self {
            shared: self.shared.clone(),
            user_id: Some(user_id),
        })
    }

    /// User this handle acts for, if any.
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Writes a row as another device would: bypasses ownership and fault
    /// injection, and emits the matching change event.
    pub fn remote_write(&self, row: RemoteRow) -> BackendResult<RemoteChange> {
        validate_row(&row)?;
        let id = row.id()?.to_string();
        let previous = self.shared.tables.write().upsert(&row.table, &id, row.value.clone())?;
        let change = match previous {
            Some(old) => RemoteChange::update(self.schema(), row.table.clone(), row.value, Some(old)),
            None => RemoteChange::insert(self.schema(), row.table.clone(), row.value),
        };
        self.commit(&row.table, &change);
        Ok(change)
    }

    /// Deletes a row as another device would.
    pub fn remote_delete(&self, table: &str, id: &str) -> BackendResult<RemoteChange> {
        let old = self.shared.tables.write().delete(table, id)?;
        let change = RemoteChange::delete(self.schema(), table, old);
        self.commit(table, &change);
        Ok(change)
    }

    /// Loads a row without events or access checks.
    pub fn seed(&self, row: RemoteRow) -> BackendResult<()> {
        validate_row(&row)?;
        let id = row.id()?.to_string();
        self.shared.tables.write().upsert(&row.table, &id, row.value)?;
        Ok(())
    }

    /// Reads a row without access checks.
    pub fn row(&self, table: &str, id: &str) -> Option<RemoteRow> {
        self.shared.tables.read().get(table, id)
    }

    /// Row count of a table.
    pub fn row_count(&self, table: &str) -> usize {
        self.shared.tables.read().count(table)
    }

    /// Makes the next `n` calls fail with a retryable error.
    pub fn fail_next(&self, n: u32) {
        self.shared.faults.lock().fail_next = n;
    }

    /// Makes every write to `table` fail until [`clear_faults`](Self::clear_faults).
    pub fn fail_table(&self, table: &str) {
        self.shared.faults.lock().failing_tables.insert(table.to_string());
    }

    /// Removes injected faults.
    pub fn clear_faults(&self) {
        *self.shared.faults.lock() = Faults::default();
    }

    /// Sets reachability. Offline calls fail with [`BackendError::Offline`].
    pub fn set_online(&self, online: bool) {
        self.shared.online.store(online, Ordering::SeqCst);
    }

    /// Every change event, unfiltered.
    pub fn changes(&self) -> broadcast::Receiver<RemoteChange> {
        self.shared.feed.firehose()
    }

    /// Open realtime subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.shared.feed.subscriber_count()
    }

    /// Counter snapshot.
    pub fn stats(&self) -> BackendStats {
        BackendStats {
            writes: self.shared.writes.lock().clone(),
            rejected: self.shared.rejected.load(Ordering::Relaxed),
            events_published: self.shared.feed.published(),
            events_dropped: self.shared.feed.dropped(),
        }
    }

    fn schema(&self) -> &str {
        &self.shared.config.schema
    }

    fn check_reachable(&self) -> BackendResult<()> {
        if !self.shared.online.load(Ordering::SeqCst) {
            return Err(BackendError::Offline);
        }
        let mut faults = self.shared.faults.lock();
        if faults.fail_next > 0 {
            faults.fail_next -= 1;
            return Err(BackendError::Unavailable("injected failure".into()));
        }
        Ok(())
    }

    fn check_writable(&self, table: &str) -> BackendResult<()> {
        self.check_reachable()?;
        if self.shared.faults.lock().failing_tables.contains(table) {
            return Err(BackendError::Rejected(format!("writes to {table} are failing")));
        }
        Ok(())
    }

    fn authorize(&self, owner: &str) -> BackendResult<()> {
        match &self.user_id {
            Some(user) if user != owner => Err(BackendError::Forbidden(format!(
                "row belongs to another user ({owner})"
            ))),
            _ => Ok(()),
        }
    }

    fn visible(&self, row: &RemoteRow) -> bool {
        match &self.user_id {
            Some(user) => row.user_id().ok() == Some(user.as_str()),
            None => true,
        }
    }

    fn commit(&self, table: &str, change: &RemoteChange) {
        *self.shared.writes.lock().entry(table.to_string()).or_insert(0) += 1;
        self.shared.feed.publish(change);
    }

    fn reject(&self, err: BackendError) -> BackendError {
        self.shared.rejected.fetch_add(1, Ordering::Relaxed);
        debug!(error = %err, "write rejected");
        err
    }

    fn insert_row(&self, row: RemoteRow) -> BackendResult<()> {
        self.check_writable(&row.table)?;
        validate_row(&row)?;
        self.authorize(row.user_id()?)?;
        let id = row.id()?.to_string();
        self.shared
            .tables
            .write()
            .insert(&row.table, &id, row.value.clone())?;
        let change = RemoteChange::insert(self.schema(), row.table.clone(), row.value);
        self.commit(&row.table, &change);
        Ok(())
    }

    fn update_row(&self, row: RemoteRow) -> BackendResult<()> {
        self.check_writable(&row.table)?;
        validate_row(&row)?;
        self.authorize(row.user_id()?)?;
        let id = row.id()?.to_string();
        let change = {
            let mut tables = self.shared.tables.write();
            if let Some(existing) = tables.get(&row.table, &id) {
                self.authorize(existing.user_id()?)?;
            }
            let old = tables.update(&row.table, &id, row.value.clone())?;
            RemoteChange::update(self.schema(), row.table.clone(), row.value, Some(old))
        };
        self.commit(&row.table, &change);
        Ok(())
    }

    fn delete_row(&self, table: &str, id: &str) -> BackendResult<()> {
        self.check_writable(table)?;
        let change = {
            let mut tables = self.shared.tables.write();
            let existing = tables
                .get(table, id)
                .ok_or_else(|| BackendError::not_found(table, id))?;
            self.authorize(existing.user_id()?)?;
            let old = tables.delete(table, id)?;
            RemoteChange::delete(self.schema(), table, old)
        };
        self.commit(table, &change);
        Ok(())
    }

    fn guard_write(&self, result: BackendResult<()>) -> SyncResult<()> {
        result.map_err(|e| self.reject(e).into())
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(BackendConfig::default())
    }
}

fn validate_row(row: &RemoteRow) -> BackendResult<()> {
    EntityType::from_table(&row.table)
        .ok_or_else(|| BackendError::UnknownTable(row.table.clone()))?;
    row.clone().into_entity()?;
    Ok(())
}

#[async_trait]
impl RemoteApi for MemoryBackend {
    async fn insert(&self, row: RemoteRow) -> SyncResult<()> {
        self.guard_write(self.insert_row(row))
    }

    async fn update(&self, row: RemoteRow) -> SyncResult<()> {
        self.guard_write(self.update_row(row))
    }

    async fn delete(&self, table: &str, id: &str) -> SyncResult<()> {
        self.guard_write(self.delete_row(table, id))
    }

    async fn fetch(&self, table: &str, id: &str) -> SyncResult<Option<RemoteRow>> {
        self.check_reachable()?;
        let row = self.shared.tables.read().get(table, id);
        Ok(row.filter(|row| self.visible(row)))
    }

    async fn list_for_user(&self, table: &str, user_id: &str) -> SyncResult<Vec<RemoteRow>> {
        self.check_reachable()?;
        self.authorize(user_id)?;
        Ok(self
            .shared
            .tables
            .read()
            .list(table)
            .into_iter()
            .filter(|row| row.user_id().ok() == Some(user_id))
            .collect())
    }
}

#[async_trait]
impl RealtimeSource for MemoryBackend {
    async fn subscribe(
        &self,
        filter: ChangeFilter,
        capacity: usize,
    ) -> SyncResult<ChangeSubscription> {
        self.check_reachable()?;
        if let Some(user) = &self.user_id {
            if filter.user_id.as_deref() != Some(user.as_str()) {
                return Err(BackendError::Forbidden(
                    "subscription must be filtered to the signed-in user".into(),
                )
                .into());
            }
        }
        let receiver = self.shared.feed.subscribe(filter.clone(), capacity);
        debug!(table = %filter.table, "realtime subscription opened");
        Ok(ChangeSubscription { filter, receiver })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plansync_model::{Entity, Goal, Task};
    use plansync_protocol::ChangeKind;
    use plansync_sync::SyncError;

    fn row(entity: impl Into<Entity>) -> RemoteRow {
        RemoteRow::from_entity(&entity.into()).unwrap()
    }

    #[tokio::test]
    async fn writes_emit_changes() {
        let backend = MemoryBackend::default();
        let mut changes = backend.changes();

        let task = Task::new("u1", "t");
        backend.insert(row(task.clone())).await.unwrap();
        backend.update(row(task.clone())).await.unwrap();
        backend.delete("tasks", &task.id).await.unwrap();

        let kinds: Vec<ChangeKind> = (0..3)
            .map(|_| changes.try_recv().unwrap().kind)
            .collect();
        assert_eq!(kinds, [ChangeKind::Insert, ChangeKind::Update, ChangeKind::Delete]);
        assert_eq!(backend.stats().writes.get("tasks"), Some(&3));
    }

    #[tokio::test]
    async fn duplicate_and_missing_rows() {
        let backend = MemoryBackend::default();
        let task = Task::new("u1", "t");
        backend.insert(row(task.clone())).await.unwrap();

        assert!(matches!(
            backend.insert(row(task.clone())).await,
            Err(SyncError::AlreadyExists { .. })
        ));
        assert!(matches!(
            backend.update(row(Task::new("u1", "other"))).await,
            Err(SyncError::NotFound { .. })
        ));
        assert!(matches!(
            backend.delete("tasks", "nope").await,
            Err(SyncError::NotFound { .. })
        ));
        assert_eq!(backend.stats().rejected, 3);
    }

    #[tokio::test]
    async fn attached_session_enforces_ownership() {
        let backend = MemoryBackend::default();
        let session = backend.sign_in("u1").unwrap();
        let client = backend.attach(&session).unwrap();
        assert_eq!(client.user_id(), Some("u1"));

        client.insert(row(Goal::new("u1", "mine"))).await.unwrap();
        let err = client.insert(row(Goal::new("u2", "theirs"))).await.unwrap_err();
        assert!(matches!(err, SyncError::Rejected(_)));

        let foreign = Goal::new("u2", "foreign");
        backend.seed(row(foreign.clone())).unwrap();
        assert!(client.fetch("goals", &foreign.id).await.unwrap().is_none());
        assert!(client.delete("goals", &foreign.id).await.is_err());
        assert!(client.list_for_user("goals", "u2").await.is_err());
        assert_eq!(client.list_for_user("goals", "u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn invalid_tokens_cannot_attach() {
        let backend = MemoryBackend::default();
        let mut session = backend.sign_in("u1").unwrap();
        session.user_id = "u2".into();
        assert!(matches!(
            backend.attach(&session),
            Err(BackendError::NotAuthorized(_))
        ));
        assert!(backend.attach(&Session::new("u1", "garbage")).is_err());
    }

    #[tokio::test]
    async fn fault_injection() {
        let backend = MemoryBackend::default();
        backend.fail_next(2);
        for _ in 0..2 {
            let err = backend.insert(row(Task::new("u1", "t"))).await.unwrap_err();
            assert!(err.is_retryable());
        }
        backend.insert(row(Task::new("u1", "t"))).await.unwrap();

        backend.fail_table("goals");
        let err = backend.insert(row(Goal::new("u1", "g"))).await.unwrap_err();
        assert!(!err.is_retryable());
        backend.clear_faults();
        backend.insert(row(Goal::new("u1", "g"))).await.unwrap();

        backend.set_online(false);
        assert!(matches!(
            backend.fetch("goals", "x").await,
            Err(SyncError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn malformed_rows_are_rejected() {
        let backend = MemoryBackend::default();
        let bad = RemoteRow::new("tasks", serde_json::json!({"id": "t1"}));
        assert!(matches!(
            backend.insert(bad).await,
            Err(SyncError::Rejected(_))
        ));
        let unknown = RemoteRow::new("secrets", serde_json::json!({"id": "s"}));
        assert!(backend.insert(unknown).await.is_err());
    }

    #[tokio::test]
    async fn scoped_subscriptions() {
        let backend = MemoryBackend::default();
        let session = backend.sign_in("u1").unwrap();
        let client = backend.attach(&session).unwrap();

        assert!(client
            .subscribe(ChangeFilter::table("public", "tasks"), 8)
            .await
            .is_err());
        let mut sub = client
            .subscribe(ChangeFilter::table("public", "tasks").for_user("u1"), 8)
            .await
            .unwrap();

        backend.remote_write(row(Task::new("u2", "not mine"))).unwrap();
        let mine = backend.remote_write(row(Task::new("u1", "mine"))).unwrap();
        assert_eq!(sub.receiver.recv().await.unwrap(), mine);
    }
}
