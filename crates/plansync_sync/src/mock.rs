//! Scriptable remote for tests.

use crate::error::{SyncError, SyncResult};
use crate::remote::{ChangeSubscription, RealtimeSource, RemoteApi};
use async_trait::async_trait;
use parking_lot::Mutex;
use plansync_protocol::{ChangeFilter, RemoteChange, RemoteRow};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

/// A call made against [`MockRemote`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    /// `insert`
    Insert {
        /// Table.
        table: String,
        /// Row id.
        id: String,
    },
    /// `update`
    Update {
        /// Table.
        table: String,
        /// Row id.
        id: String,
    },
    /// `delete`
    Delete {
        /// Table.
        table: String,
        /// Row id.
        id: String,
    },
    /// `fetch`
    Fetch {
        /// Table.
        table: String,
        /// Row id.
        id: String,
    },
    /// `list_for_user`
    List {
        /// Table.
        table: String,
        /// Owner.
        user_id: String,
    },
}

/// An in-memory remote that records calls and fails on demand.
///
/// Rows are plain JSON keyed by `(table, id)`. Realtime events are only
/// delivered when a test calls [`emit`](Self::emit).
#[derive(Debug)]
pub struct MockRemote {
    rows: Mutex<BTreeMap<(String, String), RemoteRow>>,
    calls: Mutex<Vec<RemoteCall>>,
    failures: Mutex<VecDeque<SyncError>>,
    connected: AtomicBool,
    subscribers: Mutex<Vec<(ChangeFilter, mpsc::Sender<RemoteChange>)>>,
}

impl MockRemote {
    /// Creates a connected, empty remote.
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(BTreeMap::new()),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(VecDeque::new()),
            connected: AtomicBool::new(true),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Stores a row without recording a call.
    pub fn seed(&self, row: RemoteRow) -> SyncResult<()> {
        let key = (row.table.clone(), row.id()?.to_string());
        self.rows.lock().insert(key, row);
        Ok(())
    }

    /// Returns a stored row.
    pub fn row(&self, table: &str, id: &str) -> Option<RemoteRow> {
        self.rows
            .lock()
            .get(&(table.to_string(), id.to_string()))
            .cloned()
    }

    /// Number of stored rows.
    pub fn row_count(&self) -> usize {
        self.rows.lock().len()
    }

    /// Calls made so far.
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().clone()
    }

    /// Queues an error for the next call.
    pub fn fail_next(&self, error: SyncError) {
        self.failures.lock().push_back(error);
    }

    /// Sets the connected state.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Delivers a change to every matching subscriber. Returns the number of
    /// subscribers reached.
    pub fn emit(&self, change: &RemoteChange) -> usize {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|(_, tx)| !tx.is_closed());
        subscribers
            .iter()
            .filter(|(filter, _)| filter.matches(change))
            .filter(|(_, tx)| tx.try_send(change.clone()).is_ok())
            .count()
    }

    fn begin(&self, call: RemoteCall) -> SyncResult<()> {
        self.calls.lock().push(call);
        if !self.connected.load(Ordering::SeqCst) {
            return Err(SyncError::NotConnected);
        }
        match self.failures.lock().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Default for MockRemote {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteApi for MockRemote {
    async fn insert(&self, row: RemoteRow) -> SyncResult<()> {
        let id = row.id()?.to_string();
        self.begin(RemoteCall::Insert {
            table: row.table.clone(),
            id: id.clone(),
        })?;
        let mut rows = self.rows.lock();
        let key = (row.table.clone(), id);
        if rows.contains_key(&key) {
            return Err(SyncError::already_exists(key.0, key.1));
        }
        rows.insert(key, row);
        Ok(())
    }

    async fn update(&self, row: RemoteRow) -> SyncResult<()> {
        let id = row.id()?.to_string();
        self.begin(RemoteCall::Update {
            table: row.table.clone(),
            id: id.clone(),
        })?;
        let mut rows = self.rows.lock();
        let key = (row.table.clone(), id);
        match rows.get_mut(&key) {
            Some(existing) => {
                *existing = row;
                Ok(())
            }
            None => Err(SyncError::not_found(key.0, key.1)),
        }
    }

    async fn delete(&self, table: &str, id: &str) -> SyncResult<()> {
        self.begin(RemoteCall::Delete {
            table: table.to_string(),
            id: id.to_string(),
        })?;
        self.rows
            .lock()
            .remove(&(table.to_string(), id.to_string()))
            .map(|_| ())
            .ok_or_else(|| SyncError::not_found(table, id))
    }

    async fn fetch(&self, table: &str, id: &str) -> SyncResult<Option<RemoteRow>> {
        self.begin(RemoteCall::Fetch {
            table: table.to_string(),
            id: id.to_string(),
        })?;
        Ok(self.row(table, id))
    }

    async fn list_for_user(&self, table: &str, user_id: &str) -> SyncResult<Vec<RemoteRow>> {
        self.begin(RemoteCall::List {
            table: table.to_string(),
            user_id: user_id.to_string(),
        })?;
        Ok(self
            .rows
            .lock()
            .values()
            .filter(|row| row.table == table && row.user_id().ok() == Some(user_id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RealtimeSource for MockRemote {
    async fn subscribe(
        &self,
        filter: ChangeFilter,
        capacity: usize,
    ) -> SyncResult<ChangeSubscription> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(SyncError::NotConnected);
        }
        let (tx, rx) = mpsc::channel(capacity.max(1));
        self.subscribers.lock().push((filter.clone(), tx));
        Ok(ChangeSubscription {
            filter,
            receiver: rx,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plansync_model::{Entity, Task};

    fn row(user: &str) -> RemoteRow {
        RemoteRow::from_entity(&Entity::from(Task::new(user, "t"))).unwrap()
    }

    #[tokio::test]
    async fn insert_update_delete() {
        let remote = MockRemote::new();
        let r = row("u1");
        let id = r.id().unwrap().to_string();

        remote.insert(r.clone()).await.unwrap();
        assert!(matches!(
            remote.insert(r.clone()).await,
            Err(SyncError::AlreadyExists { .. })
        ));
        remote.update(r.clone()).await.unwrap();
        remote.delete("tasks", &id).await.unwrap();
        assert!(matches!(
            remote.update(r).await,
            Err(SyncError::NotFound { .. })
        ));
        assert_eq!(remote.calls().len(), 5);
    }

    #[tokio::test]
    async fn scripted_failures_and_disconnect() {
        let remote = MockRemote::new();
        remote.fail_next(SyncError::remote_retryable("503"));
        assert!(remote.insert(row("u1")).await.unwrap_err().is_retryable());
        remote.insert(row("u1")).await.unwrap();

        remote.set_connected(false);
        assert!(matches!(
            remote.fetch("tasks", "x").await,
            Err(SyncError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn list_filters_by_owner() {
        let remote = MockRemote::new();
        remote.seed(row("u1")).unwrap();
        remote.seed(row("u1")).unwrap();
        remote.seed(row("u2")).unwrap();
        assert_eq!(remote.list_for_user("tasks", "u1").await.unwrap().len(), 2);
        assert!(remote.list_for_user("goals", "u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn emit_reaches_matching_subscribers() {
        let remote = MockRemote::new();
        let mut sub = remote
            .subscribe(ChangeFilter::table("public", "tasks").for_user("u1"), 8)
            .await
            .unwrap();

        let mine = RemoteChange::insert("public", "tasks", row("u1").value);
        let theirs = RemoteChange::insert("public", "tasks", row("u2").value);
        assert_eq!(remote.emit(&mine), 1);
        assert_eq!(remote.emit(&theirs), 0);
        assert_eq!(sub.receiver.recv().await, Some(mine));
    }
}
