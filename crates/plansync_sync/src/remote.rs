//! Remote backend abstraction.

use crate::error::SyncResult;
use async_trait::async_trait;
use plansync_protocol::{ChangeFilter, RemoteChange, RemoteRow};
use tokio::sync::mpsc;

/// Table-level access to the remote backend.
///
/// This trait abstracts the network layer so the engine can run against a
/// hosted backend, the in-process reference backend, or a test double.
///
/// Implementations map backend failures onto [`SyncError`](crate::SyncError):
/// `NotFound` for a missing row on update/delete, `AlreadyExists` for a
/// duplicate insert, `Remote { retryable }` for transport failures.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Inserts a row into `row.table`.
    async fn insert(&self, row: RemoteRow) -> SyncResult<()>;

    /// Replaces an existing row in `row.table`.
    async fn update(&self, row: RemoteRow) -> SyncResult<()>;

    /// Deletes a row by id.
    async fn delete(&self, table: &str, id: &str) -> SyncResult<()>;

    /// Fetches a row by id.
    async fn fetch(&self, table: &str, id: &str) -> SyncResult<Option<RemoteRow>>;

    /// Lists every row of a table owned by `user_id`.
    async fn list_for_user(&self, table: &str, user_id: &str) -> SyncResult<Vec<RemoteRow>>;
}

/// Source of realtime change events.
#[async_trait]
pub trait RealtimeSource: Send + Sync {
    /// Opens a subscription for the changes matching `filter`, buffering up
    /// to `capacity` undelivered events.
    async fn subscribe(
        &self,
        filter: ChangeFilter,
        capacity: usize,
    ) -> SyncResult<ChangeSubscription>;
}

/// An open realtime subscription.
///
/// Dropping the receiver ends the subscription on the source side.
#[derive(Debug)]
pub struct ChangeSubscription {
    /// The filter the subscription was opened with.
    pub filter: ChangeFilter,
    /// Matching change events, in commit order.
    pub receiver: mpsc::Receiver<RemoteChange>,
}

/// An authenticated user session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Authenticated user id.
    pub user_id: String,
    /// Bearer token for the backend.
    pub access_token: String,
}

impl Session {
    /// Creates a session.
    pub fn new(user_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            access_token: access_token.into(),
        }
    }
}
