//! Error types for the sync engine.

use plansync_model::ModelError;
use plansync_protocol::ProtocolError;
use plansync_store::StoreError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The remote call failed.
    #[error("remote error: {message}")]
    Remote {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// No network connectivity.
    #[error("not connected to server")]
    NotConnected,

    /// No authenticated session.
    #[error("not authenticated")]
    NotAuthenticated,

    /// The remote has no such row.
    #[error("{table} row {id} not found")]
    NotFound {
        /// Table name.
        table: String,
        /// Row id.
        id: String,
    },

    /// The remote already has a row with this id.
    #[error("{table} row {id} already exists")]
    AlreadyExists {
        /// Table name.
        table: String,
        /// Row id.
        id: String,
    },

    /// The remote refused the write (ownership, validation).
    #[error("rejected by server: {0}")]
    Rejected(String),

    /// Local store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Domain model error.
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    /// Row or change-event mapping error.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// JSON codec error.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// Operation was cancelled.
    #[error("sync cancelled")]
    Cancelled,

    /// Invalid state transition.
    #[error("invalid state transition from {from:?} to {to:?}")]
    InvalidStateTransition {
        /// Current state.
        from: String,
        /// Attempted target state.
        to: String,
    },

    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    Config(String),
}

impl SyncError {
    /// Creates a retryable remote error.
    pub fn remote_retryable(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable remote error.
    pub fn remote_fatal(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
            retryable: false,
        }
    }

    /// Creates a not-found error.
    pub fn not_found(table: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            table: table.into(),
            id: id.into(),
        }
    }

    /// Creates an already-exists error.
    pub fn already_exists(table: impl Into<String>, id: impl Into<String>) -> Self {
        Self::AlreadyExists {
            table: table.into(),
            id: id.into(),
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Remote { retryable, .. } => *retryable,
            SyncError::NotConnected => true,
            _ => false,
        }
    }
}
