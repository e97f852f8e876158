//! Error types for the reference backend.

use plansync_protocol::ProtocolError;
use plansync_sync::SyncError;
use thiserror::Error;

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors that can occur in the backend.
#[derive(Error, Debug)]
pub enum BackendError {
    /// No row with this id.
    #[error("{table} row {id} not found")]
    NotFound {
        /// Table name.
        table: String,
        /// Row id.
        id: String,
    },

    /// A row with this id already exists.
    #[error("{table} row {id} already exists")]
    AlreadyExists {
        /// Table name.
        table: String,
        /// Row id.
        id: String,
    },

    /// The table is not part of the schema.
    #[error("unknown table: {0}")]
    UnknownTable(String),

    /// The row does not decode as a record of its table.
    #[error("invalid row: {0}")]
    InvalidRow(#[from] ProtocolError),

    /// The access token is missing, tampered or expired.
    #[error("not authorized: {0}")]
    NotAuthorized(String),

    /// The session may not touch this row.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The backend refused the write.
    #[error("rejected: {0}")]
    Rejected(String),

    /// Transient failure; the call may be retried.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// The backend is unreachable.
    #[error("backend offline")]
    Offline,

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl BackendError {
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

    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            BackendError::NotFound { .. }
                | BackendError::AlreadyExists { .. }
                | BackendError::UnknownTable(_)
                | BackendError::InvalidRow(_)
                | BackendError::NotAuthorized(_)
                | BackendError::Forbidden(_)
                | BackendError::Rejected(_)
        )
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            BackendError::Unavailable(_) | BackendError::Offline | BackendError::Internal(_)
        )
    }
}

impl From<BackendError> for SyncError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::NotFound { table, id } => SyncError::NotFound { table, id },
            BackendError::AlreadyExists { table, id } => SyncError::AlreadyExists { table, id },
            BackendError::NotAuthorized(_) => SyncError::NotAuthenticated,
            BackendError::Offline => SyncError::NotConnected,
            BackendError::Unavailable(message) => SyncError::remote_retryable(message),
            BackendError::Internal(message) => SyncError::remote_fatal(message),
            other @ (BackendError::UnknownTable(_)
            | BackendError::InvalidRow(_)
            | BackendError::Forbidden(_)
            | BackendError::Rejected(_)) => SyncError::Rejected(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_classification() {
        assert!(BackendError::not_found("tasks", "t1").is_client_error());
        assert!(BackendError::Unavailable("busy".into()).is_server_error());
        assert!(!BackendError::Forbidden("x".into()).is_server_error());
    }

    #[test]
    fn maps_onto_sync_errors() {
        let err: SyncError = BackendError::Unavailable("503".into()).into();
        assert!(err.is_retryable());

        let err: SyncError = BackendError::Offline.into();
        assert!(matches!(err, SyncError::NotConnected));

        let err: SyncError = BackendError::not_found("tasks", "t1").into();
        assert!(matches!(err, SyncError::NotFound { .. }));

        let err: SyncError = BackendError::Forbidden("not your row".into()).into();
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("not your row"));
    }
}
