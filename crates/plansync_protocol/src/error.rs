//! Error types for protocol mapping.

use plansync_model::ModelError;
use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while mapping remote rows and change events.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Row could not be (de)serialized.
    #[error("row codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// A required column is absent or has the wrong JSON type.
    #[error("missing or malformed column: {0}")]
    MissingColumn(&'static str),

    /// A change event carried no record snapshot.
    #[error("change event for {table} has no record snapshot")]
    MissingSnapshot {
        /// Table of the event.
        table: String,
    },

    /// A timestamp column could not be parsed.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// Domain-level error (unknown table, bad enum code).
    #[error(transparent)]
    Model(#[from] ModelError),
}
