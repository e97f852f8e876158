//! Error types for the local store.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in the local store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The journal is corrupted.
    #[error("journal corrupted: {0}")]
    Corrupted(String),

    /// A journal entry could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// Another process holds the store directory.
    #[error("store directory is locked by another process")]
    Locked,

    /// The store path is missing or not a directory.
    #[error("invalid store path: {0}")]
    InvalidPath(String),

    /// A record was rejected before being written.
    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

impl StoreError {
    /// Creates a corruption error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted(message.into())
    }

    /// Creates a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec(message.into())
    }
}
