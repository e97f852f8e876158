//! Error types for the model crate.

use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while building or decoding domain records.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// A table name does not map to any entity type.
    #[error("unknown table: {0}")]
    UnknownTable(String),

    /// A numeric code does not map to an enum variant.
    #[error("invalid {kind} code: {code}")]
    InvalidCode {
        /// Name of the enum being decoded.
        kind: &'static str,
        /// The offending code.
        code: i64,
    },

    /// A field value is outside its allowed range.
    #[error("invalid value for {field}: {message}")]
    InvalidField {
        /// Field name.
        field: &'static str,
        /// What is wrong with it.
        message: String,
    },
}

impl ModelError {
    /// Creates an invalid code error.
    pub fn invalid_code(kind: &'static str, code: i64) -> Self {
        Self::InvalidCode { kind, code }
    }

    /// Creates an invalid field error.
    pub fn invalid_field(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            message: message.into(),
        }
    }
}
