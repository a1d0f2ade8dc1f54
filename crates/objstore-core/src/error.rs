//! Driver error types

use thiserror::Error;

/// Errors that can occur during object store operations.
///
/// This is the only error kind the repository surfaces; driver failures
/// propagate through it unchanged.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DriverError {
    /// No object store with this name exists in the database
    #[error("object store not found: {0}")]
    StoreNotFound(String),

    /// No index with this name exists on the store
    #[error("index '{index}' not found on store '{store}'")]
    IndexNotFound { store: String, index: String },

    /// A record with this key already exists
    #[error("key {key} already exists in store '{store}'")]
    AlreadyExists { store: String, key: String },

    /// No record with this key exists
    #[error("key {key} not found in store '{store}'")]
    NotFound { store: String, key: String },

    /// A unique index already holds the record's index value
    #[error("unique index '{index}' violated in store '{store}'")]
    ConstraintViolation { store: String, index: String },

    /// Value is not a valid store key, or a key range is malformed
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Invalid database model
    #[error("invalid schema: {0}")]
    Schema(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Storage backend error (engine, connection, transaction)
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<serde_json::Error> for DriverError {
    fn from(err: serde_json::Error) -> Self {
        DriverError::Serialization(err.to_string())
    }
}

/// Result type for driver and repository operations
pub type DriverResult<T> = Result<T, DriverError>;
