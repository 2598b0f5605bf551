//! Storage layer error types
//!
//! Defines all errors that can occur while encoding, decoding and storing
//! values, plus the errors reported by the underlying key-value stores.

use thiserror::Error;

/// Stable message used when a value graph refers back to itself.
pub const CIRCULAR_REFERENCE_MESSAGE: &str =
    "circular reference detected, value cannot be serialized";

/// Errors that can occur in the compressed storage layer
#[derive(Error, Debug)]
pub enum StorageError {
    /// Value contains a cycle and has no JSON representation
    #[error("{}", CIRCULAR_REFERENCE_MESSAGE)]
    CircularReference,

    /// Any other serializer failure
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Stored record is malformed (marker, base64, compressed stream or JSON)
    #[error("Decode error: {0}")]
    Decode(String),

    /// Underlying store refused the write for lack of space
    #[error("Storage full, attempted size: {attempted_size}b")]
    StorageFull { attempted_size: usize },

    /// Any other failure reported by the underlying store, unchanged
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub(crate) fn decode(msg: impl Into<String>) -> Self {
        StorageError::Decode(msg.into())
    }

    /// True for every failure that means "this record cannot be read back".
    pub fn is_decode(&self) -> bool {
        matches!(self, StorageError::Decode(_))
    }
}

/// Errors raised by [`KeyValueStore`](crate::storage::KeyValueStore) implementations
#[derive(Error, Debug)]
pub enum BackendError {
    /// Write would exceed the store's capacity
    #[error("Quota exceeded writing {key:?}: {requested} bytes requested, quota {quota} bytes")]
    QuotaExceeded {
        key: String,
        requested: usize,
        quota: usize,
    },

    /// I/O operation failed
    #[error("Store IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Persisted store file could not be read or written
    #[error("Store serialization error: {0}")]
    Serialization(String),

    /// Lock acquisition failed
    #[error("Store lock error: {0}")]
    Lock(String),
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        BackendError::Serialization(err.to_string())
    }
}

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for key-value store operations
pub type BackendResult<T> = Result<T, BackendError>;
