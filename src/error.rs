//! Error types for the document store.

use thiserror::Error;

/// Main error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Key absent (or tombstoned). Read paths map this to `Ok(None)`,
    /// delete treats it as a no-op, update surfaces it to the caller.
    #[error("Document not found: {0}")]
    NotFound(String),

    /// A write presented a stale revision token. Recovered by the
    /// conflict-retry executor up to the attempt limit, then surfaced.
    #[error("Revision conflict on document: {0}")]
    Conflict(String),

    #[error("Replication failed: {0}")]
    SyncFailure(String),

    #[error("Maintenance step failed: {0}")]
    MaintenanceFailure(String),

    #[error("Invalid revision token: {0}")]
    InvalidRevision(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Store is locked by another process")]
    Locked,

    #[error("Invalid store format: {0}")]
    InvalidFormat(String),
}

impl StoreError {
    /// Whether this error is an optimistic-concurrency conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }

    /// Whether this error means the document does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::encode::Error> for StoreError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for StoreError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        StoreError::Deserialization(e.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
