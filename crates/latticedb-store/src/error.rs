//! Error types for the store.

use thiserror::Error;

use latticedb_core::CoreError;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Another writer holds the lock on this root.
    #[error("writer lock is held: {0}")]
    Locked(String),

    /// A lattice, group, or file was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Stored data failed to decode.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// A hash, Merkle root, or size check failed. Writes are blocked until
    /// resolved.
    #[error("integrity violation: {0}")]
    Integrity(String),

    /// Error from core canonicalization or receipts.
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
