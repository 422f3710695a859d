//! Error types for latticedb core primitives.

use thiserror::Error;

/// Errors from canonicalization, identifiers, and receipt computation.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("json error: {0}")]
    Json(String),

    #[error("integrity violation: {0}")]
    Integrity(String),
}
