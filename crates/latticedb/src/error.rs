//! The engine's error surface.
//!
//! Every failure mode of the public operations is enumerated here and
//! returned as a value. Lower layers map into this taxonomy; nothing is
//! swallowed.

use thiserror::Error;

use latticedb_acl::AclError;
use latticedb_core::CoreError;
use latticedb_solver::SolverError;
use latticedb_store::StoreError;

/// Errors returned by [`crate::Engine`] operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// An unknown lattice, group, or file.
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed caller input; the operation had no side effects.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A vector's length disagrees with the configured dimension.
    #[error("embedding dim mismatch: expected {expected}, got {got}")]
    EmbedDimMismatch { expected: usize, got: usize },

    /// A NaN or Inf appeared during a solve; no receipt was emitted.
    #[error("non-finite value in CG solve: {0}")]
    CgNonFinite(String),

    /// The query path is saturated or the writer lock is held.
    #[error("busy")]
    Busy,

    /// Strict-claims mode rejected a query with absent claims.
    #[error("access denied: strict-claims mode requires claims")]
    AclDenyMissingClaims,

    /// The operation deadline passed; in-flight work was discarded.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// I/O or storage-engine failure.
    #[error("I/O error: {0}")]
    Io(String),

    /// A hash, signature, or Merkle check failed. Writes are blocked until
    /// resolved.
    #[error("integrity violation: {0}")]
    Integrity(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

impl From<CoreError> for EngineError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::InvalidId(msg) | CoreError::InvalidInput(msg) => Self::InvalidInput(msg),
            CoreError::DeadlineExceeded => Self::DeadlineExceeded,
            CoreError::Json(msg) => Self::Integrity(format!("canonical encoding: {msg}")),
            CoreError::Integrity(msg) => Self::Integrity(msg),
        }
    }
}

impl From<SolverError> for EngineError {
    fn from(e: SolverError) -> Self {
        match e {
            SolverError::DimMismatch { expected, got } => Self::EmbedDimMismatch { expected, got },
            SolverError::InvalidInput(msg) => Self::InvalidInput(msg),
            SolverError::NonFinite(msg) => Self::CgNonFinite(msg),
            SolverError::DeadlineExceeded => Self::DeadlineExceeded,
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Database(err) => Self::Io(err.to_string()),
            StoreError::Io(err) => Self::Io(err.to_string()),
            StoreError::Locked(_) => Self::Busy,
            StoreError::NotFound(msg) => Self::NotFound(msg),
            StoreError::InvalidData(msg) => Self::Integrity(msg),
            StoreError::Migration(msg) => Self::Io(msg),
            StoreError::Integrity(msg) => Self::Integrity(msg),
            StoreError::Core(err) => err.into(),
        }
    }
}

impl From<AclError> for EngineError {
    fn from(e: AclError) -> Self {
        match e {
            AclError::DenyMissingClaims => Self::AclDenyMissingClaims,
            AclError::MalformedColumn(msg) => Self::Integrity(msg),
        }
    }
}
