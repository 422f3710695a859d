//! Error types for the solver.

use thiserror::Error;

/// Errors from the embedding adapter and the SPD/CG core.
#[derive(Debug, Error)]
pub enum SolverError {
    /// A vector's length disagrees with the configured dimension.
    #[error("embedding dim mismatch: expected {expected}, got {got}")]
    DimMismatch { expected: usize, got: usize },

    /// Structurally invalid input (empty block, bad mask length, ...).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A NaN or Inf appeared during the solve; the build is aborted and no
    /// receipt is emitted.
    #[error("non-finite value in CG solve: {0}")]
    NonFinite(String),

    /// The operation deadline passed; the in-flight iterate is discarded.
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

/// Result type for solver operations.
pub type Result<T> = std::result::Result<T, SolverError>;
