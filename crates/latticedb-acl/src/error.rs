//! Error types for ACL evaluation.

use thiserror::Error;

/// Errors from capability gating.
#[derive(Debug, Error)]
pub enum AclError {
    /// Strict-claims mode is on and the caller presented no claims.
    #[error("access denied: strict-claims mode requires claims")]
    DenyMissingClaims,

    /// A stored ACL column could not be decoded.
    #[error("malformed ACL column: {0}")]
    MalformedColumn(String),
}
