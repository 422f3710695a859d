//! The allow decision.

use crate::claims::{AclClaims, AclEntry};
use crate::error::AclError;

/// How absent claims are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AclMode {
    /// Absent claims behave like empty claims.
    #[default]
    Permissive,
    /// Absent claims fail the whole operation.
    StrictClaims,
}

/// Decide whether a lattice is visible to a caller.
///
/// A lattice with no ACL entry is visible to everyone. Otherwise it is
/// visible iff it is public, lists the sentinel tenant "public", or lists
/// the caller's tenant and shares at least one role with the caller.
pub fn allows(
    entry: Option<&AclEntry>,
    claims: Option<&AclClaims>,
    mode: AclMode,
) -> Result<bool, AclError> {
    if mode == AclMode::StrictClaims && claims.is_none() {
        return Err(AclError::DenyMissingClaims);
    }

    let entry = match entry {
        Some(e) => e,
        None => return Ok(true),
    };

    if entry.public || entry.tenants.contains("public") {
        return Ok(true);
    }

    let claims = match claims {
        Some(c) => c,
        None => return Ok(false),
    };
    let tenant = match &claims.tenant {
        Some(t) => t,
        None => return Ok(false),
    };

    Ok(entry.tenants.contains(tenant) && !entry.roles.is_disjoint(&claims.roles))
}
