//! ACL column values and query claims.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use latticedb_core::ReceiptFilters;

use crate::error::AclError;

/// The ACL columns attached to a lattice.
///
/// Stored beside the manifest as a mutable overlay; absent columns default
/// to allow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclEntry {
    /// Tenants allowed to see the lattice. The sentinel tenant "public"
    /// opens it to everyone.
    #[serde(default)]
    pub tenants: BTreeSet<String>,
    /// Roles required (any-of) alongside a tenant match.
    #[serde(default)]
    pub roles: BTreeSet<String>,
    /// Fully public lattice.
    #[serde(default)]
    pub public: bool,
}

impl AclEntry {
    /// Decode from the stored JSON column value.
    pub fn from_json(s: &str) -> Result<Self, AclError> {
        serde_json::from_str(s).map_err(|e| AclError::MalformedColumn(e.to_string()))
    }

    /// Encode for the stored JSON column value.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// The claims a query presents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclClaims {
    /// The calling tenant.
    pub tenant: Option<String>,
    /// The calling roles.
    #[serde(default)]
    pub roles: BTreeSet<String>,
}

impl AclClaims {
    /// Claims for a tenant with the given roles.
    pub fn for_tenant(tenant: impl Into<String>, roles: impl IntoIterator<Item = String>) -> Self {
        Self {
            tenant: Some(tenant.into()),
            roles: roles.into_iter().collect(),
        }
    }

    /// The receipt binding for these claims (roles sorted).
    pub fn to_filters(&self) -> ReceiptFilters {
        ReceiptFilters {
            tenant: self.tenant.clone(),
            roles: self.roles.iter().cloned().collect(),
        }
    }
}
