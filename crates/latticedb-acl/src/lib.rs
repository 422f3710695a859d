//! # latticedb ACL
//!
//! Optional capability gating over lattices. Each lattice may carry ACL
//! columns (`acl_tenants`, `acl_roles`, `acl_public`); queries may carry
//! claims (tenant + roles). The filter runs after routing scores are
//! computed and before composing, dropping lattices the caller cannot see.
//!
//! ACL columns are mutable overlays: they never enter a receipt hash.

pub mod claims;
pub mod error;
pub mod filter;

pub use claims::{AclClaims, AclEntry};
pub use error::AclError;
pub use filter::{allows, AclMode};
