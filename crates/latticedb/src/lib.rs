//! # latticedb
//!
//! A local-first, verifiable retrieval database. Documents are embedded
//! externally, partitioned into sealed micro-lattices, routed by centroid
//! similarity, and composed into coherent context bundles by minimizing an
//! SPD quadratic energy. Every build and every query emits a receipt; the
//! whole database is attested by a Merkle root over per-lattice state
//! signatures and the normalized configuration.
//!
//! The [`Engine`] is the unified API:
//!
//! - [`Engine::ingest`] - seal a new micro-lattice and update the
//!   attestation
//! - [`Engine::route`] - nearest-K centroid routing with optional ACL
//!   gating
//! - [`Engine::compose`] - settle a composite graph over selected
//!   lattices against a query pin, or abstain
//! - [`Engine::verify`] - check a composite receipt against the stored
//!   database receipt and optional witness receipts

pub mod builder;
pub mod compose;
pub mod engine;
pub mod error;
pub mod router;
pub mod verify;

pub use builder::IngestRequest;
pub use compose::{
    AbstainReason, ComposeOptions, ComposeOutcome, ContextItem, ContextPack, LambdaOverrides,
};
pub use engine::{Engine, EngineOptions, DEFAULT_ROUTE_K};
pub use error::{EngineError, Result};
pub use router::RouteHit;
pub use verify::{verify_composite, Verification};

pub use latticedb_acl::{AclClaims, AclEntry, AclMode};
pub use latticedb_core::{
    Chunk, ChunkRecord, CompositeReceipt, DbReceipt, Deadline, EngineConfig, GroupId,
    LatticeId, LatticeReceipt, Sha256Hash, SourceMeta,
};
pub use latticedb_solver::model_fingerprint;
pub use latticedb_store::{ManifestQuery, ManifestRow, ManifestSort, Readiness};
