//! # latticedb Core
//!
//! Pure primitives for latticedb: canonical JSON, SHA-256 hashing, Merkle
//! attestation, identifiers, configuration, and receipts.
//!
//! This crate contains no I/O, no storage, no solver. It is pure computation
//! over attestable data structures.
//!
//! ## Key Types
//!
//! - [`LatticeReceipt`] - Per-lattice build attestation
//! - [`DbReceipt`] - Whole-database attestation (Merkle root)
//! - [`CompositeReceipt`] - Per-query attestation
//! - [`Sha256Hash`] - Content hash used everywhere
//! - [`EngineConfig`] - Normalized configuration whose canonical hash is a
//!   Merkle leaf
//!
//! ## Canonicalization
//!
//! All hashed artifacts are encoded as canonical JSON. See [`canonical`].
//! Floating-point quantities never enter a hash as IEEE-754 bits; they are
//! canonicalized to fixed-precision decimal strings via [`Decimal17`].

pub mod canonical;
pub mod config;
pub mod deadline;
pub mod error;
pub mod hash;
pub mod merkle;
pub mod receipt;
pub mod types;

pub use canonical::{canonical_bytes, canonical_string, Decimal17};
pub use config::{EngineConfig, SCHEMA_VERSION};
pub use deadline::Deadline;
pub use error::CoreError;
pub use hash::{sha256_canonical, Sha256Hash};
pub use merkle::{db_root, merkle_root};
pub use receipt::{
    CompositeReceipt, DbReceipt, LatticeReceipt, ReceiptFilters, RECEIPT_VERSION,
};
pub use types::{Chunk, ChunkRecord, GroupId, LatticeId, SourceMeta};
