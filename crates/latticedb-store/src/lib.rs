//! # latticedb Store
//!
//! The append-only persistence layer: sealed lattice directories, the
//! manifest, the router table files, receipts, and the readiness checks
//! that tie them together.
//!
//! ## Disciplines
//!
//! - **Single writer** per database root, enforced by an OS-level
//!   exclusive file lock ([`WriterLock`]).
//! - **Atomic seal**: lattice files land in a temp directory, are fsynced,
//!   and become visible only through a directory rename. Readers never see
//!   a partial lattice.
//! - **Append-only**: sealed directories are never edited or deleted; the
//!   set of sealed lattices grows monotonically.
//! - **Write-once receipts**: `receipt.json` is sealed with the lattice.

pub mod blocks;
pub mod error;
pub mod layout;
pub mod lock;
pub mod manifest;
pub mod migration;
pub mod store;

pub use blocks::{decode_f32, encode_f32, MappedF32};
pub use error::{Result, StoreError};
pub use layout::Layout;
pub use lock::WriterLock;
pub use manifest::{ManifestQuery, ManifestRow, ManifestSort, RouterRow};
pub use store::{Readiness, SealedLattice, Store};
