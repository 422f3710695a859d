//! The on-disk layout of a database root.
//!
//! ```text
//! <root>/
//!   manifest.sqlite
//!   groups/<group>/<lattice>/{chunks.json, embeds.f32, edges.bin, ustar.f32, receipt.json}
//!   router/{centroids.f32, meta.sqlite}
//!   receipts/{config.json, db_receipt.json}
//!   metadata/names.json
//!   .writer.lock
//! ```

use std::path::{Path, PathBuf};

use latticedb_core::{GroupId, LatticeId};

/// File names inside a sealed lattice directory.
pub const CHUNKS_FILE: &str = "chunks.json";
pub const EMBEDS_FILE: &str = "embeds.f32";
pub const EDGES_FILE: &str = "edges.bin";
pub const USTAR_FILE: &str = "ustar.f32";
pub const RECEIPT_FILE: &str = "receipt.json";

/// Path helpers for a database root.
#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    /// Wrap a root directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The manifest database.
    pub fn manifest_db(&self) -> PathBuf {
        self.root.join("manifest.sqlite")
    }

    /// The groups directory.
    pub fn groups_dir(&self) -> PathBuf {
        self.root.join("groups")
    }

    /// One group's directory.
    pub fn group_dir(&self, group: &GroupId) -> PathBuf {
        self.groups_dir().join(group.as_str())
    }

    /// One sealed lattice's directory.
    pub fn lattice_dir(&self, group: &GroupId, lattice: &LatticeId) -> PathBuf {
        self.group_dir(group).join(lattice.as_str())
    }

    /// The temp directory a lattice is staged in before the seal rename.
    pub fn lattice_tmp_dir(&self, group: &GroupId, lattice: &LatticeId) -> PathBuf {
        self.group_dir(group).join(format!(".tmp-{}", lattice.as_str()))
    }

    /// The router directory.
    pub fn router_dir(&self) -> PathBuf {
        self.root.join("router")
    }

    /// The centroid table file.
    pub fn centroids_file(&self) -> PathBuf {
        self.router_dir().join("centroids.f32")
    }

    /// The router metadata database.
    pub fn router_meta_db(&self) -> PathBuf {
        self.router_dir().join("meta.sqlite")
    }

    /// The receipts directory.
    pub fn receipts_dir(&self) -> PathBuf {
        self.root.join("receipts")
    }

    /// The normalized configuration file.
    pub fn config_file(&self) -> PathBuf {
        self.receipts_dir().join("config.json")
    }

    /// The database receipt file.
    pub fn db_receipt_file(&self) -> PathBuf {
        self.receipts_dir().join("db_receipt.json")
    }

    /// The metadata directory.
    pub fn metadata_dir(&self) -> PathBuf {
        self.root.join("metadata")
    }

    /// The display-name overlay file (not part of the Merkle set).
    pub fn names_file(&self) -> PathBuf {
        self.metadata_dir().join("names.json")
    }

    /// The writer lock file.
    pub fn writer_lock_file(&self) -> PathBuf {
        self.root.join(".writer.lock")
    }
}
