//! The store: append-only lattice directories, manifest, router files, and
//! the database receipt.
//!
//! All mutation happens under the writer lock; readers only ever observe
//! sealed state because every visible artifact arrives via atomic rename.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use rusqlite::Connection;
use tracing::{debug, info};

use latticedb_acl::AclEntry;
use latticedb_core::{
    db_root, ChunkRecord, DbReceipt, EngineConfig, GroupId, LatticeId, LatticeReceipt,
    Sha256Hash, RECEIPT_VERSION,
};

use crate::blocks::{encode_f32, fsync_dir, write_file_atomic, write_file_fsync, MappedF32};
use crate::error::{Result, StoreError};
use crate::layout::{
    Layout, CHUNKS_FILE, EDGES_FILE, EMBEDS_FILE, RECEIPT_FILE, USTAR_FILE,
};
use crate::lock::WriterLock;
use crate::manifest::{
    self, ManifestQuery, ManifestRow, RouterRow,
};
use crate::migration::{migrate_manifest, migrate_router};

/// Everything needed to seal one lattice. Produced by the build pipeline.
#[derive(Debug, Clone)]
pub struct SealedLattice {
    /// Group the lattice belongs to.
    pub group_id: GroupId,
    /// The new lattice id (creation order).
    pub lattice_id: LatticeId,
    /// Chunk records, in row order.
    pub chunks: Vec<ChunkRecord>,
    /// Embedding block, little-endian f32, row-major.
    pub embeds: Vec<u8>,
    /// Packed sorted edge buffer.
    pub edges: Vec<u8>,
    /// Settled positions, little-endian f32, row-major.
    pub ustar: Vec<u8>,
    /// The router centroid for this lattice (the pin target q_L).
    pub centroid: Vec<f32>,
    /// The sealed per-lattice receipt.
    pub receipt: LatticeReceipt,
    /// Source file size in bytes.
    pub file_bytes: u64,
    /// Optional ACL overlay.
    pub acl: Option<AclEntry>,
    /// Optional display name overlay.
    pub display_name: Option<String>,
}

/// Result of the readiness checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Readiness {
    /// True when no problems were found.
    pub ready: bool,
    /// Human-readable problems, empty when ready.
    pub problems: Vec<String>,
    /// Sealed lattice count.
    pub lattice_count: u64,
}

/// Handle to a database root.
#[derive(Debug)]
pub struct Store {
    layout: Layout,
    config: EngineConfig,
    config_hash: Sha256Hash,
}

impl Store {
    /// Initialize a fresh database root.
    ///
    /// Fails if the root already carries a configuration.
    pub fn create(root: impl AsRef<Path>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let layout = Layout::new(root.as_ref());
        if layout.config_file().exists() {
            return Err(StoreError::InvalidData(format!(
                "{} is already initialized",
                layout.root().display()
            )));
        }

        fs::create_dir_all(layout.groups_dir())?;
        fs::create_dir_all(layout.router_dir())?;
        fs::create_dir_all(layout.receipts_dir())?;
        fs::create_dir_all(layout.metadata_dir())?;

        // Tables first, then config last: the config file marks the root
        // as initialized.
        let mut conn = Connection::open(layout.manifest_db())?;
        migrate_manifest(&mut conn)?;
        let mut rconn = Connection::open(layout.router_meta_db())?;
        migrate_router(&mut rconn)?;

        write_file_atomic(&layout.centroids_file(), &[])?;
        write_file_atomic(&layout.names_file(), b"{}")?;

        let config_value =
            serde_json::to_value(&config).map_err(|e| StoreError::InvalidData(e.to_string()))?;
        let config_bytes = latticedb_core::canonical_bytes(&config_value)?;
        write_file_atomic(&layout.config_file(), &config_bytes)?;

        let config_hash = config.config_hash()?;
        let store = Self {
            layout,
            config,
            config_hash,
        };
        store.write_db_receipt(&store.compute_db_receipt(&conn)?)?;

        info!(root = %store.layout.root().display(), "initialized database root");
        Ok(store)
    }

    /// Open an existing database root.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let layout = Layout::new(root.as_ref());
        let config_bytes = fs::read(layout.config_file()).map_err(|e| {
            StoreError::NotFound(format!(
                "config at {}: {e}",
                layout.config_file().display()
            ))
        })?;
        let config: EngineConfig = serde_json::from_slice(&config_bytes)
            .map_err(|e| StoreError::InvalidData(format!("config.json: {e}")))?;
        config.validate()?;
        let config_hash = config.config_hash()?;
        Ok(Self {
            layout,
            config,
            config_hash,
        })
    }

    /// The root layout.
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// The normalized configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// SHA-256 of the canonical configuration.
    pub fn config_hash(&self) -> Sha256Hash {
        self.config_hash
    }

    /// Acquire the single-writer lock for this root, failing fast on
    /// contention.
    pub fn acquire_writer(&self) -> Result<WriterLock> {
        WriterLock::acquire(&self.layout.writer_lock_file())
    }

    /// Acquire the single-writer lock, waiting out a contending writer
    /// until the deadline expires.
    pub fn acquire_writer_with_deadline(&self, deadline: latticedb_core::Deadline) -> Result<WriterLock> {
        WriterLock::acquire_with_deadline(&self.layout.writer_lock_file(), deadline)
    }

    /// Open the manifest database.
    pub fn manifest_conn(&self) -> Result<Connection> {
        let mut conn = Connection::open(self.layout.manifest_db())?;
        migrate_manifest(&mut conn)?;
        Ok(conn)
    }

    /// Open the router-meta database.
    pub fn router_conn(&self) -> Result<Connection> {
        let mut conn = Connection::open(self.layout.router_meta_db())?;
        migrate_router(&mut conn)?;
        Ok(conn)
    }

    /// Allocate the next lattice id. Caller holds the writer lock.
    pub fn next_lattice_id(&self, conn: &Connection) -> Result<LatticeId> {
        Ok(LatticeId::from_index(manifest::next_counter(conn, "lattice")?))
    }

    /// Allocate the next auto-assigned group id. Caller holds the writer
    /// lock.
    pub fn next_group_id(&self, conn: &Connection) -> Result<GroupId> {
        Ok(GroupId::from_index(manifest::next_counter(conn, "group")?))
    }

    /// Seal a lattice: stage, fsync, rename, then update manifest, router,
    /// and the database receipt. Caller holds the writer lock.
    ///
    /// Any staging failure removes the temp directory and leaves no side
    /// effects.
    pub fn seal_lattice(&self, _writer: &WriterLock, sealed: &SealedLattice) -> Result<DbReceipt> {
        sealed.receipt.verify_state_sig()?;
        if sealed.centroid.len() != self.config.dim as usize {
            return Err(StoreError::InvalidData(format!(
                "centroid dim {} != config dim {}",
                sealed.centroid.len(),
                self.config.dim
            )));
        }

        let final_dir = self.layout.lattice_dir(&sealed.group_id, &sealed.lattice_id);
        if final_dir.exists() {
            return Err(StoreError::InvalidData(format!(
                "lattice {} is already sealed",
                sealed.lattice_id
            )));
        }

        let group_dir = self.layout.group_dir(&sealed.group_id);
        fs::create_dir_all(&group_dir)?;

        let tmp_dir = self
            .layout
            .lattice_tmp_dir(&sealed.group_id, &sealed.lattice_id);
        if tmp_dir.exists() {
            fs::remove_dir_all(&tmp_dir)?;
        }
        fs::create_dir_all(&tmp_dir)?;

        let stage = || -> Result<()> {
            let chunks_value = serde_json::to_value(&sealed.chunks)
                .map_err(|e| StoreError::InvalidData(e.to_string()))?;
            let chunks_bytes = latticedb_core::canonical_bytes(&chunks_value)?;
            write_file_fsync(&tmp_dir.join(CHUNKS_FILE), &chunks_bytes)?;
            write_file_fsync(&tmp_dir.join(EMBEDS_FILE), &sealed.embeds)?;
            write_file_fsync(&tmp_dir.join(EDGES_FILE), &sealed.edges)?;
            write_file_fsync(&tmp_dir.join(USTAR_FILE), &sealed.ustar)?;

            let receipt_value = serde_json::to_value(&sealed.receipt)
                .map_err(|e| StoreError::InvalidData(e.to_string()))?;
            let receipt_bytes = latticedb_core::canonical_bytes(&receipt_value)?;
            write_file_fsync(&tmp_dir.join(RECEIPT_FILE), &receipt_bytes)?;
            fsync_dir(&tmp_dir)?;
            Ok(())
        };
        if let Err(e) = stage() {
            let _ = fs::remove_dir_all(&tmp_dir);
            return Err(e);
        }

        fs::rename(&tmp_dir, &final_dir)?;
        fsync_dir(&group_dir)?;
        debug!(lattice = %sealed.lattice_id, group = %sealed.group_id, "lattice directory sealed");

        // Manifest row.
        let conn = self.manifest_conn()?;
        manifest::insert_manifest_row(
            &conn,
            &ManifestRow {
                seq: 0,
                group_id: sealed.group_id.clone(),
                lattice_id: sealed.lattice_id.clone(),
                edge_hash: sealed.receipt.edge_hash,
                delta_h_total: sealed.receipt.delta_h_total,
                created_at: chrono::Utc::now().to_rfc3339(),
                source_file: sealed
                    .chunks
                    .first()
                    .map(|c| c.source_file.clone())
                    .unwrap_or_default(),
                chunk_count: sealed.chunks.len() as u64,
                file_bytes: sealed.file_bytes,
                file_sha256: sealed.receipt.file_sha256,
                state_sig: sealed.receipt.state_sig,
                acl: sealed.acl.clone(),
                display_name: sealed.display_name.clone(),
            },
        )?;

        // Router row plus centroid append, swapped atomically.
        let rconn = self.router_conn()?;
        let row_idx = manifest::router_count(&rconn)?;
        manifest::insert_router_row(
            &rconn,
            &RouterRow {
                row_idx,
                lattice_id: sealed.lattice_id.clone(),
                group_id: sealed.group_id.clone(),
                acl: sealed.acl.clone(),
            },
        )?;
        let mut centroids = match fs::read(self.layout.centroids_file()) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        centroids.extend_from_slice(&encode_f32(&sealed.centroid));
        write_file_atomic(&self.layout.centroids_file(), &centroids)?;

        // The database receipt commits to the new lattice.
        let receipt = self.compute_db_receipt(&conn)?;
        self.write_db_receipt(&receipt)?;
        info!(
            lattice = %sealed.lattice_id,
            lattices = receipt.lattice_count,
            db_root = %receipt.db_root,
            "database receipt recomputed"
        );
        Ok(receipt)
    }

    /// Recompute the database receipt from the manifest.
    pub fn compute_db_receipt(&self, conn: &Connection) -> Result<DbReceipt> {
        let sigs = manifest::manifest_state_sigs(conn)?;
        Ok(DbReceipt {
            version: RECEIPT_VERSION,
            db_root: db_root(&sigs, self.config_hash),
            config_hash: self.config_hash,
            lattice_count: manifest::manifest_count(conn)?,
            chunk_count: manifest::manifest_chunk_total(conn)?,
        })
    }

    fn write_db_receipt(&self, receipt: &DbReceipt) -> Result<()> {
        let value = serde_json::to_value(receipt)
            .map_err(|e| StoreError::InvalidData(e.to_string()))?;
        let bytes = latticedb_core::canonical_bytes(&value)?;
        write_file_atomic(&self.layout.db_receipt_file(), &bytes)
    }

    /// Read the current database receipt.
    pub fn db_receipt(&self) -> Result<DbReceipt> {
        let bytes = fs::read(self.layout.db_receipt_file()).map_err(|e| {
            StoreError::NotFound(format!(
                "db receipt at {}: {e}",
                self.layout.db_receipt_file().display()
            ))
        })?;
        serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::InvalidData(format!("db_receipt.json: {e}")))
    }

    /// Load a sealed lattice's receipt from its directory.
    pub fn load_receipt(&self, lattice: &LatticeId) -> Result<LatticeReceipt> {
        let conn = self.manifest_conn()?;
        let row = manifest::get_manifest_row(&conn, lattice)?
            .ok_or_else(|| StoreError::NotFound(format!("lattice {lattice}")))?;
        let path = self
            .layout
            .lattice_dir(&row.group_id, lattice)
            .join(RECEIPT_FILE);
        let bytes = fs::read(&path)
            .map_err(|e| StoreError::NotFound(format!("{}: {e}", path.display())))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::InvalidData(format!("{}: {e}", path.display())))
    }

    /// Load a sealed lattice's chunk records.
    pub fn load_chunks(&self, lattice: &LatticeId) -> Result<Vec<ChunkRecord>> {
        let conn = self.manifest_conn()?;
        let row = manifest::get_manifest_row(&conn, lattice)?
            .ok_or_else(|| StoreError::NotFound(format!("lattice {lattice}")))?;
        let path = self
            .layout
            .lattice_dir(&row.group_id, lattice)
            .join(CHUNKS_FILE);
        let bytes = fs::read(&path)
            .map_err(|e| StoreError::NotFound(format!("{}: {e}", path.display())))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::InvalidData(format!("{}: {e}", path.display())))
    }

    /// Load a sealed lattice's embedding block.
    pub fn load_embeds(&self, lattice: &LatticeId) -> Result<Vec<f32>> {
        let conn = self.manifest_conn()?;
        let row = manifest::get_manifest_row(&conn, lattice)?
            .ok_or_else(|| StoreError::NotFound(format!("lattice {lattice}")))?;
        let path = self
            .layout
            .lattice_dir(&row.group_id, lattice)
            .join(EMBEDS_FILE);
        let bytes = fs::read(&path)
            .map_err(|e| StoreError::NotFound(format!("{}: {e}", path.display())))?;
        crate::blocks::decode_f32(&bytes)
    }

    /// Map the centroid table for the current router rows.
    pub fn open_centroids(&self, rows: usize) -> Result<MappedF32> {
        MappedF32::open(
            &self.layout.centroids_file(),
            rows,
            self.config.dim as usize,
        )
    }

    /// All router rows in row order.
    pub fn router_rows(&self) -> Result<Vec<RouterRow>> {
        let conn = self.router_conn()?;
        manifest::router_rows(&conn)
    }

    /// Query the manifest.
    pub fn manifest_rows(&self, query: &ManifestQuery) -> Result<Vec<ManifestRow>> {
        let conn = self.manifest_conn()?;
        manifest::query_manifest(&conn, query)
    }

    /// Look up one manifest row.
    pub fn manifest_row(&self, lattice: &LatticeId) -> Result<Option<ManifestRow>> {
        let conn = self.manifest_conn()?;
        manifest::get_manifest_row(&conn, lattice)
    }

    /// Replace the router table wholesale (regeneration of derived state).
    /// Caller holds the writer lock.
    pub fn replace_router(
        &self,
        _writer: &WriterLock,
        rows: &[RouterRow],
        centroids: &[f32],
    ) -> Result<()> {
        if centroids.len() != rows.len() * self.config.dim as usize {
            return Err(StoreError::InvalidData(format!(
                "centroid buffer {} != {} rows x dim {}",
                centroids.len(),
                rows.len(),
                self.config.dim
            )));
        }
        let conn = self.router_conn()?;
        manifest::clear_router(&conn)?;
        for row in rows {
            manifest::insert_router_row(&conn, row)?;
        }
        write_file_atomic(&self.layout.centroids_file(), &encode_f32(centroids))
    }

    /// Update the display-name overlay. Caller holds the writer lock.
    ///
    /// Touches the manifest column and `metadata/names.json`; neither is
    /// attested.
    pub fn set_display_name(
        &self,
        _writer: &WriterLock,
        lattice: &LatticeId,
        name: Option<&str>,
    ) -> Result<()> {
        let conn = self.manifest_conn()?;
        if !manifest::update_display_name(&conn, lattice, name)? {
            return Err(StoreError::NotFound(format!("lattice {lattice}")));
        }

        let mut names = self.display_names()?;
        match name {
            Some(n) => {
                names.insert(lattice.as_str().to_string(), n.to_string());
            }
            None => {
                names.remove(lattice.as_str());
            }
        }
        let bytes = serde_json::to_vec(&names)
            .map_err(|e| StoreError::InvalidData(e.to_string()))?;
        write_file_atomic(&self.layout.names_file(), &bytes)
    }

    /// The display-name overlay.
    pub fn display_names(&self) -> Result<BTreeMap<String, String>> {
        match fs::read(self.layout.names_file()) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| StoreError::InvalidData(format!("names.json: {e}"))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Run the readiness checks: existence and mutual consistency of the
    /// config, manifest, router files, and database receipt.
    pub fn readiness(&self) -> Result<Readiness> {
        let mut problems = Vec::new();

        let conn = self.manifest_conn()?;
        let lattice_count = manifest::manifest_count(&conn)?;

        let rconn = self.router_conn()?;
        let router_count = manifest::router_count(&rconn)?;
        if router_count != lattice_count {
            problems.push(format!(
                "router has {router_count} rows but manifest has {lattice_count} lattices"
            ));
        }

        let manifest_ids: std::collections::BTreeSet<String> =
            manifest::query_manifest(&conn, &ManifestQuery::default())?
                .into_iter()
                .map(|r| r.lattice_id.as_str().to_string())
                .collect();
        for row in manifest::router_rows(&rconn)? {
            if !manifest_ids.contains(row.lattice_id.as_str()) {
                problems.push(format!(
                    "router lattice {} missing from manifest",
                    row.lattice_id
                ));
            }
        }

        let centroid_len = fs::metadata(self.layout.centroids_file())
            .map(|m| m.len())
            .unwrap_or_else(|_| {
                problems.push("centroids.f32 is missing".into());
                0
            });
        let expected = router_count * self.config.dim as u64 * 4;
        if centroid_len != expected {
            problems.push(format!(
                "centroids.f32 is {centroid_len} bytes, expected {expected}"
            ));
        }

        match self.db_receipt() {
            Ok(receipt) => {
                if receipt.config_hash != self.config_hash {
                    problems.push("db receipt config_hash does not match config.json".into());
                }
                let recomputed = self.compute_db_receipt(&conn)?;
                if receipt.db_root != recomputed.db_root {
                    problems.push("db receipt root does not match manifest state".into());
                }
            }
            Err(e) => problems.push(format!("db receipt unreadable: {e}")),
        }

        Ok(Readiness {
            ready: problems.is_empty(),
            problems,
            lattice_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use latticedb_core::{Chunk, Decimal17};

    fn test_config() -> EngineConfig {
        let mut config = EngineConfig::new(2, Sha256Hash::hash(b"model:test@1")).unwrap();
        config.k_neighbors = 2;
        config
    }

    fn make_sealed(store: &Store, n: u64, centroid: [f32; 2]) -> SealedLattice {
        let group_id = GroupId::from_index(1);
        let lattice_id = LatticeId::from_index(n);
        let chunk = Chunk {
            text: format!("chunk {n}"),
            byte_start: 0,
            byte_end: 7,
        };
        let chunks = vec![ChunkRecord {
            group_id: group_id.clone(),
            lattice_id: lattice_id.clone(),
            index: 0,
            text: chunk.text,
            source_file: format!("doc-{n}.txt"),
            file_sha256: Sha256Hash::hash(b"source"),
            byte_start: chunk.byte_start,
            byte_end: chunk.byte_end,
        }];
        let receipt = LatticeReceipt {
            version: RECEIPT_VERSION,
            lattice_id: lattice_id.clone(),
            group_id: group_id.clone(),
            dim: 2,
            lambda_g: store.config().lambda_g,
            lambda_c: store.config().lambda_c,
            lambda_q: store.config().lambda_q,
            edge_hash: Sha256Hash::hash(b""),
            delta_h_total: Decimal17::new(0.0).unwrap(),
            cg_iters: 0,
            final_residual: Decimal17::new(0.0).unwrap(),
            file_sha256: Sha256Hash::hash(b"source"),
            model_sha256: store.config().model_sha256,
            state_sig: Sha256Hash::ZERO,
        }
        .seal()
        .unwrap();

        SealedLattice {
            group_id,
            lattice_id,
            chunks,
            embeds: encode_f32(&centroid),
            edges: Vec::new(),
            ustar: encode_f32(&centroid),
            centroid: centroid.to_vec(),
            receipt,
            file_bytes: 128,
            acl: None,
            display_name: None,
        }
    }

    #[test]
    fn test_create_then_open() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::create(dir.path(), test_config()).unwrap();
        let receipt = store.db_receipt().unwrap();
        assert_eq!(receipt.lattice_count, 0);
        // Empty database: the root is just the config hash leaf.
        assert_eq!(receipt.db_root, store.config_hash());

        let reopened = Store::open(dir.path()).unwrap();
        assert_eq!(reopened.config(), store.config());
        assert_eq!(reopened.config_hash(), store.config_hash());
    }

    #[test]
    fn test_create_rejects_initialized_root() {
        let dir = tempfile::tempdir().unwrap();
        Store::create(dir.path(), test_config()).unwrap();
        assert!(Store::create(dir.path(), test_config()).is_err());
    }

    #[test]
    fn test_seal_updates_manifest_router_and_receipt() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::create(dir.path(), test_config()).unwrap();
        let writer = store.acquire_writer().unwrap();

        let sealed = make_sealed(&store, 1, [1.0, 0.0]);
        let db = store.seal_lattice(&writer, &sealed).unwrap();
        assert_eq!(db.lattice_count, 1);
        assert_eq!(db.chunk_count, 1);

        let rows = store.manifest_rows(&ManifestQuery::default()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].lattice_id, sealed.lattice_id);
        assert_eq!(rows[0].state_sig, sealed.receipt.state_sig);

        let router = store.router_rows().unwrap();
        assert_eq!(router.len(), 1);
        assert_eq!(router[0].row_idx, 0);

        let centroids = store.open_centroids(1).unwrap();
        let mut row = [0.0f32; 2];
        centroids.read_row(0, &mut row);
        assert_eq!(row, [1.0, 0.0]);

        // The sealed directory has all five files.
        let lattice_dir = store
            .layout()
            .lattice_dir(&sealed.group_id, &sealed.lattice_id);
        for file in [CHUNKS_FILE, EMBEDS_FILE, EDGES_FILE, USTAR_FILE, RECEIPT_FILE] {
            assert!(lattice_dir.join(file).exists(), "missing {file}");
        }

        // No temp directory left behind.
        assert!(!store
            .layout()
            .lattice_tmp_dir(&sealed.group_id, &sealed.lattice_id)
            .exists());
    }

    #[test]
    fn test_seal_is_append_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::create(dir.path(), test_config()).unwrap();
        let writer = store.acquire_writer().unwrap();

        let sealed = make_sealed(&store, 1, [1.0, 0.0]);
        store.seal_lattice(&writer, &sealed).unwrap();
        assert!(matches!(
            store.seal_lattice(&writer, &sealed),
            Err(StoreError::InvalidData(_))
        ));
    }

    #[test]
    fn test_db_root_changes_per_seal() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::create(dir.path(), test_config()).unwrap();
        let writer = store.acquire_writer().unwrap();

        let root0 = store.db_receipt().unwrap().db_root;
        store
            .seal_lattice(&writer, &make_sealed(&store, 1, [1.0, 0.0]))
            .unwrap();
        let root1 = store.db_receipt().unwrap().db_root;
        store
            .seal_lattice(&writer, &make_sealed(&store, 2, [0.0, 1.0]))
            .unwrap();
        let root2 = store.db_receipt().unwrap().db_root;

        assert_ne!(root0, root1);
        assert_ne!(root1, root2);
    }

    #[test]
    fn test_load_receipt_and_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::create(dir.path(), test_config()).unwrap();
        let writer = store.acquire_writer().unwrap();
        let sealed = make_sealed(&store, 1, [0.6, 0.8]);
        store.seal_lattice(&writer, &sealed).unwrap();

        let receipt = store.load_receipt(&sealed.lattice_id).unwrap();
        assert_eq!(receipt, sealed.receipt);
        receipt.verify_state_sig().unwrap();

        let chunks = store.load_chunks(&sealed.lattice_id).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "chunk 1");

        let embeds = store.load_embeds(&sealed.lattice_id).unwrap();
        assert_eq!(embeds, vec![0.6, 0.8]);

        assert!(matches!(
            store.load_receipt(&LatticeId::from_index(99)),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_readiness_on_healthy_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::create(dir.path(), test_config()).unwrap();
        let writer = store.acquire_writer().unwrap();
        store
            .seal_lattice(&writer, &make_sealed(&store, 1, [1.0, 0.0]))
            .unwrap();

        let readiness = store.readiness().unwrap();
        assert!(readiness.ready, "problems: {:?}", readiness.problems);
        assert_eq!(readiness.lattice_count, 1);
    }

    #[test]
    fn test_readiness_detects_truncated_centroids() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::create(dir.path(), test_config()).unwrap();
        let writer = store.acquire_writer().unwrap();
        store
            .seal_lattice(&writer, &make_sealed(&store, 1, [1.0, 0.0]))
            .unwrap();

        fs::write(store.layout().centroids_file(), [0u8; 4]).unwrap();
        let readiness = store.readiness().unwrap();
        assert!(!readiness.ready);
        assert!(readiness
            .problems
            .iter()
            .any(|p| p.contains("centroids.f32")));
    }

    #[test]
    fn test_display_name_overlay() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::create(dir.path(), test_config()).unwrap();
        let writer = store.acquire_writer().unwrap();
        let sealed = make_sealed(&store, 1, [1.0, 0.0]);
        store.seal_lattice(&writer, &sealed).unwrap();

        let root_before = store.db_receipt().unwrap().db_root;
        store
            .set_display_name(&writer, &sealed.lattice_id, Some("Quarterly Report"))
            .unwrap();

        let names = store.display_names().unwrap();
        assert_eq!(
            names.get(sealed.lattice_id.as_str()).map(String::as_str),
            Some("Quarterly Report")
        );
        let row = store.manifest_row(&sealed.lattice_id).unwrap().unwrap();
        assert_eq!(row.display_name.as_deref(), Some("Quarterly Report"));

        // Overlay updates never touch the attested root.
        assert_eq!(store.db_receipt().unwrap().db_root, root_before);

        store
            .set_display_name(&writer, &sealed.lattice_id, None)
            .unwrap();
        assert!(store.display_names().unwrap().is_empty());
    }
}
