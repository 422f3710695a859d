//! The Engine: unified API for latticedb.
//!
//! Brings together the store, the solver core, the router, and ACL gating
//! behind the transport-neutral operations: ingest, route, compose,
//! verify, manifest queries, and overlays.
//!
//! Concurrency model: builds serialize under the store's writer lock;
//! queries run against immutable router snapshots and pass through a
//! bounded in-flight gate that fails fast with `Busy` on overload.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::path::Path;

use tracing::{debug, info};

use latticedb_acl::{allows, AclClaims, AclMode};
use latticedb_core::{
    ChunkRecord, Deadline, DbReceipt, EngineConfig, LatticeId, LatticeReceipt,
};
use latticedb_solver::{adapt, centroid_unit, VectorBlock};
use latticedb_store::{ManifestQuery, ManifestRow, Readiness, RouterRow, Store};

use crate::builder::{build_sealed_lattice, IngestRequest};
use crate::compose::{
    compose_candidates, AbstainReason, Candidate, ComposeOptions, ComposeOutcome,
};
use crate::error::{EngineError, Result};
use crate::router::{RouteHit, RouterSnapshot};
use crate::verify::{verify_composite, Verification};

/// Default number of lattices returned by routing.
pub const DEFAULT_ROUTE_K: usize = 8;

/// Engine construction options.
#[derive(Debug, Clone, Copy)]
pub struct EngineOptions {
    /// Maximum concurrent queries before `Busy`.
    pub max_in_flight: usize,
    /// How absent ACL claims are treated.
    pub acl_mode: AclMode,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_in_flight: 64,
            acl_mode: AclMode::Permissive,
        }
    }
}

/// Bounded in-flight counter for the query path.
#[derive(Debug)]
struct QueryGate {
    active: AtomicUsize,
    limit: usize,
}

struct GateGuard<'a> {
    gate: &'a QueryGate,
}

impl QueryGate {
    fn new(limit: usize) -> Self {
        Self {
            active: AtomicUsize::new(0),
            limit: limit.max(1),
        }
    }

    fn try_acquire(&self) -> Result<GateGuard<'_>> {
        let previous = self.active.fetch_add(1, Ordering::SeqCst);
        if previous >= self.limit {
            self.active.fetch_sub(1, Ordering::SeqCst);
            return Err(EngineError::Busy);
        }
        Ok(GateGuard { gate: self })
    }
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        self.gate.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// The main engine handle.
pub struct Engine {
    store: Store,
    options: EngineOptions,
    router: RwLock<Option<Arc<RouterSnapshot>>>,
    gate: QueryGate,
}

impl Engine {
    /// Initialize a fresh database root and open it.
    pub fn create(
        root: impl AsRef<Path>,
        config: EngineConfig,
        options: EngineOptions,
    ) -> Result<Self> {
        let store = Store::create(root, config)?;
        Ok(Self::with_store(store, options))
    }

    /// Open an existing database root.
    pub fn open(root: impl AsRef<Path>, options: EngineOptions) -> Result<Self> {
        let store = Store::open(root)?;
        Ok(Self::with_store(store, options))
    }

    fn with_store(store: Store, options: EngineOptions) -> Self {
        let gate = QueryGate::new(options.max_in_flight);
        Self {
            store,
            options,
            router: RwLock::new(None),
            gate,
        }
    }

    /// The normalized configuration.
    pub fn config(&self) -> &EngineConfig {
        self.store.config()
    }

    /// The underlying store.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Normalize a caller query vector against the configured dimension.
    fn unit_query(&self, query: &[f32]) -> Result<Vec<f32>> {
        let block = adapt(&[query.to_vec()], self.config().dim as usize)?;
        Ok(block.row(0).to_vec())
    }

    /// The router snapshot consistent with the current database receipt.
    ///
    /// Swapped atomically whenever the database root changes; in-flight
    /// queries keep their own `Arc` and never see a torn view.
    fn snapshot(&self) -> Result<Arc<RouterSnapshot>> {
        let current_root = self.store.db_receipt()?.db_root;
        {
            let cached = self
                .router
                .read()
                .map_err(|_| EngineError::Io("router cache poisoned".into()))?;
            if let Some(snapshot) = cached.as_ref() {
                if snapshot.db_root == current_root {
                    return Ok(Arc::clone(snapshot));
                }
            }
        }

        let mut cached = self
            .router
            .write()
            .map_err(|_| EngineError::Io("router cache poisoned".into()))?;
        if let Some(snapshot) = cached.as_ref() {
            if snapshot.db_root == current_root {
                return Ok(Arc::clone(snapshot));
            }
        }
        let fresh = Arc::new(RouterSnapshot::load(&self.store)?);
        *cached = Some(Arc::clone(&fresh));
        Ok(fresh)
    }

    fn invalidate_router(&self) {
        if let Ok(mut cached) = self.router.write() {
            *cached = None;
        }
    }

    /// Strict-claims mode rejects claimless queries before any routing.
    fn check_strict_claims(&self, claims: Option<&AclClaims>) -> Result<()> {
        if self.options.acl_mode == AclMode::StrictClaims && claims.is_none() {
            return Err(EngineError::AclDenyMissingClaims);
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Ingest
    // ─────────────────────────────────────────────────────────────────────

    /// Build and seal a new micro-lattice, updating the manifest, the
    /// router, and the database receipt.
    pub fn ingest(&self, request: IngestRequest, deadline: Deadline) -> Result<LatticeReceipt> {
        deadline.check()?;
        // Concurrent builds serialize here; manifest append order equals
        // lock-acquire order.
        let writer = self.store.acquire_writer_with_deadline(deadline)?;
        let conn = self.store.manifest_conn()?;

        let group_id = match &request.group_id {
            Some(group) => group.clone(),
            None => self.store.next_group_id(&conn)?,
        };
        let lattice_id = self.store.next_lattice_id(&conn)?;
        drop(conn);

        let sealed = build_sealed_lattice(
            self.config(),
            group_id,
            lattice_id,
            &request,
            deadline,
        )?;
        deadline.check()?;

        let db = self.store.seal_lattice(&writer, &sealed)?;
        self.invalidate_router();
        info!(
            lattice = %sealed.lattice_id,
            chunks = sealed.chunks.len(),
            db_root = %db.db_root,
            "lattice ingested"
        );
        Ok(sealed.receipt)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Query
    // ─────────────────────────────────────────────────────────────────────

    /// Route a query vector to its nearest-K lattices by centroid score.
    pub fn route(
        &self,
        query: &[f32],
        k: Option<usize>,
        claims: Option<&AclClaims>,
        deadline: Deadline,
    ) -> Result<Vec<RouteHit>> {
        let _guard = self.gate.try_acquire()?;
        deadline.check()?;
        self.check_strict_claims(claims)?;

        let unit = self.unit_query(query)?;
        let snapshot = self.snapshot()?;
        if snapshot.is_empty() {
            return Ok(Vec::new());
        }

        let mut visible = vec![false; snapshot.len()];
        for (idx, row) in snapshot.rows.iter().enumerate() {
            visible[idx] = allows(row.acl.as_ref(), claims, self.options.acl_mode)?;
        }

        deadline.check()?;
        Ok(snapshot.top_k(&unit, k.unwrap_or(DEFAULT_ROUTE_K), |idx| visible[idx]))
    }

    /// Compose a context bundle over the selected lattices, or abstain.
    pub fn compose(
        &self,
        query: &[f32],
        lattice_ids: &[LatticeId],
        options: &ComposeOptions,
        claims: Option<&AclClaims>,
        deadline: Deadline,
    ) -> Result<ComposeOutcome> {
        let _guard = self.gate.try_acquire()?;
        deadline.check()?;
        self.check_strict_claims(claims)?;
        if lattice_ids.is_empty() {
            return Err(EngineError::InvalidInput(
                "compose needs at least one lattice id".into(),
            ));
        }

        let unit = self.unit_query(query)?;
        // The receipt anchors to the database root witnessed here, even if
        // a concurrent build advances the store mid-query.
        let snapshot = self.snapshot()?;

        let mut seen = std::collections::BTreeSet::new();
        let mut candidates = Vec::new();
        for lattice_id in lattice_ids {
            if !seen.insert(lattice_id.clone()) {
                continue;
            }
            let row = snapshot
                .row_for(lattice_id)
                .ok_or_else(|| EngineError::NotFound(format!("lattice {lattice_id}")))?;
            if !allows(row.acl.as_ref(), claims, self.options.acl_mode)? {
                continue;
            }

            let manifest_row = self
                .store
                .manifest_row(lattice_id)?
                .ok_or_else(|| EngineError::NotFound(format!("lattice {lattice_id}")))?;
            let centroid = snapshot.centroid(row.row_idx as usize);
            let routing_score: f64 = centroid
                .iter()
                .zip(&unit)
                .map(|(&c, &q)| c as f64 * q as f64)
                .sum();
            candidates.push(Candidate {
                lattice_id: lattice_id.clone(),
                group_id: row.group_id.clone(),
                source_file: manifest_row.source_file,
                display_name: manifest_row.display_name,
                routing_score,
                centroid,
            });
        }

        if candidates.is_empty() {
            debug!("every selected lattice was filtered by ACL");
            return Ok(ComposeOutcome {
                context_pack: None,
                receipt: None,
                abstain: Some(AbstainReason::AclNoCandidates),
            });
        }

        compose_candidates(
            self.config(),
            snapshot.db_root,
            candidates,
            options,
            claims.map(AclClaims::to_filters),
            &unit,
            deadline,
        )
    }

    /// Verify a composite receipt against the stored database receipt.
    pub fn verify(
        &self,
        composite: &latticedb_core::CompositeReceipt,
        witnesses: Option<&[LatticeReceipt]>,
    ) -> Result<Verification> {
        let stored = self.store.db_receipt()?;
        Ok(verify_composite(composite, witnesses, &stored))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Inspection
    // ─────────────────────────────────────────────────────────────────────

    /// The current database receipt.
    pub fn db_receipt(&self) -> Result<DbReceipt> {
        Ok(self.store.db_receipt()?)
    }

    /// Query manifest rows.
    pub fn manifest(&self, query: &ManifestQuery) -> Result<Vec<ManifestRow>> {
        Ok(self.store.manifest_rows(query)?)
    }

    /// Load a sealed lattice's receipt (usable as a verification witness).
    pub fn lattice_receipt(&self, lattice: &LatticeId) -> Result<LatticeReceipt> {
        Ok(self.store.load_receipt(lattice)?)
    }

    /// Load a sealed lattice's chunk records, for rendering context-pack
    /// items downstream.
    pub fn lattice_chunks(&self, lattice: &LatticeId) -> Result<Vec<ChunkRecord>> {
        Ok(self.store.load_chunks(lattice)?)
    }

    /// Run the store readiness checks.
    pub fn readiness(&self) -> Result<Readiness> {
        Ok(self.store.readiness()?)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Overlays & derived state
    // ─────────────────────────────────────────────────────────────────────

    /// Set or clear a display name. A non-attested overlay: the database
    /// root is unchanged.
    pub fn set_display_name(
        &self,
        lattice: &LatticeId,
        name: Option<&str>,
        deadline: Deadline,
    ) -> Result<()> {
        deadline.check()?;
        let writer = self.store.acquire_writer_with_deadline(deadline)?;
        Ok(self.store.set_display_name(&writer, lattice, name)?)
    }

    /// Regenerate the router table from sealed lattices.
    ///
    /// The centroid table is derived state; this rebuilds it row by row in
    /// manifest creation order.
    pub fn rebuild_router(&self, deadline: Deadline) -> Result<()> {
        deadline.check()?;
        let writer = self.store.acquire_writer_with_deadline(deadline)?;
        let rows = self.store.manifest_rows(&ManifestQuery::default())?;

        let dim = self.config().dim as usize;
        let mut router_rows = Vec::with_capacity(rows.len());
        let mut centroids = Vec::with_capacity(rows.len() * dim);
        for (idx, row) in rows.iter().enumerate() {
            let embeds = self.store.load_embeds(&row.lattice_id)?;
            let block = VectorBlock::from_raw(embeds, dim)?;
            centroids.extend(centroid_unit(&block));
            router_rows.push(RouterRow {
                row_idx: idx as u64,
                lattice_id: row.lattice_id.clone(),
                group_id: row.group_id.clone(),
                acl: row.acl.clone(),
            });
        }

        self.store.replace_router(&writer, &router_rows, &centroids)?;
        self.invalidate_router();
        info!(rows = router_rows.len(), "router table rebuilt");
        Ok(())
    }
}
