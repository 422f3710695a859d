//! The centroid router.
//!
//! A [`RouterSnapshot`] is an immutable view of the centroid table and its
//! parallel metadata, tagged with the database root it was read under.
//! Snapshots are swapped atomically when the root changes, so a query is
//! always consistent with some database receipt and never a torn view.

use tracing::debug;

use latticedb_core::{LatticeId, Sha256Hash};
use latticedb_store::{MappedF32, RouterRow, Store};

use crate::error::Result;

/// One routing result: a lattice and its centroid score against the query.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteHit {
    /// The routed lattice.
    pub lattice_id: LatticeId,
    /// Cosine score of its centroid against the query.
    pub score: f64,
}

/// An immutable view of the router state under one database root.
#[derive(Debug)]
pub struct RouterSnapshot {
    /// The database root this snapshot was loaded under.
    pub db_root: Sha256Hash,
    /// Meta rows, parallel to the centroid table.
    pub rows: Vec<RouterRow>,
    centroids: MappedF32,
}

impl RouterSnapshot {
    /// Load the current router state from the store.
    pub fn load(store: &Store) -> Result<Self> {
        let receipt = store.db_receipt()?;
        let rows = store.router_rows()?;
        let centroids = store.open_centroids(rows.len())?;
        debug!(rows = rows.len(), db_root = %receipt.db_root, "router snapshot loaded");
        Ok(Self {
            db_root: receipt.db_root,
            rows,
            centroids,
        })
    }

    /// Number of routable lattices.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether there is anything to route to.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Copy the centroid for row `idx`.
    pub fn centroid(&self, idx: usize) -> Vec<f32> {
        let mut out = vec![0.0f32; self.centroids.dim()];
        self.centroids.read_row(idx, &mut out);
        out
    }

    /// The row for a given lattice id, if routable.
    pub fn row_for(&self, lattice: &LatticeId) -> Option<&RouterRow> {
        self.rows.iter().find(|r| &r.lattice_id == lattice)
    }

    /// Score every visible row against the unit query and return the top-k
    /// by score, ties broken toward the smaller row index. `k` is clamped
    /// to `[1, N]`.
    pub fn top_k<F>(&self, query: &[f32], k: usize, visible: F) -> Vec<RouteHit>
    where
        F: Fn(usize) -> bool,
    {
        if self.rows.is_empty() {
            return Vec::new();
        }
        let k = k.clamp(1, self.rows.len());

        let mut scored: Vec<(f64, usize)> = (0..self.rows.len())
            .filter(|&idx| visible(idx))
            .map(|idx| (self.centroids.dot_row(idx, query), idx))
            .collect();
        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.cmp(&b.1))
        });
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(score, idx)| RouteHit {
                lattice_id: self.rows[idx].lattice_id.clone(),
                score,
            })
            .collect()
    }
}
