//! Mutual-kNN graph construction over a vector block.
//!
//! The graph is stored as a flat, deduplicated, sorted edge list; solvers
//! consume it by index iteration, never as linked nodes. The packed form
//! ((u32 i, u32 j) little-endian pairs, i < j, lexicographically sorted)
//! is the preimage of `edge_hash`.

use latticedb_core::Sha256Hash;

use crate::embed::{cosine, VectorBlock};
use crate::error::{Result, SolverError};

/// An undirected edge set over row indices, held sorted with i < j.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeList {
    edges: Vec<(u32, u32)>,
}

impl EdgeList {
    /// Build from raw pairs; normalizes order, sorts, and deduplicates.
    pub fn new(mut edges: Vec<(u32, u32)>) -> Self {
        for e in &mut edges {
            if e.0 > e.1 {
                *e = (e.1, e.0);
            }
        }
        edges.sort_unstable();
        edges.dedup();
        edges.retain(|e| e.0 != e.1);
        Self { edges }
    }

    /// The sorted (i, j) pairs.
    pub fn as_pairs(&self) -> &[(u32, u32)] {
        &self.edges
    }

    /// Number of edges.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Whether the edge set is empty.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Serialize as little-endian u32 pairs, lexicographically sorted.
    pub fn pack(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.edges.len() * 8);
        for &(i, j) in &self.edges {
            buf.extend_from_slice(&i.to_le_bytes());
            buf.extend_from_slice(&j.to_le_bytes());
        }
        buf
    }

    /// Decode the packed form, verifying ordering invariants.
    pub fn from_packed(bytes: &[u8]) -> Result<Self> {
        if bytes.len() % 8 != 0 {
            return Err(SolverError::InvalidInput(
                "edge buffer length must be a multiple of 8".into(),
            ));
        }
        let mut edges = Vec::with_capacity(bytes.len() / 8);
        for pair in bytes.chunks_exact(8) {
            let i = u32::from_le_bytes(pair[0..4].try_into().unwrap());
            let j = u32::from_le_bytes(pair[4..8].try_into().unwrap());
            if i >= j {
                return Err(SolverError::InvalidInput(format!(
                    "edge ({i},{j}) violates i < j"
                )));
            }
            edges.push((i, j));
        }
        if !edges.windows(2).all(|w| w[0] < w[1]) {
            return Err(SolverError::InvalidInput(
                "edge buffer is not strictly sorted".into(),
            ));
        }
        Ok(Self { edges })
    }

    /// SHA-256 over the packed edge buffer.
    pub fn edge_hash(&self) -> Sha256Hash {
        Sha256Hash::hash(&self.pack())
    }

    /// Sorted neighbor lists for n rows.
    pub fn adjacency(&self, n: usize) -> Vec<Vec<u32>> {
        let mut adj = vec![Vec::new(); n];
        for &(i, j) in &self.edges {
            adj[i as usize].push(j);
            adj[j as usize].push(i);
        }
        for list in &mut adj {
            list.sort_unstable();
        }
        adj
    }

    /// Per-row degree for n rows.
    pub fn degrees(&self, n: usize) -> Vec<u32> {
        let mut deg = vec![0u32; n];
        for &(i, j) in &self.edges {
            deg[i as usize] += 1;
            deg[j as usize] += 1;
        }
        deg
    }
}

/// Build the mutual-kNN edge set over a row-normalized block.
///
/// For each row, the k most cosine-similar other rows are selected (ties
/// broken toward the smaller index); (i, j) is an edge iff each appears in
/// the other's selection. When n <= k the graph is complete.
pub fn mutual_knn(block: &VectorBlock, k: usize) -> EdgeList {
    let n = block.rows();
    if n <= 1 {
        return EdgeList::new(Vec::new());
    }

    // Small cohorts are fully connected.
    if n <= k {
        let mut edges = Vec::with_capacity(n * (n - 1) / 2);
        for i in 0..n as u32 {
            for j in (i + 1)..n as u32 {
                edges.push((i, j));
            }
        }
        return EdgeList::new(edges);
    }

    // Directed top-k selections per row.
    let mut selected: Vec<Vec<u32>> = Vec::with_capacity(n);
    for i in 0..n {
        let row_i = block.row(i);
        let mut candidates: Vec<(f32, u32)> = (0..n)
            .filter(|&j| j != i)
            .map(|j| (cosine(row_i, block.row(j)), j as u32))
            .collect();
        // Highest score first; ties toward the smaller index.
        candidates.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.cmp(&b.1))
        });
        candidates.truncate(k);
        let mut picks: Vec<u32> = candidates.into_iter().map(|(_, j)| j).collect();
        picks.sort_unstable();
        selected.push(picks);
    }

    // Keep only mutual pairs.
    let mut edges = Vec::new();
    for (i, picks) in selected.iter().enumerate() {
        for &j in picks {
            let j_us = j as usize;
            if j_us > i && selected[j_us].binary_search(&(i as u32)).is_ok() {
                edges.push((i as u32, j));
            }
        }
    }
    EdgeList::new(edges)
}
