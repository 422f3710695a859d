//! Embedding space adapter.
//!
//! Vectors are produced by an external embedding collaborator; this module
//! accepts them, rejects dimension mismatches, normalizes rows to unit L2,
//! and derives the model fingerprint recorded in receipts.

use latticedb_core::Sha256Hash;

use crate::error::{Result, SolverError};

/// Norm floor guarding the division in normalization.
const NORM_EPS: f32 = 1e-12;

/// Fingerprint of an embedding model identity string (name + revision).
pub fn model_fingerprint(identity: &str) -> Sha256Hash {
    Sha256Hash::hash(identity.as_bytes())
}

/// A row-major block of n unit-normalized d-dimensional f32 vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorBlock {
    data: Vec<f32>,
    n: usize,
    dim: usize,
}

impl VectorBlock {
    /// Wrap an already-normalized raw buffer. Length must be n*dim.
    pub fn from_raw(data: Vec<f32>, dim: usize) -> Result<Self> {
        if dim == 0 {
            return Err(SolverError::InvalidInput("dim must be >= 1".into()));
        }
        if data.len() % dim != 0 {
            return Err(SolverError::InvalidInput(format!(
                "buffer length {} is not a multiple of dim {dim}",
                data.len()
            )));
        }
        let n = data.len() / dim;
        Ok(Self { data, n, dim })
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.n
    }

    /// Dimension of each row.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// The i-th row.
    pub fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.dim..(i + 1) * self.dim]
    }

    /// The whole buffer, row-major.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

/// Adapt raw caller vectors into a unit-normalized block.
///
/// Fails with [`SolverError::DimMismatch`] when any vector's length
/// disagrees with `dim`.
pub fn adapt(vectors: &[Vec<f32>], dim: usize) -> Result<VectorBlock> {
    if dim == 0 {
        return Err(SolverError::InvalidInput("dim must be >= 1".into()));
    }
    if vectors.is_empty() {
        return Err(SolverError::InvalidInput(
            "a lattice needs at least one vector".into(),
        ));
    }

    let mut data = Vec::with_capacity(vectors.len() * dim);
    for v in vectors {
        if v.len() != dim {
            return Err(SolverError::DimMismatch {
                expected: dim,
                got: v.len(),
            });
        }
        let norm = v.iter().map(|&x| (x as f64) * (x as f64)).sum::<f64>().sqrt() as f32;
        let denom = norm.max(NORM_EPS);
        data.extend(v.iter().map(|&x| x / denom));
    }
    VectorBlock::from_raw(data, dim)
}

/// Cosine similarity of two unit rows (a plain dot product).
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(&x, &y)| x * y).sum()
}

/// The unit-normalized centroid of a block: the pin target q_L.
pub fn centroid_unit(block: &VectorBlock) -> Vec<f32> {
    let (n, dim) = (block.rows(), block.dim());
    let mut mean = vec![0.0f64; dim];
    for i in 0..n {
        for (j, &x) in block.row(i).iter().enumerate() {
            mean[j] += x as f64;
        }
    }
    let inv = 1.0 / n as f64;
    for m in &mut mean {
        *m *= inv;
    }
    let norm = mean.iter().map(|&x| x * x).sum::<f64>().sqrt();
    let denom = norm.max(NORM_EPS as f64);
    mean.iter().map(|&x| (x / denom) as f32).collect()
}

/// Pin mask: the top ceil(fraction * n) rows by cosine to `target`, ties
/// broken toward the smaller index, never fewer than one row.
pub fn pin_mask_top_fraction(block: &VectorBlock, target: &[f32], fraction: f64) -> Vec<bool> {
    let n = block.rows();
    let count = ((fraction * n as f64).ceil() as usize).clamp(1, n);

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        let sa = cosine(block.row(a), target);
        let sb = cosine(block.row(b), target);
        sb.partial_cmp(&sa)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });

    let mut mask = vec![false; n];
    for &i in order.iter().take(count) {
        mask[i] = true;
    }
    mask
}
