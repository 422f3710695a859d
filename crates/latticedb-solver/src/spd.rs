//! The SPD system M = λG·I + λC·L + λQ·diag(b).
//!
//! The graph Laplacian L is applied implicitly through the edge list's
//! neighbor structure; M is never materialized as a dense matrix. M is
//! symmetric positive-definite for λG, λC, λQ > 0, which is what makes
//! conjugate gradients applicable.

use crate::error::{Result, SolverError};
use crate::graph::EdgeList;

/// An implicit SPD operator over n rows.
#[derive(Debug, Clone)]
pub struct SpdSystem {
    lambda_g: f64,
    lambda_c: f64,
    lambda_q: f64,
    adjacency: Vec<Vec<u32>>,
    pin: Vec<bool>,
    /// Jacobi diagonal: λG + λC·deg(i) + λQ·b_i.
    diag: Vec<f64>,
}

impl SpdSystem {
    /// Assemble the operator for a graph and pin mask.
    pub fn new(
        n: usize,
        edges: &EdgeList,
        pin_mask: &[bool],
        lambda_g: f64,
        lambda_c: f64,
        lambda_q: f64,
    ) -> Result<Self> {
        if n == 0 {
            return Err(SolverError::InvalidInput("system must have n >= 1".into()));
        }
        if pin_mask.len() != n {
            return Err(SolverError::InvalidInput(format!(
                "pin mask length {} != n {n}",
                pin_mask.len()
            )));
        }
        for (name, lambda) in [
            ("lambda_g", lambda_g),
            ("lambda_c", lambda_c),
            ("lambda_q", lambda_q),
        ] {
            if !(lambda.is_finite() && lambda > 0.0) {
                return Err(SolverError::InvalidInput(format!(
                    "{name} must be finite and > 0, got {lambda}"
                )));
            }
        }
        if let Some(max_idx) = edges.as_pairs().iter().map(|&(_, j)| j).max() {
            if max_idx as usize >= n {
                return Err(SolverError::InvalidInput(format!(
                    "edge index {max_idx} out of range for n {n}"
                )));
            }
        }

        let degrees = edges.degrees(n);
        let diag = (0..n)
            .map(|i| {
                lambda_g
                    + lambda_c * degrees[i] as f64
                    + if pin_mask[i] { lambda_q } else { 0.0 }
            })
            .collect();

        Ok(Self {
            lambda_g,
            lambda_c,
            lambda_q,
            adjacency: edges.adjacency(n),
            pin: pin_mask.to_vec(),
            diag,
        })
    }

    /// Number of rows.
    pub fn n(&self) -> usize {
        self.diag.len()
    }

    /// The pin mask b.
    pub fn pin(&self) -> &[bool] {
        &self.pin
    }

    /// The Jacobi preconditioner diagonal.
    pub fn jacobi(&self) -> &[f64] {
        &self.diag
    }

    /// out = M·x. Iterates rows in ascending order with sorted neighbor
    /// lists, so the floating-point grouping is fixed.
    pub fn apply(&self, x: &[f64], out: &mut [f64]) {
        debug_assert_eq!(x.len(), self.n());
        debug_assert_eq!(out.len(), self.n());
        for i in 0..self.n() {
            let mut neighbor_sum = 0.0;
            for &j in &self.adjacency[i] {
                neighbor_sum += x[j as usize];
            }
            out[i] = self.diag[i] * x[i] - self.lambda_c * neighbor_sum;
        }
    }

    /// Right-hand side for output coordinate j: r = λG·X[:,j] + λQ·b·q_j.
    pub fn rhs_column(&self, x_col: &[f64], q_j: f64) -> Vec<f64> {
        debug_assert_eq!(x_col.len(), self.n());
        (0..self.n())
            .map(|i| {
                self.lambda_g * x_col[i] + if self.pin[i] { self.lambda_q * q_j } else { 0.0 }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn system() -> SpdSystem {
        // Path graph 0-1-2, middle row pinned.
        let edges = EdgeList::new(vec![(0, 1), (1, 2)]);
        SpdSystem::new(3, &edges, &[false, true, false], 1.0, 0.5, 4.0).unwrap()
    }

    #[test]
    fn test_jacobi_diagonal() {
        let s = system();
        // λG + λC·deg + λQ·b
        assert_eq!(s.jacobi(), &[1.5, 6.0, 1.5]);
    }

    #[test]
    fn test_apply_matches_dense_form() {
        let s = system();
        let x = [1.0, 2.0, 3.0];
        let mut out = [0.0; 3];
        s.apply(&x, &mut out);
        // Row 0: 1.5*1 - 0.5*2 = 0.5
        // Row 1: 6.0*2 - 0.5*(1+3) = 10.0
        // Row 2: 1.5*3 - 0.5*2 = 3.5
        assert_eq!(out, [0.5, 10.0, 3.5]);
    }

    #[test]
    fn test_apply_is_symmetric() {
        let s = system();
        let x = [1.0, -2.0, 0.5];
        let y = [0.3, 0.7, -1.1];
        let mut mx = [0.0; 3];
        let mut my = [0.0; 3];
        s.apply(&x, &mut mx);
        s.apply(&y, &mut my);
        let xtmy: f64 = x.iter().zip(&my).map(|(a, b)| a * b).sum();
        let ytmx: f64 = y.iter().zip(&mx).map(|(a, b)| a * b).sum();
        assert!((xtmy - ytmx).abs() < 1e-12);
    }

    #[test]
    fn test_apply_positive_definite_on_samples() {
        let s = system();
        for x in [[1.0, 0.0, 0.0], [1.0, 1.0, 1.0], [-1.0, 2.0, -3.0]] {
            let mut mx = [0.0; 3];
            s.apply(&x, &mut mx);
            let quad: f64 = x.iter().zip(&mx).map(|(a, b)| a * b).sum();
            assert!(quad > 0.0, "xᵀMx should be positive, got {quad}");
        }
    }

    #[test]
    fn test_rhs_column() {
        let s = system();
        let rhs = s.rhs_column(&[0.1, 0.2, 0.3], 0.5);
        assert_eq!(rhs, vec![0.1, 0.2 + 4.0 * 0.5, 0.3]);
    }

    #[test]
    fn test_rejects_bad_inputs() {
        let edges = EdgeList::new(vec![(0, 1)]);
        assert!(SpdSystem::new(0, &edges, &[], 1.0, 1.0, 1.0).is_err());
        assert!(SpdSystem::new(2, &edges, &[true], 1.0, 1.0, 1.0).is_err());
        assert!(SpdSystem::new(2, &edges, &[true, false], 0.0, 1.0, 1.0).is_err());
        assert!(SpdSystem::new(1, &edges, &[true], 1.0, 1.0, 1.0).is_err());
    }
}
