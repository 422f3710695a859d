//! The quadratic energy H whose minimizer is the settled position matrix.
//!
//! H(Y) = ½·[ λG·‖Y−X‖_F² + λC·Σ_(i,j)∈E ‖y_i−y_j‖² + λQ·Σ_i b_i·‖y_i−q‖² ]

use crate::embed::VectorBlock;
use crate::graph::EdgeList;

/// Evaluate H at `y` (row-major n×d, f64) against anchors X, the edge set,
/// and the pin (q, b).
pub fn energy(
    y: &[f64],
    anchors: &VectorBlock,
    edges: &EdgeList,
    pin_target: &[f32],
    pin_mask: &[bool],
    lambda_g: f64,
    lambda_c: f64,
    lambda_q: f64,
) -> f64 {
    let (n, dim) = (anchors.rows(), anchors.dim());
    debug_assert_eq!(y.len(), n * dim);
    debug_assert_eq!(pin_target.len(), dim);
    debug_assert_eq!(pin_mask.len(), n);

    let mut term_anchor = 0.0;
    let mut term_pin = 0.0;
    for i in 0..n {
        let yi = &y[i * dim..(i + 1) * dim];
        let xi = anchors.row(i);
        for j in 0..dim {
            let d = yi[j] - xi[j] as f64;
            term_anchor += d * d;
        }
        if pin_mask[i] {
            for j in 0..dim {
                let d = yi[j] - pin_target[j] as f64;
                term_pin += d * d;
            }
        }
    }

    let mut term_graph = 0.0;
    for &(a, b) in edges.as_pairs() {
        let ya = &y[a as usize * dim..(a as usize + 1) * dim];
        let yb = &y[b as usize * dim..(b as usize + 1) * dim];
        for j in 0..dim {
            let d = ya[j] - yb[j];
            term_graph += d * d;
        }
    }

    0.5 * (lambda_g * term_anchor + lambda_c * term_graph + lambda_q * term_pin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::adapt;

    #[test]
    fn test_energy_at_anchors() {
        let block = adapt(&[vec![1.0, 0.0], vec![0.0, 1.0]], 2).unwrap();
        let edges = EdgeList::new(vec![(0, 1)]);
        let q = [1.0, 0.0];
        let mask = [true, false];

        let x: Vec<f64> = block.as_slice().iter().map(|&v| v as f64).collect();
        let h = energy(&x, &block, &edges, &q, &mask, 1.0, 0.5, 4.0);

        // Anchor term is zero at X; graph term is ‖x0−x1‖² = 2; pin term is
        // zero because row 0 equals q. H = ½·(0.5·2) = 0.5.
        assert!((h - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_energy_terms_scale_with_lambdas() {
        let block = adapt(&[vec![1.0, 0.0], vec![0.0, 1.0]], 2).unwrap();
        let edges = EdgeList::new(vec![(0, 1)]);
        let q = [0.0, 1.0];
        let mask = [true, true];
        let y = vec![0.0; 4];

        let h1 = energy(&y, &block, &edges, &q, &mask, 1.0, 1.0, 1.0);
        let h2 = energy(&y, &block, &edges, &q, &mask, 2.0, 2.0, 2.0);
        assert!((h2 - 2.0 * h1).abs() < 1e-12);
    }

    #[test]
    fn test_energy_nonnegative() {
        let block = adapt(&[vec![1.0, 2.0], vec![-1.0, 0.5], vec![0.3, 0.3]], 2).unwrap();
        let edges = EdgeList::new(vec![(0, 1), (1, 2)]);
        let q = [1.0, 0.0];
        let mask = [true, false, true];
        let y = vec![0.1, -0.4, 0.9, 2.0, -1.0, 0.0];
        let h = energy(&y, &block, &edges, &q, &mask, 1.0, 0.5, 4.0);
        assert!(h >= 0.0);
    }
}
