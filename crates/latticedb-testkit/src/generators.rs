//! Proptest strategies for solver inputs.

use proptest::prelude::*;

/// A d-dimensional vector with entries in [-1, 1], excluding the all-zero
/// corner case.
pub fn unit_vector(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0, dim)
        .prop_filter("needs a nonzero entry", |v| {
            v.iter().any(|&x| x.abs() > 1e-3)
        })
}

/// Between `min_rows` and `max_rows` vectors of the given dimension.
pub fn vector_rows(
    dim: usize,
    min_rows: usize,
    max_rows: usize,
) -> impl Strategy<Value = Vec<Vec<f32>>> {
    proptest::collection::vec(unit_vector(dim), min_rows..=max_rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use latticedb_core::Deadline;
    use latticedb_solver::{
        adapt, centroid_unit, mutual_knn, pin_mask_top_fraction, settle, SettleParams,
    };

    fn params() -> SettleParams {
        SettleParams {
            lambda_g: 1.0,
            lambda_c: 0.5,
            lambda_q: 4.0,
            tol: 1e-6,
            max_iter: 128,
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_adapted_rows_are_unit_norm(rows in vector_rows(4, 1, 10)) {
            let block = adapt(&rows, 4).unwrap();
            for i in 0..block.rows() {
                let norm: f64 = block.row(i).iter()
                    .map(|&x| x as f64 * x as f64)
                    .sum::<f64>()
                    .sqrt();
                prop_assert!((norm - 1.0).abs() <= 1e-6);
            }
        }

        #[test]
        fn prop_settle_never_raises_energy(rows in vector_rows(4, 2, 10)) {
            let block = adapt(&rows, 4).unwrap();
            let q = centroid_unit(&block);
            let mask = pin_mask_top_fraction(&block, &q, 0.1);
            let edges = mutual_knn(&block, 2);
            let settlement =
                settle(&block, &edges, &q, &mask, &params(), Deadline::none()).unwrap();

            prop_assert!(settlement.delta_h >= 0.0);
            prop_assert!(settlement.final_residual.is_finite());
            prop_assert!(settlement
                .positions
                .as_slice()
                .iter()
                .all(|v| v.is_finite()));
        }

        #[test]
        fn prop_pin_mask_size(rows in vector_rows(4, 1, 20)) {
            let block = adapt(&rows, 4).unwrap();
            let q = centroid_unit(&block);
            let mask = pin_mask_top_fraction(&block, &q, 0.1);
            let expected = ((0.1 * block.rows() as f64).ceil() as usize).max(1);
            prop_assert_eq!(mask.iter().filter(|&&m| m).count(), expected);
        }
    }
}
