//! Jacobi-preconditioned conjugate gradients for one output coordinate.
//!
//! Columns are independent, so the caller may solve them in parallel;
//! within a column everything is strictly sequential and deterministic.

use latticedb_core::Deadline;

use crate::error::{Result, SolverError};
use crate::spd::SpdSystem;

/// Result of a single-column CG solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CgOutcome {
    /// Iterations performed.
    pub iters: u32,
    /// Euclidean norm of the final residual.
    pub residual: f64,
    /// Whether the tolerance was met before the iteration cap.
    pub converged: bool,
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    let mut acc = 0.0;
    for i in 0..a.len() {
        acc += a[i] * b[i];
    }
    acc
}

fn norm(a: &[f64]) -> f64 {
    dot(a, a).sqrt()
}

/// Solve M·x = rhs with warm start `x0`.
///
/// Terminates when the residual norm drops to `tol · max(1, ‖rhs‖)` or
/// after `max_iter` iterations; hitting the cap is a soft outcome (the
/// last iterate is returned with `converged = false`). Any NaN/Inf aborts
/// with [`SolverError::NonFinite`]. The deadline is checked at iteration
/// boundaries; expiry discards the iterate.
pub fn solve_column(
    system: &SpdSystem,
    rhs: &[f64],
    x0: &[f64],
    tol: f64,
    max_iter: u32,
    deadline: Deadline,
) -> Result<(Vec<f64>, CgOutcome)> {
    let n = system.n();
    if rhs.len() != n || x0.len() != n {
        return Err(SolverError::InvalidInput(format!(
            "rhs/x0 length must be {n}"
        )));
    }

    let threshold = tol * norm(rhs).max(1.0);
    let inv_diag: Vec<f64> = system.jacobi().iter().map(|&d| 1.0 / d).collect();

    let mut x = x0.to_vec();
    let mut r = vec![0.0; n];
    system.apply(&x, &mut r);
    for i in 0..n {
        r[i] = rhs[i] - r[i];
    }

    let mut rnorm = norm(&r);
    if !rnorm.is_finite() {
        return Err(SolverError::NonFinite("initial residual".into()));
    }
    if rnorm <= threshold {
        return Ok((
            x,
            CgOutcome {
                iters: 0,
                residual: rnorm,
                converged: true,
            },
        ));
    }

    let mut z: Vec<f64> = (0..n).map(|i| r[i] * inv_diag[i]).collect();
    let mut p = z.clone();
    let mut rz = dot(&r, &z);
    let mut ap = vec![0.0; n];

    for iter in 1..=max_iter {
        if deadline.expired() {
            return Err(SolverError::DeadlineExceeded);
        }

        system.apply(&p, &mut ap);
        let pap = dot(&p, &ap);
        if !(pap.is_finite() && pap > 0.0) {
            return Err(SolverError::NonFinite(format!(
                "curvature pᵀMp = {pap} at iteration {iter}"
            )));
        }
        let alpha = rz / pap;

        for i in 0..n {
            x[i] += alpha * p[i];
            r[i] -= alpha * ap[i];
        }

        rnorm = norm(&r);
        if !rnorm.is_finite() {
            return Err(SolverError::NonFinite(format!(
                "residual at iteration {iter}"
            )));
        }
        if rnorm <= threshold {
            return Ok((
                x,
                CgOutcome {
                    iters: iter,
                    residual: rnorm,
                    converged: true,
                },
            ));
        }

        for i in 0..n {
            z[i] = r[i] * inv_diag[i];
        }
        let rz_next = dot(&r, &z);
        let beta = rz_next / rz;
        if !beta.is_finite() {
            return Err(SolverError::NonFinite(format!("beta at iteration {iter}")));
        }
        for i in 0..n {
            p[i] = z[i] + beta * p[i];
        }
        rz = rz_next;
    }

    Ok((
        x,
        CgOutcome {
            iters: max_iter,
            residual: rnorm,
            converged: false,
        },
    ))
}
