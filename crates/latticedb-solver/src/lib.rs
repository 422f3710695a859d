//! # latticedb Solver
//!
//! The numeric core of latticedb: the embedding-space adapter, the
//! mutual-kNN graph builder, and the SPD energy model with its
//! Jacobi-preconditioned conjugate-gradient solver.
//!
//! The same settle core runs per lattice at ingest and across candidate
//! representatives at compose time. All of it is deterministic: neighbor
//! lists are sorted, iteration order is ascending by index, and the only
//! parallelism is across independent output coordinates.

pub mod cg;
pub mod embed;
pub mod energy;
pub mod error;
pub mod graph;
pub mod settle;
pub mod spd;

pub use cg::CgOutcome;
pub use embed::{adapt, centroid_unit, model_fingerprint, pin_mask_top_fraction, VectorBlock};
pub use energy::energy;
pub use error::SolverError;
pub use graph::{mutual_knn, EdgeList};
pub use settle::{settle, SettleParams, Settlement};
pub use spd::SpdSystem;
