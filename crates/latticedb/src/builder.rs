//! The lattice build pipeline.
//!
//! Turns externally supplied chunks and vectors into a sealable lattice:
//! adapt and normalize the block, derive the pin (q_L, b_L), build the
//! mutual-kNN graph, settle, and assemble the receipt. The store then
//! seals the result atomically.

use tracing::debug;

use latticedb_core::{
    Chunk, ChunkRecord, Deadline, EngineConfig, GroupId, LatticeId, LatticeReceipt,
    SourceMeta, RECEIPT_VERSION,
};
use latticedb_core::canonical::Decimal17;
use latticedb_acl::AclEntry;
use latticedb_solver::{
    centroid_unit, mutual_knn, pin_mask_top_fraction, settle, SettleParams,
};
use latticedb_store::{encode_f32, SealedLattice};

use crate::error::{EngineError, Result};

/// Fraction of rows pinned to the lattice centroid at build time.
const PIN_FRACTION: f64 = 0.1;

/// One ingest call: chunks, their vectors, and provenance.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    /// Target group; auto-assigned when absent.
    pub group_id: Option<GroupId>,
    /// Ordered text chunks.
    pub chunks: Vec<Chunk>,
    /// One embedding vector per chunk, in the same order.
    pub vectors: Vec<Vec<f32>>,
    /// Source file provenance.
    pub source: SourceMeta,
    /// Optional ACL overlay for the new lattice.
    pub acl: Option<AclEntry>,
    /// Optional display name overlay.
    pub display_name: Option<String>,
}

/// Build a sealable lattice from an ingest request.
pub(crate) fn build_sealed_lattice(
    config: &EngineConfig,
    group_id: GroupId,
    lattice_id: LatticeId,
    request: &IngestRequest,
    deadline: Deadline,
) -> Result<SealedLattice> {
    if request.chunks.is_empty() {
        return Err(EngineError::InvalidInput("ingest needs at least one chunk".into()));
    }
    if request.chunks.len() != request.vectors.len() {
        return Err(EngineError::InvalidInput(format!(
            "{} chunks but {} vectors",
            request.chunks.len(),
            request.vectors.len()
        )));
    }
    deadline.check()?;

    let dim = config.dim as usize;
    let block = latticedb_solver::adapt(&request.vectors, dim)?;

    let pin_target = centroid_unit(&block);
    let pin_mask = pin_mask_top_fraction(&block, &pin_target, PIN_FRACTION);
    let edges = mutual_knn(&block, config.k_neighbors as usize);
    debug!(
        lattice = %lattice_id,
        rows = block.rows(),
        edges = edges.len(),
        pinned = pin_mask.iter().filter(|&&m| m).count(),
        "lattice graph built"
    );

    let params = SettleParams {
        lambda_g: config.lambda_g.value(),
        lambda_c: config.lambda_c.value(),
        lambda_q: config.lambda_q.value(),
        tol: config.cg_tol.value(),
        max_iter: config.cg_max_iter,
    };
    let settlement = settle(&block, &edges, &pin_target, &pin_mask, &params, deadline)?;

    let receipt = LatticeReceipt {
        version: RECEIPT_VERSION,
        lattice_id: lattice_id.clone(),
        group_id: group_id.clone(),
        dim: config.dim,
        lambda_g: config.lambda_g,
        lambda_c: config.lambda_c,
        lambda_q: config.lambda_q,
        edge_hash: edges.edge_hash(),
        delta_h_total: Decimal17::new(settlement.delta_h)?,
        cg_iters: settlement.cg_iters,
        final_residual: Decimal17::new(settlement.final_residual)?,
        file_sha256: request.source.file_sha256,
        model_sha256: config.model_sha256,
        state_sig: latticedb_core::Sha256Hash::ZERO,
    }
    .seal()?;

    let chunks = request
        .chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| ChunkRecord {
            group_id: group_id.clone(),
            lattice_id: lattice_id.clone(),
            index: i as u32,
            text: chunk.text.clone(),
            source_file: request.source.source_file.clone(),
            file_sha256: request.source.file_sha256,
            byte_start: chunk.byte_start,
            byte_end: chunk.byte_end,
        })
        .collect();

    Ok(SealedLattice {
        group_id,
        lattice_id,
        chunks,
        embeds: encode_f32(block.as_slice()),
        edges: edges.pack(),
        ustar: encode_f32(settlement.positions.as_slice()),
        centroid: pin_target,
        receipt,
        file_bytes: request.source.file_bytes,
        acl: request.acl.clone(),
        display_name: request.display_name.clone(),
    })
}
