//! The composite settler.
//!
//! Given a query vector and a set of selected lattices, build a mutual-kNN
//! graph over their representative centroids, pin every representative to
//! the query, and run the same SPD/CG core used at ingest. The outcome is
//! either a context pack with a composite receipt, or a structured
//! abstention.

use serde::{Deserialize, Serialize};
use tracing::debug;

use latticedb_core::{
    CompositeReceipt, Deadline, Decimal17, EngineConfig, GroupId, LatticeId, ReceiptFilters,
    Sha256Hash, RECEIPT_VERSION,
};
use latticedb_solver::{mutual_knn, settle, SettleParams, VectorBlock};

use crate::error::{EngineError, Result};

/// Optional per-compose overrides of the regularizer weights.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LambdaOverrides {
    /// Override λG.
    pub lambda_g: Option<f64>,
    /// Override λC.
    pub lambda_c: Option<f64>,
    /// Override λQ.
    pub lambda_q: Option<f64>,
}

/// Controls for one compose call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComposeOptions {
    /// Abstain floor on the composite energy drop.
    pub epsilon: f64,
    /// Coherence floor on the best per-item contribution.
    pub tau: f64,
    /// Optional λ overrides.
    pub lambda_overrides: Option<LambdaOverrides>,
}

impl Default for ComposeOptions {
    fn default() -> Self {
        Self {
            epsilon: 1e-6,
            tau: 1e-9,
            lambda_overrides: None,
        }
    }
}

/// Why a compose refused to produce a context pack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbstainReason {
    /// The energy drop or the best per-item contribution fell below its
    /// floor.
    WeakCoherence,
    /// ACL filtering left no candidate lattices; nothing was solved.
    AclNoCandidates,
}

impl AbstainReason {
    /// The stable reason string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WeakCoherence => "weak_coherence",
            Self::AclNoCandidates => "acl_no_candidates",
        }
    }
}

/// One item of a context pack, ordered by decreasing contribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextItem {
    /// The contributing lattice.
    pub lattice_id: LatticeId,
    /// Its group.
    pub group_id: GroupId,
    /// Source file provenance from the manifest.
    pub source_file: String,
    /// Display-name overlay, if set.
    pub display_name: Option<String>,
    /// Routing score of the representative against the query.
    pub routing_score: f64,
    /// Pin-energy reduction contributed by this representative.
    pub contribution: f64,
}

/// The ordered, provenance-carrying output of a successful compose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextPack {
    /// Items in decreasing contribution order.
    pub items: Vec<ContextItem>,
}

/// The outcome of a compose call.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposeOutcome {
    /// The context bundle; absent when abstaining.
    pub context_pack: Option<ContextPack>,
    /// The composite receipt; emitted whenever a solve ran.
    pub receipt: Option<CompositeReceipt>,
    /// Abstention reason, if any.
    pub abstain: Option<AbstainReason>,
}

/// A candidate representative entering the composite solve.
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    pub lattice_id: LatticeId,
    pub group_id: GroupId,
    pub source_file: String,
    pub display_name: Option<String>,
    pub routing_score: f64,
    pub centroid: Vec<f32>,
}

/// Settle the composite graph and assemble the outcome.
///
/// `candidates` have already passed ACL filtering and are in routing
/// order; `db_root` is the database root witnessed at compose start.
pub(crate) fn compose_candidates(
    config: &EngineConfig,
    db_root: Sha256Hash,
    candidates: Vec<Candidate>,
    options: &ComposeOptions,
    filters: Option<ReceiptFilters>,
    query: &[f32],
    deadline: Deadline,
) -> Result<ComposeOutcome> {
    if candidates.is_empty() {
        return Err(EngineError::InvalidInput(
            "compose needs at least one candidate".into(),
        ));
    }
    if !(options.epsilon.is_finite() && options.epsilon >= 0.0) {
        return Err(EngineError::InvalidInput("epsilon must be finite and >= 0".into()));
    }
    if !(options.tau.is_finite() && options.tau >= 0.0) {
        return Err(EngineError::InvalidInput("tau must be finite and >= 0".into()));
    }

    let dim = config.dim as usize;
    let overrides = options.lambda_overrides.unwrap_or_default();
    let params = SettleParams {
        lambda_g: overrides.lambda_g.unwrap_or(config.lambda_g.value()),
        lambda_c: overrides.lambda_c.unwrap_or(config.lambda_c.value()),
        lambda_q: overrides.lambda_q.unwrap_or(config.lambda_q.value()),
        tol: config.cg_tol.value(),
        max_iter: config.cg_max_iter,
    };

    // Representative policy is centroid-only: one vertex per lattice.
    let mut raw = Vec::with_capacity(candidates.len() * dim);
    for candidate in &candidates {
        raw.extend_from_slice(&candidate.centroid);
    }
    let block = VectorBlock::from_raw(raw, dim)?;

    // Composite neighbor count, clamped for small candidate sets.
    let k_c = (config.k_c_default as usize).min(block.rows().saturating_sub(1));
    let edges = mutual_knn(&block, k_c);

    // Every representative is pinned to the query.
    let pin_mask = vec![true; block.rows()];
    let settlement = settle(&block, &edges, query, &pin_mask, &params, deadline)?;

    // Per-item contribution: the pin-energy reduction
    // ½·λQ·(‖x_i − q‖² − ‖u_i − q‖²).
    let contributions: Vec<f64> = (0..block.rows())
        .map(|i| {
            let before: f64 = block
                .row(i)
                .iter()
                .zip(query)
                .map(|(&x, &t)| ((x - t) as f64).powi(2))
                .sum();
            let after: f64 = settlement
                .positions
                .row(i)
                .iter()
                .zip(query)
                .map(|(&x, &t)| ((x - t) as f64).powi(2))
                .sum();
            0.5 * params.lambda_q * (before - after)
        })
        .collect();
    let best_contribution = contributions.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    let mut lattice_ids: Vec<LatticeId> = candidates.iter().map(|c| c.lattice_id.clone()).collect();
    lattice_ids.sort();

    let receipt = CompositeReceipt {
        version: RECEIPT_VERSION,
        db_root,
        lattice_ids,
        edge_hash_composite: edges.edge_hash(),
        delta_h_total: Decimal17::new(settlement.delta_h)?,
        cg_iters: settlement.cg_iters,
        final_residual: Decimal17::new(settlement.final_residual)?,
        epsilon: Decimal17::new(options.epsilon)?,
        tau: Decimal17::new(options.tau)?,
        filters,
        model_sha256: config.model_sha256,
        state_sig: Sha256Hash::ZERO,
    }
    .seal()?;

    if settlement.delta_h < options.epsilon || best_contribution < options.tau {
        debug!(
            delta_h = settlement.delta_h,
            best_contribution,
            "composite abstained on weak coherence"
        );
        return Ok(ComposeOutcome {
            context_pack: None,
            receipt: Some(receipt),
            abstain: Some(AbstainReason::WeakCoherence),
        });
    }

    let mut items: Vec<ContextItem> = candidates
        .into_iter()
        .enumerate()
        .map(|(i, candidate)| ContextItem {
            lattice_id: candidate.lattice_id,
            group_id: candidate.group_id,
            source_file: candidate.source_file,
            display_name: candidate.display_name,
            routing_score: candidate.routing_score,
            contribution: contributions[i],
        })
        .collect();
    items.sort_by(|a, b| {
        b.contribution
            .partial_cmp(&a.contribution)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.lattice_id.cmp(&b.lattice_id))
    });

    Ok(ComposeOutcome {
        context_pack: Some(ContextPack { items }),
        receipt: Some(receipt),
        abstain: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abstain_reason_strings() {
        assert_eq!(AbstainReason::WeakCoherence.as_str(), "weak_coherence");
        assert_eq!(AbstainReason::AclNoCandidates.as_str(), "acl_no_candidates");
        assert_eq!(
            serde_json::to_string(&AbstainReason::WeakCoherence).unwrap(),
            "\"weak_coherence\""
        );
    }

    fn candidate(n: u64, centroid: Vec<f32>, score: f64) -> Candidate {
        Candidate {
            lattice_id: LatticeId::from_index(n),
            group_id: GroupId::from_index(1),
            source_file: format!("doc-{n}.txt"),
            display_name: None,
            routing_score: score,
            centroid,
        }
    }

    fn config() -> EngineConfig {
        EngineConfig::new(3, Sha256Hash::hash(b"model@1")).unwrap()
    }

    #[test]
    fn test_compose_aligned_candidates_produces_pack() {
        let cfg = config();
        let query = [1.0f32, 0.0, 0.0];
        let outcome = compose_candidates(
            &cfg,
            Sha256Hash::hash(b"root"),
            vec![
                candidate(1, vec![0.98, 0.17, 0.0], 0.98),
                candidate(2, vec![0.95, 0.0, 0.3], 0.95),
                candidate(3, vec![0.9, 0.3, 0.3], 0.9),
            ],
            &ComposeOptions::default(),
            None,
            &query,
            Deadline::none(),
        )
        .unwrap();

        assert!(outcome.abstain.is_none());
        let pack = outcome.context_pack.unwrap();
        assert_eq!(pack.items.len(), 3);
        assert!(pack
            .items
            .windows(2)
            .all(|w| w[0].contribution >= w[1].contribution));

        let receipt = outcome.receipt.unwrap();
        receipt.verify_state_sig().unwrap();
        assert_eq!(
            receipt.lattice_ids,
            vec![
                LatticeId::from_index(1),
                LatticeId::from_index(2),
                LatticeId::from_index(3)
            ]
        );
        assert!(receipt.delta_h_total.value() > 0.0);
    }

    #[test]
    fn test_compose_weak_coherence_still_emits_receipt() {
        let cfg = config();
        // Near-orthogonal candidates against the query, with an epsilon far
        // above any achievable energy drop.
        let query = [1.0f32, 0.0, 0.0];
        let options = ComposeOptions {
            epsilon: 1e9,
            ..Default::default()
        };
        let outcome = compose_candidates(
            &cfg,
            Sha256Hash::hash(b"root"),
            vec![
                candidate(1, vec![0.0, 1.0, 0.0], 0.0),
                candidate(2, vec![0.0, 0.0, 1.0], 0.0),
            ],
            &options,
            None,
            &query,
            Deadline::none(),
        )
        .unwrap();

        assert_eq!(outcome.abstain, Some(AbstainReason::WeakCoherence));
        assert!(outcome.context_pack.is_none());
        let receipt = outcome.receipt.unwrap();
        receipt.verify_state_sig().unwrap();
        assert_eq!(receipt.epsilon.value(), 1e9);
    }

    #[test]
    fn test_single_candidate_composes() {
        let cfg = config();
        let query = [0.0f32, 1.0, 0.0];
        let outcome = compose_candidates(
            &cfg,
            Sha256Hash::hash(b"root"),
            vec![candidate(1, vec![0.6, 0.8, 0.0], 0.8)],
            &ComposeOptions::default(),
            None,
            &query,
            Deadline::none(),
        )
        .unwrap();

        // |V| = 1 clamps k_c to zero; the composite graph is empty but the
        // pin still pulls the representative toward the query.
        let receipt = outcome.receipt.unwrap();
        assert_eq!(receipt.edge_hash_composite, Sha256Hash::hash(b""));
        assert!(outcome.context_pack.is_some());
    }

    #[test]
    fn test_compose_validates_options() {
        let cfg = config();
        let query = [1.0f32, 0.0, 0.0];
        let bad = ComposeOptions {
            epsilon: f64::NAN,
            ..Default::default()
        };
        let err = compose_candidates(
            &cfg,
            Sha256Hash::hash(b"root"),
            vec![candidate(1, vec![1.0, 0.0, 0.0], 1.0)],
            &bad,
            None,
            &query,
            Deadline::none(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }
}
