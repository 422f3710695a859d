//! Receipts: the attestation artifacts of latticedb.
//!
//! A receipt is immutable once sealed. Its `state_sig` is the SHA-256 of
//! the canonical JSON encoding of all other fields; lattice state
//! signatures are the leaves of the database Merkle tree.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::canonical::Decimal17;
use crate::error::CoreError;
use crate::hash::{sha256_canonical, Sha256Hash};
use crate::types::{GroupId, LatticeId};

/// The current receipt schema version.
pub const RECEIPT_VERSION: u32 = 1;

/// Hash a receipt's canonical JSON with the `state_sig` field removed.
fn signing_hash<T: Serialize>(receipt: &T) -> Result<Sha256Hash, CoreError> {
    let mut value =
        serde_json::to_value(receipt).map_err(|e| CoreError::Json(e.to_string()))?;
    match &mut value {
        Value::Object(map) => {
            map.remove("state_sig");
        }
        _ => return Err(CoreError::Json("receipt must encode as an object".into())),
    }
    sha256_canonical(&value)
}

/// Attestation of one sealed micro-lattice build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatticeReceipt {
    /// Receipt schema version.
    pub version: u32,
    /// The sealed lattice.
    pub lattice_id: LatticeId,
    /// Its group.
    pub group_id: GroupId,
    /// Embedding dimension.
    pub dim: u32,
    /// Anchor weight used for the solve.
    pub lambda_g: Decimal17,
    /// Coherence weight used for the solve.
    pub lambda_c: Decimal17,
    /// Pin weight used for the solve.
    pub lambda_q: Decimal17,
    /// SHA-256 over the packed sorted edge buffer.
    pub edge_hash: Sha256Hash,
    /// Energy drop H(X) - H(U*), clamped at zero.
    pub delta_h_total: Decimal17,
    /// Total CG iterations summed across coordinates.
    pub cg_iters: u64,
    /// Maximum final residual across coordinates.
    pub final_residual: Decimal17,
    /// SHA-256 of the source file.
    pub file_sha256: Sha256Hash,
    /// Embedding model fingerprint.
    pub model_sha256: Sha256Hash,
    /// SHA-256 over the canonical JSON of all preceding fields.
    pub state_sig: Sha256Hash,
}

impl LatticeReceipt {
    /// Compute the signature this receipt should carry.
    pub fn compute_state_sig(&self) -> Result<Sha256Hash, CoreError> {
        signing_hash(self)
    }

    /// Fill in `state_sig`, sealing the receipt.
    pub fn seal(mut self) -> Result<Self, CoreError> {
        self.state_sig = self.compute_state_sig()?;
        Ok(self)
    }

    /// Check that the stored signature matches the recomputed one.
    pub fn verify_state_sig(&self) -> Result<(), CoreError> {
        let expected = self.compute_state_sig()?;
        if expected != self.state_sig {
            return Err(CoreError::Integrity(format!(
                "lattice receipt {} state_sig mismatch",
                self.lattice_id
            )));
        }
        Ok(())
    }
}

/// Attestation of the whole database: Merkle root over every sealed
/// lattice's state signature plus the config hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbReceipt {
    /// Receipt schema version.
    pub version: u32,
    /// Merkle root over sorted state sigs and the config hash.
    pub db_root: Sha256Hash,
    /// SHA-256 of the canonical config.
    pub config_hash: Sha256Hash,
    /// Number of sealed lattices.
    pub lattice_count: u64,
    /// Total chunks across sealed lattices.
    pub chunk_count: u64,
}

/// ACL claims bound into a composite receipt when filtering was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptFilters {
    /// The querying tenant, if presented.
    pub tenant: Option<String>,
    /// The querying roles, sorted.
    pub roles: Vec<String>,
}

/// Attestation of one compose call, anchored to the database root
/// witnessed when the query began.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeReceipt {
    /// Receipt schema version.
    pub version: u32,
    /// The DB root read at compose start.
    pub db_root: Sha256Hash,
    /// Selected lattices, sorted ascending.
    pub lattice_ids: Vec<LatticeId>,
    /// SHA-256 over the composite graph's packed edge buffer.
    pub edge_hash_composite: Sha256Hash,
    /// Energy drop of the composite solve.
    pub delta_h_total: Decimal17,
    /// Total CG iterations summed across coordinates.
    pub cg_iters: u64,
    /// Maximum final residual across coordinates.
    pub final_residual: Decimal17,
    /// Abstain floor on the energy drop.
    pub epsilon: Decimal17,
    /// Coherence floor on per-item contribution.
    pub tau: Decimal17,
    /// ACL bindings, if filtering was applied.
    pub filters: Option<ReceiptFilters>,
    /// Embedding model fingerprint.
    pub model_sha256: Sha256Hash,
    /// SHA-256 over the canonical JSON of all preceding fields.
    pub state_sig: Sha256Hash,
}

impl CompositeReceipt {
    /// Compute the signature this receipt should carry.
    pub fn compute_state_sig(&self) -> Result<Sha256Hash, CoreError> {
        signing_hash(self)
    }

    /// Fill in `state_sig`, sealing the receipt.
    pub fn seal(mut self) -> Result<Self, CoreError> {
        self.state_sig = self.compute_state_sig()?;
        Ok(self)
    }

    /// Check that the stored signature matches the recomputed one.
    pub fn verify_state_sig(&self) -> Result<(), CoreError> {
        let expected = self.compute_state_sig()?;
        if expected != self.state_sig {
            return Err(CoreError::Integrity(
                "composite receipt state_sig mismatch".into(),
            ));
        }
        Ok(())
    }
}
