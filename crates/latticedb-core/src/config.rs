//! Normalized engine configuration.
//!
//! Every knob that affects numerics lives here and enters the Merkle root
//! via `config_hash`. Overlays that do not affect receipts (display names,
//! ACL columns) live outside this structure.

use serde::{Deserialize, Serialize};

use crate::canonical::Decimal17;
use crate::error::CoreError;
use crate::hash::{sha256_canonical, Sha256Hash};

/// Schema version governing store compatibility. A mismatch makes the
/// store not-ready.
pub const SCHEMA_VERSION: u32 = 1;

/// How per-coordinate CG iteration counts are folded into a receipt.
pub const CG_ITER_POLICY_SUM: &str = "sum";

/// How selected lattices are represented in a composite solve.
pub const REPRESENTATIVE_POLICY_CENTROID: &str = "centroid-only";

/// Normalized configuration. Canonical JSON of this structure is the
/// preimage of `config_hash`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Store schema version.
    pub schema_version: u32,
    /// Embedding dimension d.
    pub dim: u32,
    /// Neighbor count k for per-lattice mutual-kNN graphs.
    pub k_neighbors: u32,
    /// Anchor regularizer weight.
    pub lambda_g: Decimal17,
    /// Graph coherence weight.
    pub lambda_c: Decimal17,
    /// Query pin weight.
    pub lambda_q: Decimal17,
    /// CG relative residual tolerance.
    pub cg_tol: Decimal17,
    /// CG iteration cap per coordinate.
    pub cg_max_iter: u32,
    /// "sum": receipts record the total iterations across coordinates.
    pub cg_iter_policy: String,
    /// "centroid-only": one composite vertex per selected lattice.
    pub representative_policy: String,
    /// Default neighbor count for composite graphs, clamped to |V|-1.
    pub k_c_default: u32,
    /// Fingerprint of the embedding model identity (name + revision).
    pub model_sha256: Sha256Hash,
}

impl EngineConfig {
    /// A configuration with reference defaults for the given dimension and
    /// model fingerprint.
    pub fn new(dim: u32, model_sha256: Sha256Hash) -> Result<Self, CoreError> {
        Ok(Self {
            schema_version: SCHEMA_VERSION,
            dim,
            k_neighbors: 8,
            lambda_g: Decimal17::new(1.0)?,
            lambda_c: Decimal17::new(0.5)?,
            lambda_q: Decimal17::new(4.0)?,
            cg_tol: Decimal17::new(1e-6)?,
            cg_max_iter: 128,
            cg_iter_policy: CG_ITER_POLICY_SUM.to_string(),
            representative_policy: REPRESENTATIVE_POLICY_CENTROID.to_string(),
            k_c_default: 4,
            model_sha256,
        })
    }

    /// Validate the invariants the solver and store rely on.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(CoreError::InvalidInput(format!(
                "unsupported schema version {} (expected {})",
                self.schema_version, SCHEMA_VERSION
            )));
        }
        if self.dim == 0 {
            return Err(CoreError::InvalidInput("dim must be >= 1".into()));
        }
        if self.k_neighbors == 0 {
            return Err(CoreError::InvalidInput("k_neighbors must be >= 1".into()));
        }
        for (name, lambda) in [
            ("lambda_g", self.lambda_g),
            ("lambda_c", self.lambda_c),
            ("lambda_q", self.lambda_q),
        ] {
            if lambda.value() <= 0.0 {
                return Err(CoreError::InvalidInput(format!("{name} must be > 0")));
            }
        }
        if self.cg_tol.value() <= 0.0 {
            return Err(CoreError::InvalidInput("cg_tol must be > 0".into()));
        }
        if self.cg_max_iter == 0 {
            return Err(CoreError::InvalidInput("cg_max_iter must be >= 1".into()));
        }
        if self.cg_iter_policy != CG_ITER_POLICY_SUM {
            return Err(CoreError::InvalidInput(format!(
                "unknown cg_iter_policy {:?}",
                self.cg_iter_policy
            )));
        }
        if self.representative_policy != REPRESENTATIVE_POLICY_CENTROID {
            return Err(CoreError::InvalidInput(format!(
                "unknown representative_policy {:?}",
                self.representative_policy
            )));
        }
        if self.k_c_default == 0 {
            return Err(CoreError::InvalidInput("k_c_default must be >= 1".into()));
        }
        Ok(())
    }

    /// SHA-256 over the canonical JSON encoding of this configuration.
    pub fn config_hash(&self) -> Result<Sha256Hash, CoreError> {
        let value =
            serde_json::to_value(self).map_err(|e| CoreError::Json(e.to_string()))?;
        sha256_canonical(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EngineConfig {
        EngineConfig::new(4, Sha256Hash::hash(b"model:test@rev1")).unwrap()
    }

    #[test]
    fn test_defaults_validate() {
        config().validate().unwrap();
    }

    #[test]
    fn test_config_hash_stable() {
        let c = config();
        assert_eq!(c.config_hash().unwrap(), c.config_hash().unwrap());
    }

    #[test]
    fn test_config_hash_tracks_numeric_knobs() {
        let a = config();
        let mut b = config();
        b.cg_max_iter = 256;
        assert_ne!(a.config_hash().unwrap(), b.config_hash().unwrap());

        let mut c = config();
        c.lambda_q = Decimal17::new(8.0).unwrap();
        assert_ne!(a.config_hash().unwrap(), c.config_hash().unwrap());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut c = config();
        c.dim = 0;
        assert!(c.validate().is_err());

        let mut c = config();
        c.lambda_c = Decimal17::new(0.0).unwrap();
        assert!(c.validate().is_err());

        let mut c = config();
        c.schema_version = 99;
        assert!(c.validate().is_err());

        let mut c = config();
        c.cg_iter_policy = "max".into();
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_json_roundtrip() {
        let c = config();
        let s = serde_json::to_string(&c).unwrap();
        let back: EngineConfig = serde_json::from_str(&s).unwrap();
        assert_eq!(c, back);
        assert_eq!(c.config_hash().unwrap(), back.config_hash().unwrap());
    }
}
