//! The verification protocol.
//!
//! A composite receipt is checked in three steps: its own state signature
//! recomputes; an optional witness set of lattice receipts reproduces the
//! stored Merkle root; and its anchored root matches the stored database
//! receipt. Each step has a stable failure reason.

use latticedb_core::{db_root, CompositeReceipt, DbReceipt, LatticeReceipt, Sha256Hash};

/// Stable reason strings.
pub const REASON_OK: &str = "ok";
pub const REASON_STATE_SIG: &str = "state_sig_mismatch";
pub const REASON_MERKLE_ROOT: &str = "merkle_root_mismatch";
pub const REASON_DB_ROOT: &str = "db_root_mismatch";

/// The result of a verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    /// True when every step passed.
    pub verified: bool,
    /// `ok`, or the first failing step's reason.
    pub reason: String,
}

impl Verification {
    fn ok() -> Self {
        Self {
            verified: true,
            reason: REASON_OK.to_string(),
        }
    }

    fn fail(reason: &str) -> Self {
        Self {
            verified: false,
            reason: reason.to_string(),
        }
    }
}

/// Verify a composite receipt against the stored database receipt and an
/// optional witness set.
pub fn verify_composite(
    composite: &CompositeReceipt,
    witnesses: Option<&[LatticeReceipt]>,
    stored: &DbReceipt,
) -> Verification {
    // Step 1: the composite receipt's own signature.
    match composite.compute_state_sig() {
        Ok(sig) if sig == composite.state_sig => {}
        _ => return Verification::fail(REASON_STATE_SIG),
    }

    // Step 2: witnesses must be internally consistent and reproduce the
    // stored Merkle root.
    if let Some(witnesses) = witnesses {
        let mut sigs: Vec<Sha256Hash> = Vec::with_capacity(witnesses.len());
        for witness in witnesses {
            match witness.compute_state_sig() {
                Ok(sig) if sig == witness.state_sig => sigs.push(sig),
                _ => return Verification::fail(REASON_MERKLE_ROOT),
            }
        }
        if db_root(&sigs, stored.config_hash) != stored.db_root {
            return Verification::fail(REASON_MERKLE_ROOT);
        }
    }

    // Step 3: the anchored root.
    if composite.db_root != stored.db_root {
        return Verification::fail(REASON_DB_ROOT);
    }

    Verification::ok()
}
