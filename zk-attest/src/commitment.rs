//! Hash commitments over private scalars.

use crate::constants::BLINDING_LEN;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// A hiding commitment to a single scalar.
///
/// Ephemeral: created per attribute at proof-generation time and dropped once
/// the proof digest is built. Deliberately not serializable: the blinding
/// factor must never be persisted or transmitted.
#[derive(Clone, Debug)]
pub struct Commitment {
    pub value: f64,
    /// Hex-encoded SHA-256 digest of `value || blinding`.
    pub commitment: String,
    /// Hex-encoded 256-bit blinding factor.
    pub blinding: String,
}

/// Commit to `value` under a fresh random blinding factor.
pub fn commit(value: f64) -> Commitment {
    let mut blinding = [0u8; BLINDING_LEN];
    rand::rngs::OsRng.fill_bytes(&mut blinding);
    commit_with_blinding(value, &hex::encode(blinding))
}

/// Commit under a caller-supplied blinding factor.
///
/// Same `(value, blinding)` pair always yields the same commitment.
pub fn commit_with_blinding(value: f64, blinding: &str) -> Commitment {
    let mut hasher = Sha256::new();
    hasher.update(format!("{value}||{blinding}").as_bytes());

    Commitment {
        value,
        commitment: hex::encode(hasher.finalize()),
        blinding: blinding.to_string(),
    }
}
