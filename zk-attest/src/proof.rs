//! Range and equality proof construction.
//!
//! A proof digest covers the commitment, the stated bounds or target, and a
//! fresh random challenge, so two proofs over the same underlying value are
//! never byte-identical across calls.

use crate::commitment::{Commitment, commit};
use crate::constants::{
    AGE_BANDS, AGE_RANGE, CHALLENGE_LEN, ESTROGEN_ELEVATED_RANGE, ESTROGEN_RANGE,
    PROGESTERONE_RANGE, TESTOSTERONE_RANGE,
};
use crate::types::{AttributeProfile, Proof, ProofKind};
use chrono::Utc;
use rand::RngCore;
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProofError {
    #[error("value {value} not in range [{min}, {max}]")]
    OutOfRange { value: f64, min: f64, max: f64 },

    #[error("value does not match target")]
    Mismatch,

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Transcript hashed into a range-proof digest.
///
/// Field order is part of the digest; do not reorder.
#[derive(Serialize)]
struct RangeTranscript<'a> {
    commitment: &'a str,
    min: f64,
    max: f64,
    challenge: String,
}

#[derive(Serialize)]
struct EqualityTranscript<'a> {
    commitment: &'a str,
    target: bool,
    challenge: String,
}

fn fresh_challenge() -> String {
    let mut bytes = [0u8; CHALLENGE_LEN];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn digest_transcript<T: Serialize>(transcript: &T) -> Result<String, ProofError> {
    let json =
        serde_json::to_string(transcript).map_err(|e| ProofError::Serialization(format!("{e}")))?;

    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Prove `min <= value <= max` without revealing `value`.
///
/// Refuses to construct a proof for a false statement; that refusal is the
/// only protocol-level enforcement this scheme has (see [`crate::verify`]).
pub fn range_proof(value: f64, min: f64, max: f64, label: &str) -> Result<Proof, ProofError> {
    if value < min || value > max {
        return Err(ProofError::OutOfRange { value, min, max });
    }

    let Commitment { commitment, .. } = commit(value);

    let proof = digest_transcript(&RangeTranscript {
        commitment: &commitment,
        min,
        max,
        challenge: fresh_challenge(),
    })?;

    Ok(Proof {
        kind: ProofKind::Range,
        criteria: format!("{label} >= {min} AND {label} <= {max}"),
        commitment,
        proof,
        timestamp: Utc::now(),
    })
}

/// Prove `value == target` without revealing which side was private.
pub fn equality_proof(value: bool, target: bool, label: &str) -> Result<Proof, ProofError> {
    if value != target {
        return Err(ProofError::Mismatch);
    }

    let Commitment { commitment, .. } = commit(1.0);

    let proof = digest_transcript(&EqualityTranscript {
        commitment: &commitment,
        target,
        challenge: fresh_challenge(),
    })?;

    Ok(Proof {
        kind: ProofKind::Equality,
        criteria: format!("{label} == {target}"),
        commitment,
        proof,
        timestamp: Utc::now(),
    })
}

/// Build every applicable proof for a contributor's profile.
///
/// A measurement outside its attestable bounds is logged and skipped; one bad
/// attribute never aborts generation for the rest of the profile. The result
/// is ordered and may contain several non-exclusive proofs per attribute.
pub fn generate_proof_set(profile: &AttributeProfile) -> Vec<Proof> {
    let mut proofs = Vec::new();

    if let Some(age) = profile.age {
        let age = f64::from(age);

        match range_proof(age, AGE_RANGE.0, AGE_RANGE.1, "age") {
            Ok(p) => {
                proofs.push(p);
                for (lo, hi) in AGE_BANDS {
                    if age >= lo && age <= hi {
                        push_ok(&mut proofs, range_proof(age, lo, hi, "age"), "age");
                    }
                }
            }
            Err(e) => tracing::debug!(error = %e, "age outside attestable range"),
        }
    }

    if let Some(estrogen) = profile.estrogen {
        if estrogen >= ESTROGEN_RANGE.0 && estrogen <= ESTROGEN_RANGE.1 {
            push_ok(
                &mut proofs,
                range_proof(estrogen, ESTROGEN_RANGE.0, ESTROGEN_RANGE.1, "estrogen"),
                "estrogen",
            );
        }
        if estrogen > ESTROGEN_ELEVATED_RANGE.0 {
            push_ok(
                &mut proofs,
                range_proof(
                    estrogen,
                    ESTROGEN_ELEVATED_RANGE.0,
                    ESTROGEN_ELEVATED_RANGE.1,
                    "estrogen",
                ),
                "estrogen",
            );
        }
    }

    if let Some(progesterone) = profile.progesterone {
        if progesterone >= PROGESTERONE_RANGE.0 && progesterone <= PROGESTERONE_RANGE.1 {
            push_ok(
                &mut proofs,
                range_proof(
                    progesterone,
                    PROGESTERONE_RANGE.0,
                    PROGESTERONE_RANGE.1,
                    "progesterone",
                ),
                "progesterone",
            );
        }
    }

    if let Some(testosterone) = profile.testosterone {
        if testosterone >= TESTOSTERONE_RANGE.0 && testosterone <= TESTOSTERONE_RANGE.1 {
            push_ok(
                &mut proofs,
                range_proof(
                    testosterone,
                    TESTOSTERONE_RANGE.0,
                    TESTOSTERONE_RANGE.1,
                    "testosterone",
                ),
                "testosterone",
            );
        }
    }

    if let Some(flag) = profile.uses_contraceptives {
        push_ok(
            &mut proofs,
            equality_proof(flag, flag, "uses_contraceptives"),
            "uses_contraceptives",
        );
    }

    if let Some(flag) = profile.has_pcos {
        push_ok(&mut proofs, equality_proof(flag, flag, "has_pcos"), "has_pcos");
    }

    proofs
}

fn push_ok(proofs: &mut Vec<Proof>, result: Result<Proof, ProofError>, label: &str) {
    match result {
        Ok(p) => proofs.push(p),
        Err(e) => tracing::debug!(label, error = %e, "skipping proof"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_proof_inside_bounds_succeeds() {
        let proof = range_proof(28.0, 18.0, 50.0, "age").unwrap();
        assert_eq!(proof.kind, ProofKind::Range);
        assert_eq!(proof.criteria, "age >= 18 AND age <= 50");
        assert_eq!(proof.commitment.len(), 64);
        assert_eq!(proof.proof.len(), 64);
    }

    #[test]
    fn range_proof_outside_bounds_is_refused() {
        let err = range_proof(17.0, 18.0, 50.0, "age").unwrap_err();
        assert!(matches!(err, ProofError::OutOfRange { value, .. } if value == 17.0));

        let err = range_proof(51.0, 18.0, 50.0, "age").unwrap_err();
        assert!(matches!(err, ProofError::OutOfRange { .. }));
    }

    #[test]
    fn range_proof_accepts_boundary_values() {
        assert!(range_proof(18.0, 18.0, 50.0, "age").is_ok());
        assert!(range_proof(50.0, 18.0, 50.0, "age").is_ok());
    }

    #[test]
    fn fractional_bounds_format_without_trailing_zeros() {
        let proof = range_proof(3.2, 0.1, 25.0, "progesterone").unwrap();
        assert_eq!(proof.criteria, "progesterone >= 0.1 AND progesterone <= 25");
    }

    #[test]
    fn repeated_proofs_use_independent_challenges() {
        let a = range_proof(28.0, 18.0, 50.0, "age").unwrap();
        let b = range_proof(28.0, 18.0, 50.0, "age").unwrap();
        assert_ne!(a.proof, b.proof);
    }

    #[test]
    fn equality_proof_criteria_names_the_target() {
        let proof = equality_proof(true, true, "has_pcos").unwrap();
        assert_eq!(proof.kind, ProofKind::Equality);
        assert_eq!(proof.criteria, "has_pcos == true");

        let proof = equality_proof(false, false, "has_pcos").unwrap();
        assert_eq!(proof.criteria, "has_pcos == false");
    }

    #[test]
    fn equality_proof_refuses_mismatch() {
        assert!(matches!(
            equality_proof(true, false, "has_pcos"),
            Err(ProofError::Mismatch)
        ));
    }

    #[test]
    fn proof_set_covers_the_full_profile() {
        let profile = AttributeProfile {
            age: Some(28),
            estrogen: Some(120.0),
            progesterone: Some(3.2),
            testosterone: Some(40.0),
            uses_contraceptives: Some(true),
            has_pcos: Some(false),
        };

        let proofs = generate_proof_set(&profile);
        let criteria: Vec<&str> = proofs.iter().map(|p| p.criteria.as_str()).collect();

        // Age 28 falls in [18,50] plus the [20,30] and [25,35] bands.
        assert!(criteria.contains(&"age >= 18 AND age <= 50"));
        assert!(criteria.contains(&"age >= 20 AND age <= 30"));
        assert!(criteria.contains(&"age >= 25 AND age <= 35"));
        assert!(!criteria.contains(&"age >= 30 AND age <= 40"));

        // Estrogen 120 is in the normal range and above the elevated threshold.
        assert!(criteria.contains(&"estrogen >= 15 AND estrogen <= 350"));
        assert!(criteria.contains(&"estrogen >= 100 AND estrogen <= 500"));

        assert!(criteria.contains(&"progesterone >= 0.1 AND progesterone <= 25"));
        assert!(criteria.contains(&"testosterone >= 15 AND testosterone <= 70"));
        assert!(criteria.contains(&"uses_contraceptives == true"));
        assert!(criteria.contains(&"has_pcos == false"));
    }

    #[test]
    fn absent_attributes_are_skipped() {
        let profile = AttributeProfile {
            age: Some(28),
            ..Default::default()
        };

        let proofs = generate_proof_set(&profile);
        assert!(proofs.iter().all(|p| p.criteria.starts_with("age ")));
    }

    #[test]
    fn out_of_range_attribute_does_not_abort_the_batch() {
        let profile = AttributeProfile {
            // Outside the broad range: no age proofs at all, including bands.
            age: Some(72),
            testosterone: Some(40.0),
            ..Default::default()
        };

        let proofs = generate_proof_set(&profile);
        assert_eq!(proofs.len(), 1);
        assert_eq!(proofs[0].criteria, "testosterone >= 15 AND testosterone <= 70");
    }

    #[test]
    fn empty_profile_yields_empty_set() {
        assert!(generate_proof_set(&AttributeProfile::default()).is_empty());
    }
}
