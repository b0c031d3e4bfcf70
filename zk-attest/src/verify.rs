//! Structural proof verification and criteria matching.

use crate::types::Proof;

/// Structural well-formedness check: non-empty commitment, proof, criteria.
///
/// KNOWN GAP: this scheme is a hash commitment with no soundness or
/// extraction property, so verification cannot detect a fabricated digest;
/// the only protocol-level enforcement is that the generator refuses to prove
/// false statements. A deployment needing real guarantees should substitute
/// an actual range-proof construction (e.g. Bulletproofs) behind this same
/// commit/prove/verify surface.
pub fn verify(proof: &Proof) -> bool {
    !proof.commitment.is_empty() && !proof.proof.is_empty() && !proof.criteria.is_empty()
}

/// True iff every required criterion has an exact string match among the
/// proofs' criteria.
///
/// Matching is textual, not semantic: `age >= 20 AND age <= 35` does not
/// match a set whose only age proof covers `[20, 30]`, even though the value
/// may satisfy both. Queries must be phrased with the generator's canonical
/// criteria strings.
pub fn matches_criteria(proofs: &[Proof], criteria: &[String]) -> bool {
    criteria
        .iter()
        .all(|criterion| proofs.iter().any(|p| &p.criteria == criterion))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proof::range_proof;
    use crate::types::ProofKind;
    use chrono::Utc;

    #[test]
    fn well_formed_proof_verifies() {
        let proof = range_proof(28.0, 18.0, 50.0, "age").unwrap();
        assert!(verify(&proof));
    }

    #[test]
    fn malformed_proof_is_rejected() {
        let mut proof = range_proof(28.0, 18.0, 50.0, "age").unwrap();
        proof.commitment.clear();
        assert!(!verify(&proof));

        let proof = Proof {
            kind: ProofKind::Range,
            criteria: String::new(),
            commitment: "aa".into(),
            proof: "bb".into(),
            timestamp: Utc::now(),
        };
        assert!(!verify(&proof));
    }

    #[test]
    fn matching_is_exact_string_not_semantic() {
        let proof = range_proof(28.0, 18.0, 50.0, "age").unwrap();
        assert_eq!(proof.criteria, "age >= 18 AND age <= 50");

        let set = vec![proof];
        assert!(matches_criteria(&set, &["age >= 18 AND age <= 50".into()]));

        // 28 lies in [20, 30], but no proof carries that exact string.
        assert!(!matches_criteria(&set, &["age >= 20 AND age <= 30".into()]));
    }

    #[test]
    fn every_criterion_must_match() {
        let set = vec![
            range_proof(28.0, 18.0, 50.0, "age").unwrap(),
            range_proof(28.0, 20.0, 30.0, "age").unwrap(),
        ];

        assert!(matches_criteria(
            &set,
            &["age >= 18 AND age <= 50".into(), "age >= 20 AND age <= 30".into()],
        ));
        assert!(!matches_criteria(
            &set,
            &["age >= 18 AND age <= 50".into(), "has_pcos == true".into()],
        ));
    }

    #[test]
    fn empty_criteria_match_any_set() {
        assert!(matches_criteria(&[], &[]));
    }
}
