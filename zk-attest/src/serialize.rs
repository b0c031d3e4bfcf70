//! Proof-set serialization for ledger anchoring and storage.

use crate::proof::ProofError;
use crate::types::Proof;

/// Serialize a proof set to a single JSON blob.
///
/// The blob itself lives in the record store; only its digest is anchored
/// on-chain (the full bytes routinely exceed the ledger's per-entry limit).
pub fn serialize_proofs(proofs: &[Proof]) -> Result<String, ProofError> {
    serde_json::to_string(proofs).map_err(|e| ProofError::Serialization(format!("{e}")))
}

/// Deserialize a proof set.
///
/// Malformed input yields an empty set; callers treat that as "nothing
/// usable", not as a hard error.
pub fn deserialize_proofs(data: &str) -> Vec<Proof> {
    serde_json::from_str(data).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proof::{equality_proof, range_proof};

    #[test]
    fn round_trip_reproduces_the_set() {
        let proofs = vec![
            range_proof(28.0, 18.0, 50.0, "age").unwrap(),
            equality_proof(true, true, "uses_contraceptives").unwrap(),
        ];

        let blob = serialize_proofs(&proofs).unwrap();
        assert_eq!(deserialize_proofs(&blob), proofs);
    }

    #[test]
    fn serialized_field_names_are_stable() {
        let proofs = vec![range_proof(28.0, 18.0, 50.0, "age").unwrap()];
        let blob = serialize_proofs(&proofs).unwrap();

        assert!(blob.contains(r#""type":"range""#));
        assert!(blob.contains(r#""criteria":"age >= 18 AND age <= 50""#));
    }

    #[test]
    fn malformed_input_yields_empty_set() {
        assert!(deserialize_proofs("not json").is_empty());
        assert!(deserialize_proofs(r#"{"type":"range"}"#).is_empty());
        assert!(deserialize_proofs("").is_empty());
    }
}
