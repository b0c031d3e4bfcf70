//! Attestation pipeline: proof generation, persistence, on-chain anchoring.

use crate::db;
use crate::errors::ApiError;
use crate::state::AppState;
use sha2::{Digest, Sha256};
use tracing::info;
use uuid::Uuid;
use zk_attest::proof::generate_proof_set;
use zk_attest::serialize::serialize_proofs;
use zk_attest::types::AttributeProfile;

/// Data-entry key under which proof-set digests are anchored.
pub const PROOFS_DATA_KEY: &str = "attest_proofs";

/// Data-entry key for raw content hashes.
pub const CONTENT_HASH_KEY: &str = "content_hash";

/// Background job: generate the proof set, anchor its digest, persist.
///
/// Raw measurements never touch the store; only proofs and digests leave
/// this function.
pub async fn generate_and_anchor(
    state: AppState,
    attestation_id: Uuid,
    secret_seed: String,
    profile: AttributeProfile,
) {
    let res = generate_and_anchor_inner(&state, attestation_id, &secret_seed, &profile).await;
    if let Err(e) = res {
        tracing::warn!(%attestation_id, error = %e, "attestation failed");
        let _ = db::set_attestation_failed(&state.db, attestation_id, &format!("{e}")).await;
    }
}

async fn generate_and_anchor_inner(
    state: &AppState,
    attestation_id: Uuid,
    secret_seed: &str,
    profile: &AttributeProfile,
) -> Result<(), ApiError> {
    let proofs = generate_proof_set(profile);
    if proofs.is_empty() {
        return Err(ApiError::BadRequest(
            "profile produced no attestable proofs".to_string(),
        ));
    }

    let blob = serialize_proofs(&proofs).map_err(|_| ApiError::Internal)?;

    // The full blob exceeds the ledger's per-entry limit; anchor its digest
    // (64 hex chars, exactly the limit) and keep the bytes in the store.
    let digest = hex::encode(Sha256::digest(blob.as_bytes()));

    let tx_id = state
        .ledger
        .anchor_data(secret_seed, PROOFS_DATA_KEY, &digest)
        .await?;

    db::set_attestation_anchored(&state.db, attestation_id, &blob, &digest, &tx_id).await?;

    info!(%attestation_id, proofs = proofs.len(), tx = %tx_id, "attestation anchored");
    Ok(())
}
