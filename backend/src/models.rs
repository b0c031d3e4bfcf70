use crate::settlement::SettlementOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zk_attest::types::AttributeProfile;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttestationStatus {
    Generating,
    Anchored,
    Failed,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AttestationCreateRequest {
    pub contributor_id: String,
    /// Contributor's signing seed; signs the anchor transaction and derives
    /// the payout address. Never persisted.
    pub secret_seed: String,
    pub profile: AttributeProfile,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AttestationCreateResponse {
    pub attestation_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AttestationGetResponse {
    pub attestation_id: Uuid,
    pub contributor_id: String,
    pub created_at: DateTime<Utc>,
    pub status: AttestationStatus,
    /// Canonical criteria strings researchers can query with.
    pub criteria: Vec<String>,
    pub proofs_digest_hex: Option<String>,
    pub anchor_tx_id: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnchorCreateRequest {
    pub secret_seed: String,
    /// Content hash to anchor; truncated to the ledger's entry size limit.
    pub hash: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnchorCreateResponse {
    pub transaction_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnchorVerifyRequest {
    pub address: String,
    pub hash: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnchorVerifyResponse {
    pub verified: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TrustlineCreateRequest {
    pub secret_seed: String,
    /// Maximum amount of the settlement asset the account may hold.
    pub limit: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TrustlineCreateResponse {
    /// False when the trustline already existed and no transaction was
    /// submitted.
    pub created: bool,
    pub transaction_hash: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub address: String,
    pub balance: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreditTopupRequest {
    pub account_id: String,
    pub amount: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreditTopupResponse {
    pub account_id: String,
    pub balance: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReportCreateRequest {
    pub researcher_id: String,
    /// Canonical criteria strings; matching is exact, not semantic.
    pub criteria: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ReportCreateResponse {
    pub report_id: Uuid,
    /// Attestations matched and paid for.
    pub samples: usize,
    pub settlement: SettlementOutcome,
}
