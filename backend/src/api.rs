use crate::attest;
use crate::db;
use crate::errors::ApiError;
use crate::ledger::keys::Keypair;
use crate::models::*;
use crate::settlement::{self, SettlementError, SettlementRequest};
use crate::state::AppState;
use axum::{
    Json, Router,
    extract::{Path, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;
use zk_attest::serialize::deserialize_proofs;
use zk_attest::verify::matches_criteria;

pub fn router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/api/v1/attestations", post(create_attestation))
        .route("/api/v1/anchors", post(create_anchor))
        .route("/api/v1/anchors/verify", post(verify_anchor))
        .route("/api/v1/trustlines", post(create_trustline))
        .route("/api/v1/credits", post(topup_credits))
        .route("/api/v1/reports", post(create_report))
        .layer(middleware::from_fn(auth_middleware));

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/v1/attestations/:id", get(get_attestation))
        .route("/api/v1/accounts/:address/balance", get(get_balance))
        .merge(protected_routes)
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

async fn auth_middleware(
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // In production, this should be a strong secret from environment.
    let expected_key = std::env::var("API_KEY").unwrap_or_else(|_| "dev-secret-key".to_string());

    if let Some(provided_key) = headers.get("X-API-KEY") {
        if provided_key == expected_key.as_str() {
            return Ok(next.run(request).await);
        }
    }

    tracing::warn!("unauthorized access attempt");
    Err(StatusCode::UNAUTHORIZED)
}

async fn create_attestation(
    State(state): State<AppState>,
    Json(req): Json<AttestationCreateRequest>,
) -> Result<Json<AttestationCreateResponse>, ApiError> {
    let keypair = Keypair::from_secret(&req.secret_seed)
        .map_err(|_| ApiError::BadRequest("invalid secret seed".to_string()))?;

    db::upsert_contributor(&state.db, &req.contributor_id, &keypair.public_address()).await?;

    let attestation_id = Uuid::new_v4();
    db::insert_attestation(&state.db, attestation_id, &req.contributor_id).await?;

    // Proof generation and anchoring run in the background; poll the
    // attestation for status.
    tokio::spawn(attest::generate_and_anchor(
        state.clone(),
        attestation_id,
        req.secret_seed,
        req.profile,
    ));

    Ok(Json(AttestationCreateResponse { attestation_id }))
}

async fn get_attestation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AttestationGetResponse>, ApiError> {
    let Some(row) = db::get_attestation(&state.db, id).await? else {
        return Err(ApiError::NotFound("attestation not found".to_string()));
    };

    let status = match row.status.as_str() {
        "generating" => AttestationStatus::Generating,
        "anchored" => AttestationStatus::Anchored,
        _ => AttestationStatus::Failed,
    };

    let criteria = row
        .proofs_json
        .as_deref()
        .map(deserialize_proofs)
        .unwrap_or_default()
        .into_iter()
        .map(|p| p.criteria)
        .collect();

    Ok(Json(AttestationGetResponse {
        attestation_id: row.id,
        contributor_id: row.contributor_id,
        created_at: row.created_at,
        status,
        criteria,
        proofs_digest_hex: row.proofs_digest_hex,
        anchor_tx_id: row.anchor_tx_id,
        error: row.error,
    }))
}

async fn create_anchor(
    State(state): State<AppState>,
    Json(req): Json<AnchorCreateRequest>,
) -> Result<Json<AnchorCreateResponse>, ApiError> {
    let hash = if req.hash.len() > crate::ledger::DATA_VALUE_LIMIT {
        req.hash
            .get(..crate::ledger::DATA_VALUE_LIMIT)
            .ok_or_else(|| ApiError::BadRequest("hash must be ASCII hex".to_string()))?
    } else {
        req.hash.as_str()
    };

    let transaction_id = state
        .ledger
        .anchor_data(&req.secret_seed, attest::CONTENT_HASH_KEY, hash)
        .await?;

    Ok(Json(AnchorCreateResponse { transaction_id }))
}

async fn verify_anchor(
    State(state): State<AppState>,
    Json(req): Json<AnchorVerifyRequest>,
) -> Result<Json<AnchorVerifyResponse>, ApiError> {
    let verified = state
        .ledger
        .verify_data(&req.address, attest::CONTENT_HASH_KEY, &req.hash)
        .await?;

    Ok(Json(AnchorVerifyResponse { verified }))
}

async fn create_trustline(
    State(state): State<AppState>,
    Json(req): Json<TrustlineCreateRequest>,
) -> Result<Json<TrustlineCreateResponse>, ApiError> {
    let limit = req.limit.as_deref().unwrap_or("1000000");

    let transaction_hash = state
        .ledger
        .create_trustline(
            &req.secret_seed,
            &state.settings.settlement.payout_asset,
            limit,
        )
        .await?;

    Ok(Json(TrustlineCreateResponse {
        created: transaction_hash.is_some(),
        transaction_hash,
    }))
}

async fn get_balance(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let balance = state.ledger.native_balance(&address).await?;
    Ok(Json(BalanceResponse { address, balance }))
}

async fn topup_credits(
    State(state): State<AppState>,
    Json(req): Json<CreditTopupRequest>,
) -> Result<Json<CreditTopupResponse>, ApiError> {
    if req.amount <= 0 {
        return Err(ApiError::BadRequest("amount must be positive".to_string()));
    }

    let balance = db::add_credit(&state.db, &req.account_id, req.amount).await?;

    Ok(Json(CreditTopupResponse {
        account_id: req.account_id,
        balance,
    }))
}

async fn create_report(
    State(state): State<AppState>,
    Json(req): Json<ReportCreateRequest>,
) -> Result<Json<ReportCreateResponse>, ApiError> {
    // Aggregation proper is out of scope here; matching decides which
    // attestations a report draws on and therefore who gets paid.
    let rows = db::list_anchored_attestations(&state.db).await?;

    let mut matched_ids = Vec::new();
    let mut payee_ids: Vec<String> = Vec::new();
    for (id, contributor_id, proofs_json) in rows {
        let proofs = deserialize_proofs(&proofs_json);
        if proofs.is_empty() {
            continue;
        }
        if matches_criteria(&proofs, &req.criteria) {
            matched_ids.push(id);
            if !payee_ids.contains(&contributor_id) {
                payee_ids.push(contributor_id);
            }
        }
    }

    if matched_ids.is_empty() {
        return Err(SettlementError::NoUsableData.into());
    }

    let settlement_id = Uuid::new_v4();
    let request = SettlementRequest {
        settlement_id,
        payer_account: req.researcher_id.clone(),
        payee_ids,
    };

    let outcome = settlement::settle(
        &state.db,
        &state.ledger,
        &state.settings.settlement,
        &request,
    )
    .await?;

    let report_id = Uuid::new_v4();
    db::insert_report(
        &state.db,
        report_id,
        &req.researcher_id,
        &req.criteria,
        &matched_ids,
        settlement_id,
    )
    .await?;

    Ok(Json(ReportCreateResponse {
        report_id,
        samples: matched_ids.len(),
        settlement: outcome,
    }))
}
