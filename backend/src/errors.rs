use crate::db::StoreError;
use crate::ledger::LedgerError;
use crate::settlement::SettlementError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("payment required: {0}")]
    PaymentRequired(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("upstream ledger error: {0}")]
    BadGateway(String),

    #[error("internal error")]
    Internal,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, msg) = match &self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            ApiError::PaymentRequired(m) => (StatusCode::PAYMENT_REQUIRED, m.clone()),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
            ApiError::BadGateway(m) => (StatusCode::BAD_GATEWAY, m.clone()),
            ApiError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string()),
        };

        (status, Json(ErrorBody { error: msg })).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        tracing::error!(error = %e, "store failure");
        ApiError::Internal
    }
}

impl From<LedgerError> for ApiError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::AccountNotFound(_) => ApiError::NotFound(format!("{e}")),
            LedgerError::InvalidKey
            | LedgerError::InvalidAddress(_)
            | LedgerError::DataValueTooLarge { .. } => ApiError::BadRequest(format!("{e}")),
            LedgerError::NoTrustline { .. } => ApiError::Conflict(format!("{e}")),
            LedgerError::FundingFailed { .. }
            | LedgerError::Http { .. }
            | LedgerError::Rejected { .. }
            | LedgerError::Deserialization { .. } => ApiError::BadGateway(format!("{e}")),
            LedgerError::Serialization(_) => {
                tracing::error!(error = %e, "envelope serialization failure");
                ApiError::Internal
            }
        }
    }
}

impl From<SettlementError> for ApiError {
    fn from(e: SettlementError) -> Self {
        match e {
            // Business rejections, distinguishable from infrastructure
            // failure: the client can tell "buy more credit" from "retry".
            SettlementError::InsufficientCredit { .. } => ApiError::PaymentRequired(format!("{e}")),
            SettlementError::NoUsableData => ApiError::Conflict(format!("{e}")),
            SettlementError::InvalidPlatformKey => {
                tracing::error!("platform signing key is malformed");
                ApiError::Internal
            }
            SettlementError::Store(inner) => inner.into(),
        }
    }
}
