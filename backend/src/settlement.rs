//! Atomic settlement orchestration.
//!
//! One settlement consumes a researcher credit and distributes the configured
//! payout across contributor addresses in a single ledger transaction. The
//! ledger leg is all-or-nothing; when it fails the settlement degrades to
//! bookkeeping-only rather than blocking the business transaction: earnings
//! rows are written unsettled, the credit is still debited, and the caller
//! still gets a success. Degraded settlements are terminal; reconciliation
//! happens out-of-band from the audit log, never by blind resubmission
//! (which could double-pay after an unknown-outcome timeout).

use crate::db::StoreError;
use crate::ledger::keys::{self, Keypair};
use crate::ledger::tx::Asset;
use crate::ledger::{LedgerClient, LedgerError};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("insufficient credit: have {have}, need {need}")]
    InsufficientCredit { have: i64, need: i64 },

    #[error("no usable data for this request")]
    NoUsableData,

    #[error("invalid platform signing key")]
    InvalidPlatformKey,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Store operations the orchestrator needs. Any conforming store works;
/// the sqlite pool implements this in [`crate::db`].
pub trait SettlementStore {
    async fn credit_balance(&self, account_id: &str) -> Result<i64, StoreError>;
    async fn debit_credit(&self, account_id: &str, amount: i64) -> Result<(), StoreError>;
    async fn contributor_addresses(&self, ids: &[String]) -> Result<Vec<Payee>, StoreError>;
    async fn insert_earnings(&self, rows: &[EarningRow]) -> Result<(), StoreError>;
}

#[derive(Clone, Debug)]
pub struct Payee {
    pub id: String,
    pub address: String,
}

/// One payee's bookkeeping row. `settled = false` with no transaction id
/// marks a degraded payout awaiting out-of-band reconciliation.
#[derive(Clone, Debug)]
pub struct EarningRow {
    pub payee_id: String,
    pub settlement_id: Uuid,
    pub amount_stroops: i64,
    pub settled: bool,
    pub tx_id: Option<String>,
}

#[derive(Clone)]
pub struct SettlementConfig {
    /// Custodial seed that signs every payout transaction.
    pub platform_secret: String,
    pub payout_asset: Asset,
    /// Total distributed per settlement, split across payees.
    pub payout_total_stroops: i64,
    /// Credits consumed from the payer per settlement.
    pub credit_cost: i64,
}

pub struct SettlementRequest {
    pub settlement_id: Uuid,
    /// Off-chain credit account of the payer.
    pub payer_account: String,
    pub payee_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SettlementOutcome {
    pub settlement_id: Uuid,
    /// True only when the ledger confirmed the payout transaction.
    pub settled: bool,
    pub tx_id: Option<String>,
    pub payees_total: usize,
    pub payees_paid: usize,
    pub total_distributed_stroops: i64,
    pub fee_stroops: u64,
}

/// Split a payout across `count` payees in stroops.
///
/// Truncating division; the remainder goes to the first payee so the
/// distributed sum is exactly `total`.
pub fn split_payout(total_stroops: i64, count: usize) -> Vec<i64> {
    if count == 0 {
        return Vec::new();
    }
    let count = count as i64;
    let share = total_stroops / count;
    let remainder = total_stroops - share * count;

    let mut shares = vec![share; count as usize];
    shares[0] += remainder;
    shares
}

/// Run one settlement to completion.
///
/// Terminal errors (`InsufficientCredit`, `InvalidPlatformKey`, store
/// failures) leave no partial state: no debit, no earnings rows. Every
/// ledger failure past those checks takes the degraded path instead of
/// erroring.
pub async fn settle<S: SettlementStore>(
    store: &S,
    ledger: &LedgerClient,
    config: &SettlementConfig,
    request: &SettlementRequest,
) -> Result<SettlementOutcome, SettlementError> {
    // Credit check: terminal, no ledger interaction attempted.
    let balance = store.credit_balance(&request.payer_account).await?;
    if balance < config.credit_cost {
        return Err(SettlementError::InsufficientCredit {
            have: balance,
            need: config.credit_cost,
        });
    }

    // A malformed custodial key is fatal; fail before any mutation.
    let platform = Keypair::from_secret(&config.platform_secret)
        .map_err(|_| SettlementError::InvalidPlatformKey)?;

    // Resolve payees and drop structurally invalid addresses.
    let resolved = store.contributor_addresses(&request.payee_ids).await?;
    let payable: Vec<&Payee> = resolved
        .iter()
        .filter(|p| keys::is_valid_address(&p.address))
        .collect();

    for payee in &resolved {
        if !keys::is_valid_address(&payee.address) {
            tracing::warn!(
                settlement = %request.settlement_id,
                payee = %payee.id,
                "dropping payee with invalid address"
            );
        }
    }

    if payable.is_empty() {
        tracing::warn!(
            settlement = %request.settlement_id,
            payees = request.payee_ids.len(),
            "no payable contributors; settling in degraded mode"
        );
        return finish_degraded(store, config, request, 0).await;
    }

    let shares = split_payout(config.payout_total_stroops, payable.len());
    let payments: Vec<(String, i64)> = payable
        .iter()
        .zip(&shares)
        .map(|(payee, share)| (payee.address.clone(), *share))
        .collect();

    // Fee prices in the payer's debit on top of the payout operations.
    let fee = ledger.config().base_fee * (1 + payable.len() as u64);

    match ledger
        .submit_settlement(&config.platform_secret, &payments, &config.payout_asset, fee)
        .await
    {
        Ok(tx_id) => {
            let paid_ids: Vec<&str> = payable.iter().map(|p| p.id.as_str()).collect();
            let mut rows: Vec<EarningRow> = payable
                .iter()
                .zip(&shares)
                .map(|(payee, share)| EarningRow {
                    payee_id: payee.id.clone(),
                    settlement_id: request.settlement_id,
                    amount_stroops: *share,
                    settled: true,
                    tx_id: Some(tx_id.clone()),
                })
                .collect();

            // Payees dropped for invalid addresses still get a row, so the
            // ledger of record is never silently missing one.
            for payee_id in &request.payee_ids {
                if !paid_ids.contains(&payee_id.as_str()) {
                    rows.push(EarningRow {
                        payee_id: payee_id.clone(),
                        settlement_id: request.settlement_id,
                        amount_stroops: 0,
                        settled: false,
                        tx_id: None,
                    });
                }
            }

            store.insert_earnings(&rows).await?;
            store
                .debit_credit(&request.payer_account, config.credit_cost)
                .await?;

            tracing::info!(
                settlement = %request.settlement_id,
                signer = %platform.public_address(),
                tx = %tx_id,
                payees = payable.len(),
                "settlement confirmed on ledger"
            );

            Ok(SettlementOutcome {
                settlement_id: request.settlement_id,
                settled: true,
                tx_id: Some(tx_id),
                payees_total: request.payee_ids.len(),
                payees_paid: payable.len(),
                total_distributed_stroops: config.payout_total_stroops,
                fee_stroops: fee,
            })
        }
        Err(e) => {
            if matches!(e, LedgerError::Http { .. }) {
                // Could be a timeout: outcome unknown, not known-failed.
                // Degrading is still safe because this path never resubmits.
                tracing::warn!(
                    settlement = %request.settlement_id,
                    error = %e,
                    "settlement submission outcome unknown; settling in degraded mode"
                );
            } else {
                tracing::warn!(
                    settlement = %request.settlement_id,
                    error = %e,
                    "ledger payout failed; settling in degraded mode"
                );
            }
            finish_degraded(store, config, request, fee).await
        }
    }
}

/// Bookkeeping-only completion: unsettled earnings rows for every payee,
/// credit debited, success returned.
async fn finish_degraded<S: SettlementStore>(
    store: &S,
    config: &SettlementConfig,
    request: &SettlementRequest,
    fee: u64,
) -> Result<SettlementOutcome, SettlementError> {
    let shares = split_payout(config.payout_total_stroops, request.payee_ids.len());
    let rows: Vec<EarningRow> = request
        .payee_ids
        .iter()
        .zip(&shares)
        .map(|(payee_id, share)| EarningRow {
            payee_id: payee_id.clone(),
            settlement_id: request.settlement_id,
            amount_stroops: *share,
            settled: false,
            tx_id: None,
        })
        .collect();

    store.insert_earnings(&rows).await?;
    store
        .debit_credit(&request.payer_account, config.credit_cost)
        .await?;

    Ok(SettlementOutcome {
        settlement_id: request.settlement_id,
        settled: false,
        tx_id: None,
        payees_total: request.payee_ids.len(),
        payees_paid: 0,
        total_distributed_stroops: 0,
        fee_stroops: fee,
    })
}
