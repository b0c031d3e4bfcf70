//! Client for the test-network ledger.
//!
//! Wraps account funding, account loading, data anchoring, trustlines, and
//! payments over the Horizon-style HTTP API. The client is explicitly
//! constructed and injectable (no module-level singleton) and serializes
//! load-through-submission per signing address, since two transactions built
//! from the same stale sequence number race and one gets rejected.

pub mod keys;
pub mod tx;

use crate::config::LedgerConfig;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use keys::Keypair;
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tx::{Asset, Operation, Transaction, TransactionEnvelope, format_amount};

/// Maximum byte length of a data-entry value. Larger blobs are anchored by
/// their digest, with the full bytes living in the record store.
pub const DATA_VALUE_LIMIT: usize = 64;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("account not found: {0}")]
    AccountNotFound(String),

    #[error("recipient has no trustline for {asset_code}")]
    NoTrustline { asset_code: String },

    #[error("invalid secret key")]
    InvalidKey,

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("data entry value exceeds {DATA_VALUE_LIMIT} bytes: {len}")]
    DataValueTooLarge { len: usize },

    #[error("funding failed for {address}: status {status}")]
    FundingFailed { address: String, status: u16 },

    #[error("http error on {endpoint}: {source}")]
    Http {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("transaction rejected ({transaction_code}): operations {operation_codes:?}")]
    Rejected {
        transaction_code: String,
        operation_codes: Vec<String>,
    },

    #[error("deserialization error on {endpoint}: {source}")]
    Deserialization {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// One entry of an account's balance list.
#[derive(Clone, Debug, Deserialize)]
pub struct BalanceLine {
    pub asset_type: String,
    #[serde(default)]
    pub asset_code: Option<String>,
    #[serde(default)]
    pub asset_issuer: Option<String>,
    pub balance: String,
}

/// Point-in-time view of a ledger account.
///
/// The sequence number is only valid until the next transaction from this
/// account lands; reload before building a new transaction.
#[derive(Clone, Debug, Deserialize)]
pub struct AccountSnapshot {
    #[serde(rename = "account_id")]
    pub address: String,
    #[serde(deserialize_with = "sequence_from_string")]
    pub sequence: i64,
    #[serde(default)]
    pub balances: Vec<BalanceLine>,
    /// Data entries, base64-encoded values keyed by entry name.
    #[serde(default)]
    pub data: HashMap<String, String>,
}

impl AccountSnapshot {
    pub fn has_trustline(&self, asset: &Asset) -> bool {
        self.balances.iter().any(|line| {
            line.asset_code.as_deref() == Some(asset.code.as_str())
                && line.asset_issuer.as_deref() == Some(asset.issuer.as_str())
        })
    }

    pub fn native_balance(&self) -> Option<&str> {
        self.balances
            .iter()
            .find(|line| line.asset_type == "native")
            .map(|line| line.balance.as_str())
    }
}

// The network encodes sequence numbers as decimal strings.
fn sequence_from_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(serde::de::Error::custom)
}

#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    pub hash: String,
    #[serde(default)]
    pub ledger: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RejectionBody {
    #[serde(default)]
    extras: Option<RejectionExtras>,
}

#[derive(Debug, Default, Deserialize)]
struct RejectionExtras {
    #[serde(default)]
    result_codes: Option<ResultCodes>,
}

#[derive(Debug, Default, Deserialize)]
struct ResultCodes {
    #[serde(default)]
    transaction: Option<String>,
    #[serde(default)]
    operations: Vec<String>,
}

#[derive(Clone)]
pub struct LedgerClient {
    http: reqwest::Client,
    config: LedgerConfig,
    /// Per-signer submission locks, created on first use.
    signer_locks: Arc<StdMutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl LedgerClient {
    pub fn new(config: LedgerConfig) -> Result<Self, LedgerError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LedgerError::Http {
                endpoint: "client_init",
                source: e,
            })?;

        Ok(Self {
            http,
            config,
            signer_locks: Arc::new(StdMutex::new(HashMap::new())),
        })
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    fn signer_lock(&self, address: &str) -> Arc<Mutex<()>> {
        let mut map = self
            .signer_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        map.entry(address.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn horizon_endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.horizon_url.as_str().trim_end_matches('/'),
            path
        )
    }

    /// Request test-network funding for an address.
    ///
    /// Idempotent in effect; check account existence first to avoid burning
    /// faucet quota, and keep calls serial; the faucet throttles.
    pub async fn fund_account(&self, address: &str) -> Result<(), LedgerError> {
        let mut url = self.config.friendbot_url.clone();
        url.query_pairs_mut().append_pair("addr", address);

        tracing::info!(address, "requesting faucet funding");

        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| LedgerError::Http {
                endpoint: "friendbot",
                source: e,
            })?;

        if !resp.status().is_success() {
            return Err(LedgerError::FundingFailed {
                address: address.to_string(),
                status: resp.status().as_u16(),
            });
        }
        Ok(())
    }

    /// Load an account snapshot. `AccountNotFound` means the address has
    /// never been funded.
    pub async fn load_account(&self, address: &str) -> Result<AccountSnapshot, LedgerError> {
        let url = self.horizon_endpoint(&format!("accounts/{address}"));

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| LedgerError::Http {
                endpoint: "load_account",
                source: e,
            })?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(LedgerError::AccountNotFound(address.to_string()));
        }
        if !resp.status().is_success() {
            return Err(self.rejection("load_account", resp).await);
        }

        resp.json().await.map_err(|e| LedgerError::Deserialization {
            endpoint: "load_account",
            source: e,
        })
    }

    /// Load an account, funding it and retrying exactly once if it does not
    /// exist yet.
    pub async fn load_or_fund(&self, address: &str) -> Result<AccountSnapshot, LedgerError> {
        match self.load_account(address).await {
            Ok(account) => Ok(account),
            Err(LedgerError::AccountNotFound(_)) => {
                self.fund_account(address).await?;
                // Funding lands asynchronously on the network side.
                tokio::time::sleep(Duration::from_secs(self.config.funding_grace_secs)).await;
                self.load_account(address).await
            }
            Err(e) => Err(e),
        }
    }

    pub async fn native_balance(&self, address: &str) -> Result<String, LedgerError> {
        let account = self.load_account(address).await?;
        Ok(account.native_balance().unwrap_or("0").to_string())
    }

    /// Write an opaque key/value data entry on the signer's account.
    pub async fn anchor_data(
        &self,
        secret: &str,
        key: &str,
        value: &str,
    ) -> Result<String, LedgerError> {
        if value.len() > DATA_VALUE_LIMIT {
            return Err(LedgerError::DataValueTooLarge { len: value.len() });
        }

        let keypair = Keypair::from_secret(secret)?;
        let address = keypair.public_address();

        let lock = self.signer_lock(&address);
        let _guard = lock.lock().await;

        let account = self.load_or_fund(&address).await?;

        let tx = Transaction::new(
            &address,
            account.sequence + 1,
            self.config.base_fee,
            vec![Operation::ManageData {
                name: key.to_string(),
                value: Some(BASE64.encode(value)),
            }],
        );
        let envelope = tx.sign(&self.config.network_passphrase, &keypair)?;
        let resp = self.submit(&envelope).await?;

        tracing::info!(address = %address, key, tx = %resp.hash, "anchored data entry");
        Ok(resp.hash)
    }

    /// Compare an account's data entry against an expected value (truncated
    /// to the entry size limit, matching what [`Self::anchor_data`] stores).
    pub async fn verify_data(
        &self,
        address: &str,
        key: &str,
        expected: &str,
    ) -> Result<bool, LedgerError> {
        let account = self.load_account(address).await?;

        let Some(stored) = account.data.get(key) else {
            return Ok(false);
        };
        let Ok(decoded) = BASE64.decode(stored) else {
            return Ok(false);
        };

        let expected = &expected.as_bytes()[..expected.len().min(DATA_VALUE_LIMIT)];
        Ok(decoded == expected)
    }

    /// Establish a trustline so the signer's account can hold `asset`.
    ///
    /// Returns `Ok(None)` without submitting anything when the trustline
    /// already exists.
    pub async fn create_trustline(
        &self,
        secret: &str,
        asset: &Asset,
        limit: &str,
    ) -> Result<Option<String>, LedgerError> {
        let keypair = Keypair::from_secret(secret)?;
        let address = keypair.public_address();

        let lock = self.signer_lock(&address);
        let _guard = lock.lock().await;

        let account = self.load_or_fund(&address).await?;

        if account.has_trustline(asset) {
            tracing::info!(address = %address, asset = %asset.code, "trustline already exists");
            return Ok(None);
        }

        let tx = Transaction::new(
            &address,
            account.sequence + 1,
            self.config.base_fee,
            vec![Operation::ChangeTrust {
                asset: asset.clone(),
                limit: limit.to_string(),
            }],
        );
        let envelope = tx.sign(&self.config.network_passphrase, &keypair)?;
        let resp = self.submit(&envelope).await?;

        tracing::info!(address = %address, asset = %asset.code, tx = %resp.hash, "trustline created");
        Ok(Some(resp.hash))
    }

    /// Pay `amount_stroops` of `asset` to a single recipient.
    ///
    /// `NoTrustline` is a recoverable rejection: the recipient has not
    /// established a trustline for the asset.
    pub async fn transfer_asset(
        &self,
        secret: &str,
        recipient: &str,
        asset: &Asset,
        amount_stroops: i64,
    ) -> Result<String, LedgerError> {
        if !keys::is_valid_address(recipient) {
            return Err(LedgerError::InvalidAddress(recipient.to_string()));
        }

        let keypair = Keypair::from_secret(secret)?;
        let address = keypair.public_address();

        let lock = self.signer_lock(&address);
        let _guard = lock.lock().await;

        let account = self.load_account(&address).await?;

        let tx = Transaction::new(
            &address,
            account.sequence + 1,
            self.config.base_fee,
            vec![Operation::Payment {
                destination: recipient.to_string(),
                asset: asset.clone(),
                amount: format_amount(amount_stroops),
            }],
        );
        let envelope = tx.sign(&self.config.network_passphrase, &keypair)?;
        let resp = self.submit(&envelope).await.map_err(|e| map_no_trust(e, asset))?;

        tracing::info!(recipient, asset = %asset.code, tx = %resp.hash, "asset transferred");
        Ok(resp.hash)
    }

    /// Submit one atomic transaction paying every listed recipient.
    ///
    /// All payments land or none do; a single invalid operation (for
    /// instance a recipient without a trustline) rejects the whole
    /// transaction with no partial payout.
    pub async fn submit_settlement(
        &self,
        secret: &str,
        payments: &[(String, i64)],
        asset: &Asset,
        fee: u64,
    ) -> Result<String, LedgerError> {
        let keypair = Keypair::from_secret(secret)?;
        let address = keypair.public_address();

        for (recipient, _) in payments {
            if !keys::is_valid_address(recipient) {
                return Err(LedgerError::InvalidAddress(recipient.clone()));
            }
        }

        let lock = self.signer_lock(&address);
        let _guard = lock.lock().await;

        let account = self.load_account(&address).await?;

        let operations = payments
            .iter()
            .map(|(recipient, amount)| Operation::Payment {
                destination: recipient.clone(),
                asset: asset.clone(),
                amount: format_amount(*amount),
            })
            .collect();

        let tx = Transaction::new(&address, account.sequence + 1, self.config.base_fee, operations)
            .with_fee(fee);
        let envelope = tx.sign(&self.config.network_passphrase, &keypair)?;
        let resp = self.submit(&envelope).await.map_err(|e| map_no_trust(e, asset))?;

        tracing::info!(
            source = %address,
            payees = payments.len(),
            fee,
            tx = %resp.hash,
            "atomic settlement submitted"
        );
        Ok(resp.hash)
    }

    async fn submit(&self, envelope: &TransactionEnvelope) -> Result<SubmitResponse, LedgerError> {
        let url = self.horizon_endpoint("transactions");

        let resp = self
            .http
            .post(&url)
            .json(envelope)
            .send()
            .await
            .map_err(|e| LedgerError::Http {
                endpoint: "submit",
                source: e,
            })?;

        if !resp.status().is_success() {
            return Err(self.rejection("submit", resp).await);
        }

        resp.json().await.map_err(|e| LedgerError::Deserialization {
            endpoint: "submit",
            source: e,
        })
    }

    async fn rejection(&self, endpoint: &'static str, resp: reqwest::Response) -> LedgerError {
        let status = resp.status().as_u16();
        let body: RejectionBody = resp.json().await.unwrap_or_default();
        let codes = body
            .extras
            .and_then(|e| e.result_codes)
            .unwrap_or_default();

        let rejected = LedgerError::Rejected {
            transaction_code: codes
                .transaction
                .unwrap_or_else(|| format!("http_{status}")),
            operation_codes: codes.operations,
        };
        tracing::warn!(endpoint, status, error = %rejected, "ledger rejected request");
        rejected
    }
}

impl std::fmt::Debug for LedgerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerClient")
            .field("config", &self.config)
            .finish()
    }
}

fn map_no_trust(err: LedgerError, asset: &Asset) -> LedgerError {
    match err {
        LedgerError::Rejected {
            ref operation_codes,
            ..
        } if operation_codes.iter().any(|c| c == "op_no_trust") => LedgerError::NoTrustline {
            asset_code: asset.code.clone(),
        },
        other => other,
    }
}
