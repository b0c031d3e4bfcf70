//! Transaction construction and signing.
//!
//! A transaction bundles typed operations with a fee and the source
//! account's next sequence number; the whole bundle succeeds or fails as a
//! unit at the ledger. Signatures cover the network passphrase plus the
//! canonical JSON encoding of the transaction, so an envelope signed for one
//! network cannot be replayed on another.

use super::LedgerError;
use super::keys::Keypair;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Stroops per whole asset unit; the ledger mandates 7 decimal places.
pub const STROOPS_PER_UNIT: i64 = 10_000_000;

/// Transaction wait bound passed to the network, in seconds.
pub const TX_TIMEOUT_SECS: u64 = 180;

/// A non-native asset, identified by code and issuing account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub code: String,
    pub issuer: String,
}

/// Typed ledger operations.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    Payment {
        destination: String,
        asset: Asset,
        /// Formatted with exactly 7 fractional digits; see [`format_amount`].
        amount: String,
    },
    ChangeTrust {
        asset: Asset,
        limit: String,
    },
    ManageData {
        name: String,
        /// Base64-encoded entry value; `None` deletes the entry.
        value: Option<String>,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transaction {
    pub source_account: String,
    /// Total fee in stroops.
    pub fee: u64,
    pub sequence: i64,
    pub operations: Vec<Operation>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DecoratedSignature {
    /// Hex-encoded ed25519 verifying key.
    pub public_key: String,
    /// Hex-encoded signature over the signing payload.
    pub signature: String,
}

/// A signed transaction ready for submission.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransactionEnvelope {
    pub tx: Transaction,
    pub signatures: Vec<DecoratedSignature>,
}

impl Transaction {
    /// Build a transaction with the default fee of `base_fee` per operation.
    pub fn new(
        source_account: impl Into<String>,
        sequence: i64,
        base_fee: u64,
        operations: Vec<Operation>,
    ) -> Self {
        let fee = base_fee * operations.len() as u64;
        Self {
            source_account: source_account.into(),
            fee,
            sequence,
            operations,
            timeout_secs: TX_TIMEOUT_SECS,
        }
    }

    /// Override the fee. The settlement path prices in the payer's debit on
    /// top of the payout operations: `base_fee x (1 + payees)`.
    pub fn with_fee(mut self, fee: u64) -> Self {
        self.fee = fee;
        self
    }

    /// Bytes every signature covers: SHA-256 of the network passphrase
    /// followed by the canonical JSON encoding of the transaction.
    pub fn signing_payload(&self, network_passphrase: &str) -> Result<Vec<u8>, LedgerError> {
        let mut hasher = Sha256::new();
        hasher.update(network_passphrase.as_bytes());
        hasher.update(serde_json::to_vec(self)?);
        Ok(hasher.finalize().to_vec())
    }

    /// Sign into a submittable envelope.
    pub fn sign(
        self,
        network_passphrase: &str,
        keypair: &Keypair,
    ) -> Result<TransactionEnvelope, LedgerError> {
        let payload = self.signing_payload(network_passphrase)?;
        let signature = keypair.sign(&payload);

        Ok(TransactionEnvelope {
            tx: self,
            signatures: vec![DecoratedSignature {
                public_key: keypair.verifying_key_hex(),
                signature: hex::encode(signature),
            }],
        })
    }
}

/// Format a stroop amount with the ledger's mandatory 7 fractional digits.
pub fn format_amount(stroops: i64) -> String {
    format!(
        "{}.{:07}",
        stroops / STROOPS_PER_UNIT,
        stroops % STROOPS_PER_UNIT
    )
}
