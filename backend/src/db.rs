//! Sqlite record store: attestations, contributor addresses, researcher
//! credits, earnings, reports.
//!
//! The settlement orchestrator only sees this store through the
//! [`SettlementStore`](crate::settlement::SettlementStore) trait, implemented
//! here for the pool; any conforming store is substitutable.

use crate::settlement::{EarningRow, Payee, SettlementStore};
use chrono::{DateTime, Utc};
use sqlx::{Pool, Row, Sqlite, sqlite::SqlitePoolOptions};
use thiserror::Error;
use uuid::Uuid;

pub type Db = Pool<Sqlite>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("malformed row: {0}")]
    Malformed(String),
}

pub async fn connect(db_url: &str) -> Result<Db, StoreError> {
    let db = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await?;
    Ok(db)
}

pub async fn init_schema(db: &Db) -> Result<(), StoreError> {
    // NOTE: Keep schema minimal and explicit. Earnings are append-only.
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS attestations (
  id TEXT PRIMARY KEY,
  contributor_id TEXT NOT NULL,
  created_at TEXT NOT NULL,
  status TEXT NOT NULL,
  proofs_json TEXT,
  proofs_digest_hex TEXT,
  anchor_tx_id TEXT,
  error TEXT
);

CREATE TABLE IF NOT EXISTS contributors (
  id TEXT PRIMARY KEY,
  address TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS credits (
  account_id TEXT PRIMARY KEY,
  balance INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS earnings (
  id TEXT PRIMARY KEY,
  payee_id TEXT NOT NULL,
  settlement_id TEXT NOT NULL,
  amount_stroops INTEGER NOT NULL,
  settled INTEGER NOT NULL,
  tx_id TEXT,
  created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS reports (
  id TEXT PRIMARY KEY,
  researcher_id TEXT NOT NULL,
  created_at TEXT NOT NULL,
  criteria_json TEXT NOT NULL,
  attestation_ids_json TEXT NOT NULL,
  settlement_id TEXT NOT NULL
);
"#,
    )
    .execute(db)
    .await?;

    Ok(())
}

// -- Attestations -------------------------------------------------------------

pub struct AttestationRow {
    pub id: Uuid,
    pub contributor_id: String,
    pub created_at: DateTime<Utc>,
    pub status: String,
    pub proofs_json: Option<String>,
    pub proofs_digest_hex: Option<String>,
    pub anchor_tx_id: Option<String>,
    pub error: Option<String>,
}

pub async fn insert_attestation(
    db: &Db,
    attestation_id: Uuid,
    contributor_id: &str,
) -> Result<(), StoreError> {
    let created_at = Utc::now().to_rfc3339();

    sqlx::query(
        r#"INSERT INTO attestations (id, contributor_id, created_at, status)
           VALUES (?, ?, ?, 'generating')"#,
    )
    .bind(attestation_id.to_string())
    .bind(contributor_id)
    .bind(created_at)
    .execute(db)
    .await?;

    Ok(())
}

pub async fn set_attestation_anchored(
    db: &Db,
    attestation_id: Uuid,
    proofs_json: &str,
    digest_hex: &str,
    anchor_tx_id: &str,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"UPDATE attestations
           SET status = 'anchored', proofs_json = ?, proofs_digest_hex = ?, anchor_tx_id = ?, error = NULL
           WHERE id = ?"#,
    )
    .bind(proofs_json)
    .bind(digest_hex)
    .bind(anchor_tx_id)
    .bind(attestation_id.to_string())
    .execute(db)
    .await?;
    Ok(())
}

pub async fn set_attestation_failed(
    db: &Db,
    attestation_id: Uuid,
    error: &str,
) -> Result<(), StoreError> {
    sqlx::query(r#"UPDATE attestations SET status = 'failed', error = ? WHERE id = ?"#)
        .bind(error)
        .bind(attestation_id.to_string())
        .execute(db)
        .await?;
    Ok(())
}

pub async fn get_attestation(
    db: &Db,
    attestation_id: Uuid,
) -> Result<Option<AttestationRow>, StoreError> {
    let row = sqlx::query(
        r#"SELECT contributor_id, created_at, status, proofs_json, proofs_digest_hex, anchor_tx_id, error
           FROM attestations WHERE id = ?"#,
    )
    .bind(attestation_id.to_string())
    .fetch_optional(db)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let created_at: String = row.get(1);
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| StoreError::Malformed(format!("created_at: {e}")))?
        .with_timezone(&Utc);

    Ok(Some(AttestationRow {
        id: attestation_id,
        contributor_id: row.get(0),
        created_at,
        status: row.get(2),
        proofs_json: row.get(3),
        proofs_digest_hex: row.get(4),
        anchor_tx_id: row.get(5),
        error: row.get(6),
    }))
}

/// Anchored attestations available for report matching: (id, contributor, proof blob).
pub async fn list_anchored_attestations(
    db: &Db,
) -> Result<Vec<(Uuid, String, String)>, StoreError> {
    let rows = sqlx::query(
        r#"SELECT id, contributor_id, proofs_json
           FROM attestations
           WHERE status = 'anchored' AND proofs_json IS NOT NULL
           ORDER BY created_at"#,
    )
    .fetch_all(db)
    .await?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let id: String = row.get(0);
        let id = Uuid::parse_str(&id).map_err(|e| StoreError::Malformed(format!("id: {e}")))?;
        out.push((id, row.get(1), row.get(2)));
    }
    Ok(out)
}

// -- Contributors -------------------------------------------------------------

pub async fn upsert_contributor(
    db: &Db,
    contributor_id: &str,
    address: &str,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"INSERT INTO contributors (id, address) VALUES (?, ?)
           ON CONFLICT(id) DO UPDATE SET address = excluded.address"#,
    )
    .bind(contributor_id)
    .bind(address)
    .execute(db)
    .await?;
    Ok(())
}

// -- Credits ------------------------------------------------------------------

pub async fn add_credit(db: &Db, account_id: &str, amount: i64) -> Result<i64, StoreError> {
    sqlx::query(
        r#"INSERT INTO credits (account_id, balance) VALUES (?, ?)
           ON CONFLICT(account_id) DO UPDATE SET balance = balance + excluded.balance"#,
    )
    .bind(account_id)
    .bind(amount)
    .execute(db)
    .await?;

    let row = sqlx::query(r#"SELECT balance FROM credits WHERE account_id = ?"#)
        .bind(account_id)
        .fetch_one(db)
        .await?;
    Ok(row.get(0))
}

// -- Reports ------------------------------------------------------------------

pub async fn insert_report(
    db: &Db,
    report_id: Uuid,
    researcher_id: &str,
    criteria: &[String],
    attestation_ids: &[Uuid],
    settlement_id: Uuid,
) -> Result<(), StoreError> {
    let created_at = Utc::now().to_rfc3339();
    let criteria_json = serde_json::to_string(criteria)
        .map_err(|e| StoreError::Malformed(format!("criteria: {e}")))?;
    let ids: Vec<String> = attestation_ids.iter().map(Uuid::to_string).collect();
    let attestation_ids_json =
        serde_json::to_string(&ids).map_err(|e| StoreError::Malformed(format!("ids: {e}")))?;

    sqlx::query(
        r#"INSERT INTO reports (id, researcher_id, created_at, criteria_json, attestation_ids_json, settlement_id)
           VALUES (?, ?, ?, ?, ?, ?)"#,
    )
    .bind(report_id.to_string())
    .bind(researcher_id)
    .bind(created_at)
    .bind(criteria_json)
    .bind(attestation_ids_json)
    .bind(settlement_id.to_string())
    .execute(db)
    .await?;

    Ok(())
}

// -- SettlementStore ----------------------------------------------------------

impl SettlementStore for Db {
    async fn credit_balance(&self, account_id: &str) -> Result<i64, StoreError> {
        let row = sqlx::query(r#"SELECT balance FROM credits WHERE account_id = ?"#)
            .bind(account_id)
            .fetch_optional(self)
            .await?;
        Ok(row.map_or(0, |r| r.get(0)))
    }

    async fn debit_credit(&self, account_id: &str, amount: i64) -> Result<(), StoreError> {
        sqlx::query(r#"UPDATE credits SET balance = balance - ? WHERE account_id = ?"#)
            .bind(amount)
            .bind(account_id)
            .execute(self)
            .await?;
        Ok(())
    }

    async fn contributor_addresses(&self, ids: &[String]) -> Result<Vec<Payee>, StoreError> {
        let mut payees = Vec::with_capacity(ids.len());
        for id in ids {
            let row = sqlx::query(r#"SELECT address FROM contributors WHERE id = ?"#)
                .bind(id)
                .fetch_optional(self)
                .await?;
            if let Some(row) = row {
                payees.push(Payee {
                    id: id.clone(),
                    address: row.get(0),
                });
            }
        }
        Ok(payees)
    }

    async fn insert_earnings(&self, rows: &[EarningRow]) -> Result<(), StoreError> {
        let created_at = Utc::now().to_rfc3339();
        for earning in rows {
            sqlx::query(
                r#"INSERT INTO earnings (id, payee_id, settlement_id, amount_stroops, settled, tx_id, created_at)
                   VALUES (?, ?, ?, ?, ?, ?, ?)"#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&earning.payee_id)
            .bind(earning.settlement_id.to_string())
            .bind(earning.amount_stroops)
            .bind(i64::from(earning.settled))
            .bind(&earning.tx_id)
            .bind(&created_at)
            .execute(self)
            .await?;
        }
        Ok(())
    }
}
