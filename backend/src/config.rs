//! Service configuration from environment variables.
//!
//! Defaults point at the public test network. Override for staging or tests
//! by setting the variables or constructing the structs directly.

use crate::ledger::tx::Asset;
use crate::settlement::SettlementConfig;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    MissingVar(&'static str),

    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(&'static str, String),

    #[error("invalid number for {0}: {1}")]
    InvalidNumber(&'static str, String),
}

/// Connection parameters for the ledger network.
#[derive(Clone, Debug)]
pub struct LedgerConfig {
    /// Base URL of the Horizon-style ledger API.
    pub horizon_url: Url,
    /// Base URL of the test-network faucet.
    pub friendbot_url: Url,
    /// Passphrase mixed into every signing payload; transactions signed for
    /// one network are invalid on any other.
    pub network_passphrase: String,
    /// Per-operation base fee in stroops.
    pub base_fee: u64,
    /// HTTP request timeout in seconds.
    pub timeout_secs: u64,
    /// Pause after faucet funding before the account is reloadable. The
    /// faucet throttles; funding calls must stay serial.
    pub funding_grace_secs: u64,
}

impl LedgerConfig {
    /// Load from environment.
    ///
    /// Variables:
    /// - `LEDGER_HORIZON_URL` (default: `https://horizon-testnet.stellar.org`)
    /// - `LEDGER_FRIENDBOT_URL` (default: `https://friendbot.stellar.org`)
    /// - `LEDGER_NETWORK_PASSPHRASE` (default: `Test SDF Network ; September 2015`)
    /// - `LEDGER_BASE_FEE` (default: 100)
    /// - `LEDGER_TIMEOUT_SECS` (default: 30)
    /// - `LEDGER_FUNDING_GRACE_SECS` (default: 3)
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            horizon_url: env_url("LEDGER_HORIZON_URL", "https://horizon-testnet.stellar.org")?,
            friendbot_url: env_url("LEDGER_FRIENDBOT_URL", "https://friendbot.stellar.org")?,
            network_passphrase: std::env::var("LEDGER_NETWORK_PASSPHRASE")
                .unwrap_or_else(|_| "Test SDF Network ; September 2015".to_string()),
            base_fee: env_number("LEDGER_BASE_FEE", 100)?,
            timeout_secs: env_number("LEDGER_TIMEOUT_SECS", 30)?,
            funding_grace_secs: env_number("LEDGER_FUNDING_GRACE_SECS", 3)?,
        })
    }

    /// Configuration pointing Horizon and the faucet at one local mock
    /// server, with no funding grace. For tests.
    pub fn local_mock(base_url: &str) -> Result<Self, ConfigError> {
        let url = Url::parse(base_url)
            .map_err(|e| ConfigError::InvalidUrl("local mock", e.to_string()))?;

        Ok(Self {
            horizon_url: url.clone(),
            friendbot_url: url,
            network_passphrase: "Local Test Network".to_string(),
            base_fee: 100,
            timeout_secs: 5,
            funding_grace_secs: 0,
        })
    }
}

/// Full service settings.
///
/// Custom `Debug` redacts the platform signing secret so it can never leak
/// into log output.
#[derive(Clone)]
pub struct Settings {
    pub ledger: LedgerConfig,
    pub settlement: SettlementConfig,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("ledger", &self.ledger)
            .field("platform_secret", &"[REDACTED]")
            .field("payout_asset", &self.settlement.payout_asset)
            .field("payout_total_stroops", &self.settlement.payout_total_stroops)
            .field("credit_cost", &self.settlement.credit_cost)
            .finish()
    }
}

impl Settings {
    /// Load from environment.
    ///
    /// Variables (plus the `LEDGER_*` set):
    /// - `PLATFORM_SIGNING_SECRET` (required): custodial signing seed
    /// - `PAYOUT_ASSET_CODE` (default: `USDC`)
    /// - `PAYOUT_ASSET_ISSUER` (required)
    /// - `PAYOUT_TOTAL_UNITS` (default: 30): whole asset units split per settlement
    /// - `CREDIT_COST` (default: 1): credits consumed per report
    pub fn from_env() -> Result<Self, ConfigError> {
        let platform_secret = std::env::var("PLATFORM_SIGNING_SECRET")
            .map_err(|_| ConfigError::MissingVar("PLATFORM_SIGNING_SECRET"))?;
        let issuer = std::env::var("PAYOUT_ASSET_ISSUER")
            .map_err(|_| ConfigError::MissingVar("PAYOUT_ASSET_ISSUER"))?;
        let code =
            std::env::var("PAYOUT_ASSET_CODE").unwrap_or_else(|_| "USDC".to_string());

        let payout_units: i64 = env_number("PAYOUT_TOTAL_UNITS", 30)?;

        Ok(Self {
            ledger: LedgerConfig::from_env()?,
            settlement: SettlementConfig {
                platform_secret,
                payout_asset: Asset { code, issuer },
                payout_total_stroops: payout_units * crate::ledger::tx::STROOPS_PER_UNIT,
                credit_cost: env_number("CREDIT_COST", 1)?,
            },
        })
    }
}

fn env_url(var: &'static str, default: &str) -> Result<Url, ConfigError> {
    let raw = std::env::var(var).unwrap_or_else(|_| default.to_string());
    Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl(var, e.to_string()))
}

fn env_number<T: std::str::FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidNumber(var, raw)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_mock_points_both_endpoints_at_one_server() {
        let cfg = LedgerConfig::local_mock("http://127.0.0.1:9000").unwrap();
        assert_eq!(cfg.horizon_url, cfg.friendbot_url);
        assert_eq!(cfg.funding_grace_secs, 0);
    }

    #[test]
    fn settings_debug_redacts_the_signing_secret() {
        let settings = Settings {
            ledger: LedgerConfig::local_mock("http://127.0.0.1:9000").unwrap(),
            settlement: SettlementConfig {
                platform_secret: "SBTOPSECRETSEED".to_string(),
                payout_asset: Asset {
                    code: "USDC".to_string(),
                    issuer: "G".repeat(56),
                },
                payout_total_stroops: 300_000_000,
                credit_cost: 1,
            },
        };

        let rendered = format!("{settings:?}");
        assert!(!rendered.contains("SBTOPSECRETSEED"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
