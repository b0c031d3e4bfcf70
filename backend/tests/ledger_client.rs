//! Ledger client tests against a mocked Horizon-style API.
//!
//! ## Endpoints exercised
//!
//! | Method | Path | Test |
//! |--------|------|------|
//! | GET    | `/accounts/{address}` | `load_account_*`, `verify_data_*` |
//! | GET    | `/?addr={address}` (faucet) | `load_or_fund_*` |
//! | POST   | `/transactions` | `anchor_data_*`, `create_trustline_*`, `transfer_asset_*` |

use backend::config::LedgerConfig;
use backend::ledger::keys::Keypair;
use backend::ledger::tx::Asset;
use backend::ledger::{LedgerClient, LedgerError};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_client(mock_server: &MockServer) -> LedgerClient {
    let config = LedgerConfig::local_mock(&mock_server.uri()).unwrap();
    LedgerClient::new(config).unwrap()
}

fn test_asset() -> Asset {
    Asset {
        code: "USDC".to_string(),
        issuer: Keypair::generate().public_address(),
    }
}

fn account_body(address: &str, sequence: &str) -> serde_json::Value {
    json!({
        "account_id": address,
        "sequence": sequence,
        "balances": [
            { "asset_type": "native", "balance": "10000.0000000" }
        ],
        "data": {}
    })
}

// -- load_account ------------------------------------------------------------

#[tokio::test]
async fn load_account_parses_the_snapshot() {
    let mock_server = MockServer::start().await;
    let address = Keypair::generate().public_address();

    Mock::given(method("GET"))
        .and(path(format!("/accounts/{address}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(account_body(&address, "12884901888")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let account = client.load_account(&address).await.unwrap();

    assert_eq!(account.address, address);
    assert_eq!(account.sequence, 12_884_901_888);
    assert_eq!(account.native_balance(), Some("10000.0000000"));
}

#[tokio::test]
async fn load_account_maps_404_to_account_not_found() {
    let mock_server = MockServer::start().await;
    let address = Keypair::generate().public_address();

    Mock::given(method("GET"))
        .and(path(format!("/accounts/{address}")))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let err = client.load_account(&address).await.unwrap_err();
    assert!(matches!(err, LedgerError::AccountNotFound(a) if a == address));
}

#[tokio::test]
async fn load_or_fund_funds_exactly_once_then_retries() {
    let mock_server = MockServer::start().await;
    let address = Keypair::generate().public_address();

    // First load: unknown account. Mounted first so it matches first.
    Mock::given(method("GET"))
        .and(path(format!("/accounts/{address}")))
        .respond_with(ResponseTemplate::new(404))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    // Faucet call.
    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("addr", address.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "hash": "fundtx" })))
        .expect(1)
        .mount(&mock_server)
        .await;

    // Retry after funding.
    Mock::given(method("GET"))
        .and(path(format!("/accounts/{address}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(account_body(&address, "1")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let account = client.load_or_fund(&address).await.unwrap();
    assert_eq!(account.sequence, 1);
}

#[tokio::test]
async fn load_or_fund_gives_up_when_funding_fails() {
    let mock_server = MockServer::start().await;
    let address = Keypair::generate().public_address();

    Mock::given(method("GET"))
        .and(path(format!("/accounts/{address}")))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    // Faucet throttled.
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let err = client.load_or_fund(&address).await.unwrap_err();
    assert!(matches!(err, LedgerError::FundingFailed { status: 429, .. }));
}

// -- anchor_data -------------------------------------------------------------

#[tokio::test]
async fn anchor_data_submits_a_manage_data_transaction() {
    let mock_server = MockServer::start().await;
    let keypair = Keypair::generate();
    let address = keypair.public_address();

    Mock::given(method("GET"))
        .and(path(format!("/accounts/{address}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(account_body(&address, "41")))
        .mount(&mock_server)
        .await;

    let digest = "ab".repeat(32);
    Mock::given(method("POST"))
        .and(path("/transactions"))
        .and(body_partial_json(json!({
            "tx": {
                "source_account": address,
                "sequence": 42,
                "operations": [
                    { "type": "manage_data", "name": "attest_proofs", "value": BASE64.encode(&digest) }
                ]
            }
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "hash": "tx-anchor-1", "ledger": 7 })),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let hash = client
        .anchor_data(&keypair.secret_seed(), "attest_proofs", &digest)
        .await
        .unwrap();
    assert_eq!(hash, "tx-anchor-1");
}

#[tokio::test]
async fn anchor_data_rejects_oversized_values_before_any_network_call() {
    let mock_server = MockServer::start().await;
    let keypair = Keypair::generate();

    let client = test_client(&mock_server);
    let err = client
        .anchor_data(&keypair.secret_seed(), "attest_proofs", &"x".repeat(65))
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::DataValueTooLarge { len: 65 }));
    assert!(mock_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn anchor_data_rejects_a_malformed_seed() {
    let mock_server = MockServer::start().await;
    let client = test_client(&mock_server);

    let err = client
        .anchor_data("not-a-seed", "attest_proofs", "abc")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidKey));
}

// -- verify_data -------------------------------------------------------------

#[tokio::test]
async fn verify_data_compares_the_stored_entry() {
    let mock_server = MockServer::start().await;
    let address = Keypair::generate().public_address();
    let digest = "cd".repeat(32);

    Mock::given(method("GET"))
        .and(path(format!("/accounts/{address}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "account_id": address,
            "sequence": "5",
            "balances": [],
            "data": { "content_hash": BASE64.encode(&digest) }
        })))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    assert!(client.verify_data(&address, "content_hash", &digest).await.unwrap());
    assert!(
        !client
            .verify_data(&address, "content_hash", &"ee".repeat(32))
            .await
            .unwrap()
    );
    assert!(!client.verify_data(&address, "other_key", &digest).await.unwrap());
}

// -- create_trustline --------------------------------------------------------

#[tokio::test]
async fn create_trustline_is_a_noop_when_the_line_exists() {
    let mock_server = MockServer::start().await;
    let keypair = Keypair::generate();
    let address = keypair.public_address();
    let asset = test_asset();

    Mock::given(method("GET"))
        .and(path(format!("/accounts/{address}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "account_id": address,
            "sequence": "9",
            "balances": [
                { "asset_type": "native", "balance": "100.0000000" },
                {
                    "asset_type": "credit_alphanum4",
                    "asset_code": asset.code,
                    "asset_issuer": asset.issuer,
                    "balance": "5.0000000"
                }
            ],
            "data": {}
        })))
        .mount(&mock_server)
        .await;

    // No transaction may be submitted.
    Mock::given(method("POST"))
        .and(path("/transactions"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let result = client
        .create_trustline(&keypair.secret_seed(), &asset, "1000000")
        .await
        .unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn create_trustline_submits_change_trust_when_missing() {
    let mock_server = MockServer::start().await;
    let keypair = Keypair::generate();
    let address = keypair.public_address();
    let asset = test_asset();

    Mock::given(method("GET"))
        .and(path(format!("/accounts/{address}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(account_body(&address, "9")))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/transactions"))
        .and(body_partial_json(json!({
            "tx": { "operations": [{ "type": "change_trust", "limit": "1000000" }] }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "hash": "tx-trust-1" })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let result = client
        .create_trustline(&keypair.secret_seed(), &asset, "1000000")
        .await
        .unwrap();
    assert_eq!(result.as_deref(), Some("tx-trust-1"));
}

// -- transfer_asset ----------------------------------------------------------

#[tokio::test]
async fn transfer_asset_formats_the_amount_to_seven_decimals() {
    let mock_server = MockServer::start().await;
    let keypair = Keypair::generate();
    let address = keypair.public_address();
    let recipient = Keypair::generate().public_address();
    let asset = test_asset();

    Mock::given(method("GET"))
        .and(path(format!("/accounts/{address}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(account_body(&address, "3")))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/transactions"))
        .and(body_partial_json(json!({
            "tx": {
                "fee": 100,
                "operations": [
                    { "type": "payment", "destination": recipient, "amount": "10.0000000" }
                ]
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "hash": "tx-pay-1" })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let hash = client
        .transfer_asset(&keypair.secret_seed(), &recipient, &asset, 100_000_000)
        .await
        .unwrap();
    assert_eq!(hash, "tx-pay-1");
}

#[tokio::test]
async fn transfer_asset_maps_op_no_trust_to_a_typed_error() {
    let mock_server = MockServer::start().await;
    let keypair = Keypair::generate();
    let address = keypair.public_address();
    let recipient = Keypair::generate().public_address();
    let asset = test_asset();

    Mock::given(method("GET"))
        .and(path(format!("/accounts/{address}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(account_body(&address, "3")))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/transactions"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "extras": {
                "result_codes": {
                    "transaction": "tx_failed",
                    "operations": ["op_no_trust"]
                }
            }
        })))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let err = client
        .transfer_asset(&keypair.secret_seed(), &recipient, &asset, 100_000_000)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NoTrustline { asset_code } if asset_code == "USDC"));
}

#[tokio::test]
async fn transfer_asset_rejects_an_invalid_recipient_locally() {
    let mock_server = MockServer::start().await;
    let keypair = Keypair::generate();
    let asset = test_asset();

    let client = test_client(&mock_server);
    let err = client
        .transfer_asset(&keypair.secret_seed(), "not-an-address", &asset, 100_000_000)
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::InvalidAddress(_)));
    assert!(mock_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn other_rejections_keep_their_result_codes() {
    let mock_server = MockServer::start().await;
    let keypair = Keypair::generate();
    let address = keypair.public_address();
    let recipient = Keypair::generate().public_address();
    let asset = test_asset();

    Mock::given(method("GET"))
        .and(path(format!("/accounts/{address}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(account_body(&address, "3")))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/transactions"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "extras": {
                "result_codes": {
                    "transaction": "tx_bad_seq",
                    "operations": []
                }
            }
        })))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let err = client
        .transfer_asset(&keypair.secret_seed(), &recipient, &asset, 100_000_000)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Rejected { transaction_code, .. } if transaction_code == "tx_bad_seq"));
}
