//! One-shot commands against a mock API, signed by a real local key.

use aeronyx_core::{DataQuality, DataSource, ErrorKind, WalletType};
use aeronyx_monitor::{AppConfig, AppError, Application, LocalWallet};
use aeronyx_rest::RetryConfig;
use alloy::primitives::PrimitiveSignature;
use chrono::Utc;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// Well-known development key (anvil account 0).
const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
const DEV_ADDRESS: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";
const CHALLENGE: &str = "Sign in to AeroNyx: 7f3a";

const SIGNATURE_MESSAGE: &str = "/api/aeronyx/generate-signature-message/";
const OVERVIEW: &str = "/api/aeronyx/user/nodes-overview/";
const DETAILED_STATUS: &str = "/api/aeronyx/user/node-detailed-status/";

fn config(server: &MockServer, credential_dir: Option<&Path>) -> AppConfig {
    let mut config = AppConfig::default();
    config.api.api_url = server.uri();
    config.api.retry = RetryConfig {
        max_retries: 0,
        ..RetryConfig::default()
    };
    config.auth.credential_dir = credential_dir.map(Path::to_path_buf);
    config
}

fn app(server: &MockServer, credential_dir: Option<&Path>) -> Application {
    let wallet = LocalWallet::from_hex(DEV_KEY, WalletType::Metamask).unwrap();
    Application::new(config(server, credential_dir), Arc::new(wallet)).unwrap()
}

async fn mount_challenge(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path(SIGNATURE_MESSAGE))
        .and(body_partial_json(json!({"wallet_address": DEV_ADDRESS})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {"message": CHALLENGE, "timestamp": 1_700_000_000}
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

fn status_body() -> Value {
    json!({
        "success": true,
        "data": {
            "node": {"reference_code": "AERO-1", "name": "edge-1", "status": "active"},
            "uptime_seconds": 7200
        }
    })
}

// =============================================================================
// Overview
// =============================================================================

#[tokio::test]
async fn test_overview_signed_by_local_key() {
    let server = MockServer::start().await;
    mount_challenge(&server, 1).await;
    Mock::given(method("POST"))
        .and(path(OVERVIEW))
        .and(body_partial_json(json!({
            "wallet_address": DEV_ADDRESS,
            "message": CHALLENGE,
            "wallet_type": "metamask"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {
                "nodes": {
                    "online": [{
                        "reference_code": "AERO-1",
                        "name": "edge-1",
                        "performance": {"cpu_usage": 20.0, "memory_usage": 40.0},
                        "total_earnings": "2.5"
                    }],
                    "offline": [{"reference_code": "AERO-2", "name": "edge-2"}]
                },
                "timestamp": Utc::now().to_rfc3339()
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let view = app(&server, None).overview().await.unwrap();
    assert_eq!(view.data_source, Some(DataSource::Rest));
    assert_eq!(view.data_quality, DataQuality::Recent);
    assert_eq!(view.stats.total_nodes, 2);
    assert_eq!(view.stats.active_nodes, 1);
    assert_eq!(view.stats.offline_nodes, 1);
    assert!(view.node("AERO-2").is_some());

    // The backend can recover the wallet from what was sent.
    let requests = server.received_requests().await.unwrap();
    let overview = requests
        .iter()
        .find(|r| r.url.path() == OVERVIEW)
        .unwrap();
    let body: Value = serde_json::from_slice(&overview.body).unwrap();
    let bytes = hex::decode(body["signature"].as_str().unwrap().trim_start_matches("0x")).unwrap();
    let signature = PrimitiveSignature::try_from(bytes.as_slice()).unwrap();
    let recovered = signature.recover_address_from_msg(CHALLENGE).unwrap();
    assert_eq!(recovered.to_string().to_ascii_lowercase(), DEV_ADDRESS);
}

#[tokio::test]
async fn test_overview_challenge_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SIGNATURE_MESSAGE))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = app(&server, None).overview().await.unwrap_err();
    assert!(matches!(err, AppError::Sync(_)));
    assert_eq!(err.kind(), Some(ErrorKind::Network));
}

// =============================================================================
// Node queries
// =============================================================================

#[tokio::test]
async fn test_status_reuses_credential() {
    let server = MockServer::start().await;
    mount_challenge(&server, 1).await;
    Mock::given(method("POST"))
        .and(path(DETAILED_STATUS))
        .and(body_partial_json(json!({"reference_code": "AERO-1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_body()))
        .expect(2)
        .mount(&server)
        .await;

    let app = app(&server, None);
    let status = app.node_status(" AERO-1 ").await.unwrap();
    assert_eq!(status.node.name, "edge-1");
    assert_eq!(status.uptime_seconds, Some(7200));
    app.node_status("AERO-1").await.unwrap();
}

#[tokio::test]
async fn test_rejected_credential_signs_again() {
    let server = MockServer::start().await;
    mount_challenge(&server, 2).await;
    Mock::given(method("POST"))
        .and(path(DETAILED_STATUS))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "success": false,
            "message": "Signature expired"
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(DETAILED_STATUS))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_body()))
        .mount(&server)
        .await;

    let app = app(&server, None);
    let err = app.node_status("AERO-1").await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::Authentication));
    assert!(app.node_status("AERO-1").await.is_ok());
}

#[tokio::test]
async fn test_history_validates_window() {
    let server = MockServer::start().await;
    mount_challenge(&server, 1).await;

    let err = app(&server, None).node_history("AERO-1", 0).await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::Validation));
}

#[tokio::test]
async fn test_node_types_needs_no_signature() {
    let server = MockServer::start().await;
    mount_challenge(&server, 0).await;
    Mock::given(method("GET"))
        .and(path("/api/aeronyx/node-types/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": [
                {"id": 1, "name": "Compute"},
                {"id": 2, "name": "Storage", "description": "Disk-heavy"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let types = app(&server, None).node_types().await.unwrap();
    assert_eq!(types.len(), 2);
    assert_eq!(types[1].description.as_deref(), Some("Disk-heavy"));
}

// =============================================================================
// Persistence
// =============================================================================

#[tokio::test]
async fn test_persisted_credential_survives_restart() {
    let server = MockServer::start().await;
    mount_challenge(&server, 1).await;
    Mock::given(method("POST"))
        .and(path(DETAILED_STATUS))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_body()))
        .expect(2)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    app(&server, Some(dir.path()))
        .node_status("AERO-1")
        .await
        .unwrap();

    // Fresh cache, same credential directory.
    app(&server, Some(dir.path()))
        .node_status("AERO-1")
        .await
        .unwrap();
}
