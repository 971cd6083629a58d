//! RestClient behavior against a mock HTTP server.

use aeronyx_cache::CacheStore;
use aeronyx_core::ErrorKind;
use aeronyx_rest::{
    BreakerConfig, CircuitState, RequestOptions, RestClient, RestConfig, RetryConfig,
};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_retries: 3,
        initial_delay_ms: 20,
        max_delay_ms: 200,
        backoff_multiplier: 2.0,
    }
}

fn client_with(server: &MockServer, retry: RetryConfig, breaker: BreakerConfig) -> RestClient {
    let config = RestConfig {
        api_url: server.uri(),
        retry,
        breaker,
        ..RestConfig::default()
    };
    RestClient::new(config, Arc::new(CacheStore::default())).unwrap()
}

fn client(server: &MockServer) -> RestClient {
    client_with(server, fast_retry(), BreakerConfig::default())
}

// ============================================================================
// Retry
// ============================================================================

#[tokio::test]
async fn test_server_error_retried_then_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/aeronyx/user/nodes-overview/"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"message": "db down"})))
        .expect(4)
        .mount(&server)
        .await;

    let started = Instant::now();
    let err = client(&server)
        .post(
            "/user/nodes-overview/",
            json!({"wallet_address": "0xabc"}),
            RequestOptions::idempotent(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::Server);
    assert_eq!(err.status, Some(500));
    assert_eq!(err.message, "db down");
    // 20 + 40 + 80 ms of backoff between the four attempts
    assert!(started.elapsed() >= Duration::from_millis(140));
}

#[tokio::test]
async fn test_transient_failure_recovers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/aeronyx/node-types/"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/aeronyx/node-types/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true, "data": []})))
        .mount(&server)
        .await;

    let value = client(&server)
        .get("/node-types/", RequestOptions::default())
        .await
        .unwrap();
    assert_eq!(value, json!([]));
}

#[tokio::test]
async fn test_non_idempotent_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/aeronyx/nodes/"))
        .respond_with(ResponseTemplate::new(502))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server)
        .post("/nodes/", json!({"name": "edge"}), RequestOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Server);
}

#[tokio::test]
async fn test_client_errors_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/aeronyx/node-resources/"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({"detail": "forbidden"})))
        .expect(1)
        .mount(&server)
        .await;

    let c = client(&server);
    let err = c
        .get("/node-resources/", RequestOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Authorization);
    assert_eq!(c.breaker_state(), CircuitState::Closed);
}

#[tokio::test]
async fn test_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/aeronyx/node-types/"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let c = client_with(&server, RetryConfig::none(), BreakerConfig::default());
    let err = c
        .get(
            "/node-types/",
            RequestOptions::default().with_timeout(Duration::from_millis(100)),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Timeout);
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let config = RestConfig {
        api_url: format!("http://{addr}"),
        retry: RetryConfig::none(),
        ..RestConfig::default()
    };
    let c = RestClient::new(config, Arc::new(CacheStore::default())).unwrap();

    let err = c
        .get("/node-types/", RequestOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Network);
}

// ============================================================================
// Envelope
// ============================================================================

#[tokio::test]
async fn test_failed_envelope_becomes_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/aeronyx/user/node-detailed-status/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "message": "Remote management is not enabled for this node",
            "code": "REMOTE_NOT_ENABLED"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server)
        .post(
            "/user/node-detailed-status/",
            json!({"reference_code": "AERO-1"}),
            RequestOptions::idempotent(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::RemoteNotEnabled);
    assert_eq!(err.code.as_deref(), Some("REMOTE_NOT_ENABLED"));
}

// ============================================================================
// Circuit breaker
// ============================================================================

#[tokio::test]
async fn test_circuit_opens_and_fails_fast() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/aeronyx/node-types/"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(5)
        .expect(5)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/aeronyx/node-types/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let c = client_with(
        &server,
        RetryConfig::none(),
        BreakerConfig {
            failure_threshold: 5,
            recovery_timeout_secs: 1,
        },
    );

    for _ in 0..5 {
        let err = c
            .get("/node-types/", RequestOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Server);
    }
    assert_eq!(c.breaker_state(), CircuitState::Open);

    // No request reaches the server while open.
    let err = c
        .get("/node-types/", RequestOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::CircuitOpen);

    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert_eq!(c.breaker_state(), CircuitState::HalfOpen);

    c.get("/node-types/", RequestOptions::default())
        .await
        .unwrap();
    assert_eq!(c.breaker_state(), CircuitState::Closed);
}

// ============================================================================
// Cache and de-duplication
// ============================================================================

#[tokio::test]
async fn test_response_cache_and_force_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/aeronyx/user/nodes-overview/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {"summary": {"total_nodes": 1}}
        })))
        .expect(2)
        .mount(&server)
        .await;

    let c = client(&server);
    let opts = RequestOptions::cached(Duration::from_secs(30));

    let first = c
        .post(
            "/user/nodes-overview/",
            json!({"wallet_address": "0xabc", "signature": "0x1", "message": "m1"}),
            opts.clone(),
        )
        .await
        .unwrap();
    // Same params, fresh signature: still a hit.
    let second = c
        .post(
            "/user/nodes-overview/",
            json!({"wallet_address": "0xabc", "signature": "0x2", "message": "m2"}),
            opts.clone(),
        )
        .await
        .unwrap();
    assert_eq!(first, second);

    c.post(
        "/user/nodes-overview/",
        json!({"wallet_address": "0xabc"}),
        opts.force_refresh(true),
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn test_identical_in_flight_requests_share_one_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/aeronyx/user/node-performance-history/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"history": []}))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let c = client(&server);
    let body = json!({"wallet_address": "0xabc", "reference_code": "AERO-1", "hours": 24});

    let calls = (0..5).map(|_| {
        c.post(
            "/user/node-performance-history/",
            body.clone(),
            RequestOptions::idempotent(),
        )
    });
    let results = futures_util::future::join_all(calls).await;
    assert!(results.iter().all(|r| r.as_ref().unwrap() == &json!({"history": []})));
}
