//! # HTTP Server Tests
//!
//! Drives the router in-process with `axum-test`:
//! - `/v1/encrypt` and `/v1/checkpaas` request/response contracts and status codes
//! - probes, version and metrics endpoints
//! - readiness follows key material health
//! - security headers on every response

mod common;

use axum::body::Bytes;
use axum::http::StatusCode;
use axum_test::TestServer;
use common::{KeyDir, KEY_A, KEY_B, NOT_DECRYPTABLE, PLAINTEXT, REPO, TENANT};
use paas_crypt_gateway::cache::HandleCache;
use paas_crypt_gateway::config::ServerConfig;
use paas_crypt_gateway::crypt::{CryptHandle, RsaCryptFactory};
use paas_crypt_gateway::server::handlers::{CheckPaasResult, EncryptResult};
use paas_crypt_gateway::server::{build_router, AppState, ServerState};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

struct Fixture {
    dir: KeyDir,
    state: AppState,
    server: TestServer,
}

fn fixture_with(config: &ServerConfig) -> Fixture {
    let dir = KeyDir::new(&KEY_A);
    let cache = Arc::new(HandleCache::new(
        RsaCryptFactory,
        dir.keys.clone(),
        Duration::ZERO,
    ));
    let server_state = Arc::new(ServerState::default());
    server_state.set_ready(true);
    let state = AppState::new(cache, server_state);
    let server = TestServer::new(build_router(state.clone(), config).unwrap()).unwrap();
    Fixture { dir, state, server }
}

fn fixture() -> Fixture {
    fixture_with(&ServerConfig::default())
}

fn encrypt_for(fixture: &Fixture, tenant: &str, plaintext: &str) -> String {
    fixture
        .state
        .cache
        .get_or_create(tenant)
        .unwrap()
        .encrypt(plaintext.as_bytes())
        .unwrap()
}

fn bundle(tenant: &str, secret: &str) -> Value {
    json!({
        "paas": {
            "metadata": { "name": tenant },
            "spec": { "sshSecrets": { (REPO): secret } }
        }
    })
}

#[tokio::test]
async fn test_encrypt_private_key() {
    let fixture = fixture();

    let response = fixture
        .server
        .post("/v1/encrypt")
        .json(&json!({ "paas": TENANT, "secret": KEY_B.private_pem }))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let result: EncryptResult = response.json();
    assert_eq!(result.paas, TENANT);
    assert!(result.valid);
    assert!(!result.encrypted.is_empty());

    let handle = fixture.state.cache.get_or_create(TENANT).unwrap();
    assert_eq!(
        handle.decrypt(&result.encrypted).unwrap(),
        KEY_B.private_pem.as_bytes()
    );
}

#[tokio::test]
async fn test_encrypt_rejects_non_key_secret() {
    let fixture = fixture();

    let response = fixture
        .server
        .post("/v1/encrypt")
        .json(&json!({ "paas": TENANT, "secret": PLAINTEXT }))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let result: EncryptResult = response.json();
    assert_eq!(
        result,
        EncryptResult {
            paas: TENANT.to_string(),
            encrypted: String::new(),
            valid: false,
            error: String::new(),
        }
    );
}

#[tokio::test]
async fn test_encrypt_without_tenant_is_bad_request() {
    let fixture = fixture();

    let response = fixture
        .server
        .post("/v1/encrypt")
        .json(&json!({ "paas": "", "secret": KEY_B.private_pem }))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let result: EncryptResult = response.json();
    assert!(!result.valid);
    assert!(!result.error.is_empty());
}

#[tokio::test]
async fn test_encrypt_malformed_json_is_bad_request() {
    let fixture = fixture();

    let response = fixture
        .server
        .post("/v1/encrypt")
        .bytes(Bytes::from_static(b"{ not json"))
        .content_type("application/json")
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_checkpaas_decryptable_bundle() {
    let fixture = fixture();
    let encrypted = encrypt_for(&fixture, TENANT, PLAINTEXT);

    let response = fixture
        .server
        .post("/v1/checkpaas")
        .json(&bundle(TENANT, &encrypted))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body, json!({ "paas": TENANT, "decrypted": true }));
}

#[tokio::test]
async fn test_checkpaas_not_decryptable_is_unprocessable() {
    let fixture = fixture();

    let response = fixture
        .server
        .post("/v1/checkpaas")
        .json(&bundle(TENANT, NOT_DECRYPTABLE))
        .await;

    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    let result: CheckPaasResult = response.json();
    assert_eq!(result.paas, TENANT);
    assert!(!result.decrypted);
    assert!(result.error.contains("unable to decrypt data"));
}

#[tokio::test]
async fn test_checkpaas_invalid_base64_is_unprocessable() {
    let fixture = fixture();

    let response = fixture
        .server
        .post("/v1/checkpaas")
        .json(&bundle(TENANT, "%%%"))
        .await;

    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    let result: CheckPaasResult = response.json();
    assert!(result.error.contains("base64"));
}

#[tokio::test]
async fn test_checkpaas_other_tenant_is_unprocessable() {
    let fixture = fixture();
    let encrypted = encrypt_for(&fixture, "someone-else", PLAINTEXT);

    let response = fixture
        .server
        .post("/v1/checkpaas")
        .json(&bundle(TENANT, &encrypted))
        .await;

    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_checkpaas_malformed_json_is_bad_request() {
    let fixture = fixture();

    let response = fixture
        .server
        .post("/v1/checkpaas")
        .json(&json!({ "paas": "not a bundle" }))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let result: CheckPaasResult = response.json();
    assert!(!result.decrypted);
    assert!(!result.error.is_empty());
}

#[tokio::test]
async fn test_checkpaas_without_tenant_is_bad_request() {
    let fixture = fixture();

    let response = fixture
        .server
        .post("/v1/checkpaas")
        .json(&bundle("", NOT_DECRYPTABLE))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    // Caller errors do not affect readiness
    assert!(fixture.state.server_state.is_ready());
}

#[tokio::test]
async fn test_missing_keys_flip_readiness_until_restored() {
    let fixture = fixture();
    std::fs::remove_file(fixture.dir.public_path()).unwrap();

    let response = fixture
        .server
        .post("/v1/checkpaas")
        .json(&bundle(TENANT, NOT_DECRYPTABLE))
        .await;
    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

    let ready = fixture.server.get("/readyz").await;
    assert_eq!(ready.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(ready.json::<Value>(), json!({ "message": "not ready" }));

    common::write(fixture.dir.public_path(), &KEY_A.public_pem);
    let encrypted = encrypt_for(&fixture, TENANT, PLAINTEXT);
    let response = fixture
        .server
        .post("/v1/checkpaas")
        .json(&bundle(TENANT, &encrypted))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let ready = fixture.server.get("/readyz").await;
    assert_eq!(ready.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn test_readiness_recovers_without_api_traffic() {
    let fixture = fixture();
    std::fs::remove_file(fixture.dir.public_path()).unwrap();

    let response = fixture
        .server
        .post("/v1/encrypt")
        .json(&json!({ "paas": TENANT, "secret": KEY_B.private_pem }))
        .await;
    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!fixture.state.server_state.is_ready());

    // Still broken: the readiness check itself must not flip it back
    let ready = fixture.server.get("/readyz").await;
    assert_eq!(ready.status_code(), StatusCode::SERVICE_UNAVAILABLE);

    common::write(fixture.dir.public_path(), &KEY_A.public_pem);
    let ready = fixture.server.get("/readyz").await;
    assert_eq!(ready.status_code(), StatusCode::OK);
    assert_eq!(ready.json::<Value>(), json!({ "message": "ready" }));
    assert!(fixture.state.server_state.is_ready());
}

#[tokio::test]
async fn test_probes_and_version() {
    let fixture = fixture();

    let health = fixture.server.get("/healthz").await;
    assert_eq!(health.status_code(), StatusCode::OK);
    assert_eq!(health.json::<Value>(), json!({ "message": "healthy" }));

    let ready = fixture.server.get("/readyz").await;
    assert_eq!(ready.status_code(), StatusCode::OK);
    assert_eq!(ready.json::<Value>(), json!({ "message": "ready" }));

    let version = fixture.server.get("/version").await;
    assert_eq!(
        version.json::<Value>(),
        json!({ "version": env!("CARGO_PKG_VERSION") })
    );
}

#[tokio::test]
async fn test_not_ready_before_startup() {
    let fixture = fixture();
    fixture.state.server_state.set_ready(false);

    let ready = fixture.server.get("/readyz").await;
    assert_eq!(ready.status_code(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let fixture = fixture();

    let response = fixture.server.get("/metrics").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().starts_with("text/plain"));
}

#[tokio::test]
async fn test_security_headers() {
    let fixture = fixture();

    let response = fixture.server.get("/healthz").await;
    let headers = response.headers();
    assert_eq!(headers.get("x-content-type-options").unwrap().to_str().unwrap(), "nosniff");
    assert_eq!(
        headers.get("content-security-policy").unwrap().to_str().unwrap(),
        "default-src 'none'; script-src 'self'; style-src 'self'; img-src 'self'; \
         connect-src 'self'; font-src 'self'; object-src 'none'"
    );
}

#[tokio::test]
async fn test_security_headers_on_errors() {
    let fixture = fixture();

    let response = fixture
        .server
        .post("/v1/checkpaas")
        .json(&bundle(TENANT, NOT_DECRYPTABLE))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        response
            .headers()
            .get("x-content-type-options")
            .unwrap()
            .to_str()
            .unwrap(),
        "nosniff"
    );
}

#[tokio::test]
async fn test_csp_includes_allowed_origins() {
    let config = ServerConfig {
        allowed_origins: vec!["https://paas.example".to_string()],
        ..ServerConfig::default()
    };
    let fixture = fixture_with(&config);

    let response = fixture.server.get("/healthz").await;
    let csp = response
        .headers()
        .get("content-security-policy")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(csp.contains("connect-src 'self' https://paas.example;"));
}
