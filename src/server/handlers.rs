//! # Handlers
//!
//! API, probe and metrics endpoints. Key loading and RSA work block, so every
//! call into the handle cache runs on the blocking thread pool.

use super::error::ServiceError;
use super::AppState;
use crate::crypt::{is_private_key, CryptHandle};
use crate::observability::metrics;
use crate::validation::{validate_bundle, SecretBundle};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use zeroize::Zeroizing;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EncryptInput {
    #[serde(default)]
    pub paas: String,
    #[serde(default)]
    pub secret: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct EncryptResult {
    pub paas: String,
    pub encrypted: String,
    pub valid: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CheckPaasInput {
    pub paas: SecretBundle,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct CheckPaasResult {
    pub paas: String,
    pub decrypted: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

/// `POST /v1/encrypt`
///
/// Only private keys are accepted as secrets; anything else is answered with
/// `valid: false` and nothing is encrypted.
pub async fn encrypt(
    State(state): State<AppState>,
    payload: Result<Json<EncryptInput>, JsonRejection>,
) -> Response {
    let input = match payload {
        Ok(Json(input)) => input,
        Err(rejection) => {
            let result = EncryptResult {
                error: rejection.body_text(),
                ..EncryptResult::default()
            };
            return (StatusCode::BAD_REQUEST, Json(result)).into_response();
        }
    };

    let paas = input.paas;
    let secret = Zeroizing::new(input.secret);

    if !is_private_key(&secret) {
        debug!(tenant = %paas, "Secret is not a private key, not encrypting");
        metrics::increment_encrypt_requests(false);
        return Json(EncryptResult {
            paas,
            ..EncryptResult::default()
        })
        .into_response();
    }
    metrics::increment_encrypt_requests(true);

    let cache = state.cache.clone();
    let tenant = paas.clone();
    let outcome = tokio::task::spawn_blocking(move || -> Result<String, ServiceError> {
        let handle = cache.get_or_create(&tenant)?;
        Ok(handle.encrypt(secret.as_bytes())?)
    })
    .await
    .map_err(ServiceError::from)
    .and_then(|r| r);
    state.record_outcome(&outcome);

    match outcome {
        Ok(encrypted) => {
            info!(tenant = %paas, "Encrypted secret");
            Json(EncryptResult {
                paas,
                encrypted,
                valid: true,
                error: String::new(),
            })
            .into_response()
        }
        Err(e) => {
            error!(tenant = %paas, error = %e, "Failed to encrypt secret");
            let status = e.status();
            let result = EncryptResult {
                paas,
                error: e.to_string(),
                ..EncryptResult::default()
            };
            (status, Json(result)).into_response()
        }
    }
}

/// `POST /v1/checkpaas`
///
/// Reports whether every secret of the submitted bundle decrypts for the bundle's tenant.
pub async fn check_paas(
    State(state): State<AppState>,
    payload: Result<Json<CheckPaasInput>, JsonRejection>,
) -> Response {
    let bundle = match payload {
        Ok(Json(input)) => input.paas,
        Err(rejection) => {
            let result = CheckPaasResult {
                error: rejection.body_text(),
                ..CheckPaasResult::default()
            };
            return (StatusCode::BAD_REQUEST, Json(result)).into_response();
        }
    };

    let paas = bundle.tenant().to_string();
    let secrets = bundle.secret_count();
    let start = Instant::now();
    let cache = state.cache.clone();
    let outcome = tokio::task::spawn_blocking(move || -> Result<(), ServiceError> {
        let handle = cache.get_or_create(bundle.tenant())?;
        validate_bundle(handle.as_ref(), &bundle)?;
        Ok(())
    })
    .await
    .map_err(ServiceError::from)
    .and_then(|r| r);
    metrics::observe_bundle_validation_duration(start.elapsed().as_secs_f64());
    state.record_outcome(&outcome);

    match outcome {
        Ok(()) => {
            info!(tenant = %paas, secrets = secrets, "Bundle decrypted");
            metrics::increment_bundle_validations("ok");
            Json(CheckPaasResult {
                paas,
                decrypted: true,
                error: String::new(),
            })
            .into_response()
        }
        Err(e) => {
            metrics::increment_bundle_validations(e.metric_label());
            let status = e.status();
            if status.is_server_error() {
                error!(tenant = %paas, error = %e, "Bundle check failed");
            } else {
                warn!(tenant = %paas, error = %e, "Bundle does not decrypt");
            }
            let result = CheckPaasResult {
                paas,
                decrypted: false,
                error: e.to_string(),
            };
            (status, Json(result)).into_response()
        }
    }
}

/// `GET /version`
pub async fn version() -> Json<serde_json::Value> {
    Json(json!({ "version": env!("CARGO_PKG_VERSION") }))
}

/// `GET /healthz`
pub async fn healthz() -> Json<serde_json::Value> {
    Json(json!({ "message": "healthy" }))
}

/// `GET /readyz`
///
/// Not ready before the listener is bound and while the key material is unusable.
/// Unusable key material is checked again on every call.
pub async fn readyz(State(state): State<AppState>) -> Response {
    if state.server_state.is_listening() {
        state.recheck_key_material().await;
    }

    if state.server_state.is_ready() {
        Json(json!({ "message": "ready" })).into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "message": "not ready" })),
        )
            .into_response()
    }
}

/// `GET /metrics`
pub async fn metrics_handler() -> Response {
    match metrics::gather_metrics() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to gather metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to gather metrics: {e}"),
            )
                .into_response()
        }
    }
}
