//! # HTTP Server
//!
//! axum server exposing the crypt API, health probes and Prometheus metrics.
//!
//! ## Endpoints
//!
//! - `POST /v1/encrypt` - Encrypt a private key for a tenant
//! - `POST /v1/checkpaas` - Check that a secret bundle decrypts for its tenant
//! - `GET /version` - Service version
//! - `GET /healthz` - Liveness probe
//! - `GET /readyz` - Readiness probe
//! - `GET /metrics` - Prometheus metrics

pub mod error;
pub mod handlers;
pub mod security;

pub use error::ServiceError;

use crate::cache::HandleCache;
use crate::config::ServerConfig;
use crate::crypt::RsaCryptFactory;
use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::Router;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// Readiness of the server
///
/// Ready once the listener is bound, for as long as the key material is usable.
#[derive(Debug)]
pub struct ServerState {
    is_ready: AtomicBool,
    keys_usable: AtomicBool,
}

impl Default for ServerState {
    fn default() -> Self {
        Self {
            is_ready: AtomicBool::new(false),
            keys_usable: AtomicBool::new(true),
        }
    }
}

impl ServerState {
    pub fn is_ready(&self) -> bool {
        self.is_listening() && self.keys_usable()
    }

    /// Whether the listener has been bound
    pub fn is_listening(&self) -> bool {
        self.is_ready.load(Ordering::Relaxed)
    }

    /// Set listener readiness, returning the previous value
    pub fn set_ready(&self, ready: bool) -> bool {
        self.is_ready.swap(ready, Ordering::Relaxed)
    }

    pub fn keys_usable(&self) -> bool {
        self.keys_usable.load(Ordering::Relaxed)
    }

    /// Set key material health, returning the previous value
    pub fn set_keys_usable(&self, usable: bool) -> bool {
        self.keys_usable.swap(usable, Ordering::Relaxed)
    }
}

/// State shared by all handlers
#[derive(Debug, Clone)]
pub struct AppState {
    pub cache: Arc<HandleCache<RsaCryptFactory>>,
    pub server_state: Arc<ServerState>,
}

impl AppState {
    pub fn new(cache: Arc<HandleCache<RsaCryptFactory>>, server_state: Arc<ServerState>) -> Self {
        Self {
            cache,
            server_state,
        }
    }

    /// Track key material health from the outcome of a request
    ///
    /// Unusable key material takes the service out of rotation until a handle
    /// can be built again, by a request or by [`recheck_key_material`](Self::recheck_key_material).
    pub(crate) fn record_outcome<T>(&self, outcome: &Result<T, ServiceError>) {
        match outcome {
            Err(e) if e.is_key_failure() => {
                if self.server_state.set_keys_usable(false) {
                    warn!(error = %e, "Key material unusable, marking server not ready");
                }
            }
            Ok(_) | Err(ServiceError::Validation(_) | ServiceError::Crypt(_)) => {
                self.mark_keys_usable();
            }
            Err(_) => {}
        }
    }

    /// Check key material that was last seen unusable, on the blocking pool
    ///
    /// A not-ready replica receives no API traffic, so this is the only way back
    /// into rotation once the keys are fixed.
    pub async fn recheck_key_material(&self) {
        if self.server_state.keys_usable() {
            return;
        }

        let cache = Arc::clone(&self.cache);
        match tokio::task::spawn_blocking(move || cache.verify_key_material()).await {
            Ok(Ok(())) => self.mark_keys_usable(),
            Ok(Err(e)) => {
                debug!(
                    reason = e.reason.as_str(),
                    "Key material still unusable: {}", e.message
                );
            }
            Err(e) => warn!("Key material check did not complete: {}", e),
        }
    }

    fn mark_keys_usable(&self) {
        if !self.server_state.set_keys_usable(true) {
            info!("Key material usable again, marking server ready");
        }
    }
}

/// Build the application router
///
/// # Errors
///
/// Fails when a configured origin is not a valid header value.
pub fn build_router(state: AppState, config: &ServerConfig) -> Result<Router> {
    let csp = security::csp_header(config)?;
    let cors = security::build_cors_layer(config)?;

    let router = Router::new()
        .route("/v1/encrypt", post(handlers::encrypt))
        .route("/v1/checkpaas", post(handlers::check_paas))
        .route("/version", get(handlers::version))
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::readyz))
        .route("/metrics", get(handlers::metrics_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(axum::middleware::from_fn_with_state(
                    csp,
                    security::security_headers,
                ))
                .layer(cors),
        )
        .with_state(state);

    Ok(router)
}

/// Bind the listener, mark the server ready and serve until Ctrl+C
pub async fn start_server(config: ServerConfig, state: AppState) -> Result<()> {
    let app = build_router(state.clone(), &config)?;

    let listener = tokio::net::TcpListener::bind(&config.endpoint)
        .await
        .with_context(|| format!("Failed to bind HTTP server to {}", config.endpoint))?;

    info!("HTTP server listening on {}", config.endpoint);
    state.server_state.set_ready(true);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
