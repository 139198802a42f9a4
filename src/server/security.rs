//! # Security Headers and CORS
//!
//! Every response carries `X-Content-Type-Options: nosniff` and a restrictive
//! Content-Security-Policy. Configured origins are appended to the directives that
//! load or connect to external resources.

use crate::config::ServerConfig;
use anyhow::{Context, Result};
use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, Method};
use axum::middleware::Next;
use axum::response::Response;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// Build the Content-Security-Policy value for `external_hosts`
pub fn build_csp(external_hosts: &[String]) -> String {
    let hosts = external_hosts.join(" ");
    let directive = |name: &str| {
        if hosts.is_empty() {
            format!("{name} 'self'")
        } else {
            format!("{name} 'self' {hosts}")
        }
    };

    [
        "default-src 'none'".to_string(),
        directive("script-src"),
        directive("style-src"),
        directive("img-src"),
        directive("connect-src"),
        directive("font-src"),
        "object-src 'none'".to_string(),
    ]
    .join("; ")
}

/// Middleware adding the security headers to every response
pub async fn security_headers(
    State(csp): State<HeaderValue>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_SECURITY_POLICY, csp);
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    response
}

/// Content-Security-Policy header value for the configured origins
pub fn csp_header(config: &ServerConfig) -> Result<HeaderValue> {
    let csp = build_csp(&config.allowed_origins);
    HeaderValue::from_str(&csp).context("Allowed origins produce an invalid Content-Security-Policy")
}

/// Build the CORS layer from the configured origins
///
/// A single `*` allows every origin; an empty list allows none.
pub fn build_cors_layer(config: &ServerConfig) -> Result<CorsLayer> {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::HEAD, Method::OPTIONS])
        .allow_headers([header::ORIGIN, header::CONTENT_TYPE]);

    if config.allows_all_origins() {
        info!("CORS: allowing all origins");
        return Ok(cors.allow_origin(Any));
    }

    let origins = config
        .allowed_origins
        .iter()
        .map(|o| {
            o.parse::<HeaderValue>()
                .with_context(|| format!("Invalid CORS origin: {o}"))
        })
        .collect::<Result<Vec<_>>>()?;
    info!("CORS: allowing origins: {:?}", config.allowed_origins);
    Ok(cors.allow_origin(origins))
}
