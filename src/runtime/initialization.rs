//! # Initialization
//!
//! Gateway initialization: tracing, metrics, configuration, handle cache and
//! HTTP server startup.

use crate::cache::HandleCache;
use crate::config::{load_config, KeyConfig};
use crate::constants;
use crate::crypt::RsaCryptFactory;
use crate::observability;
use crate::server::{start_server, AppState, ServerState};
use anyhow::Result;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Initialization result containing all necessary components for the gateway
#[derive(Debug)]
pub struct InitializationResult {
    /// State shared with the HTTP handlers
    pub state: AppState,
    /// HTTP server task, finishes on shutdown
    pub server_handle: tokio::task::JoinHandle<()>,
}

/// Install the tracing subscriber
///
/// `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    if let Err(e) = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| constants::DEFAULT_LOG_FILTER.into()),
        )
        .try_init()
    {
        eprintln!("Tracing subscriber already initialized: {e}");
    }
}

/// Initialize the gateway runtime
///
/// This function handles:
/// - Tracing subscriber setup
/// - Metrics registration
/// - Configuration loading
/// - Handle cache creation (starts watching the key files)
/// - HTTP server startup
pub async fn initialize() -> Result<InitializationResult> {
    init_tracing();

    info!("Starting PaaS crypt gateway v{}", env!("CARGO_PKG_VERSION"));

    observability::metrics::register_metrics()?;

    let (key_config, server_config) = load_config();
    log_key_config(&key_config);

    let cache = Arc::new(HandleCache::new(
        RsaCryptFactory,
        key_config.key_paths(),
        key_config.check_interval,
    ));
    let server_state = Arc::new(ServerState::default());
    let state = AppState::new(cache, Arc::clone(&server_state));

    let startup_timeout = Duration::from_secs(server_config.startup_timeout_secs);
    let poll_interval = Duration::from_millis(server_config.poll_interval_ms);

    let server_app_state = state.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(server_config, server_app_state).await {
            error!("HTTP server error: {:#}", e);
        }
    });

    // Wait for the listener before reporting the gateway as started
    wait_for_server_ready(&server_state, &server_handle, startup_timeout, poll_interval).await?;

    info!("Gateway initialized");
    Ok(InitializationResult {
        state,
        server_handle,
    })
}

fn log_key_config(config: &KeyConfig) {
    info!(
        "Public key: {}, private keys: {:?}, key check interval: {:?}",
        config.public_key_path.display(),
        config.private_key_paths,
        config.check_interval
    );
    for path in config
        .private_key_paths
        .iter()
        .chain(std::iter::once(&config.public_key_path))
    {
        if !path.exists() {
            warn!(
                "Key file {} does not exist yet, requests will fail until it is mounted",
                path.display()
            );
        }
    }
}

/// Wait for the HTTP server to become ready
async fn wait_for_server_ready(
    server_state: &ServerState,
    server_handle: &tokio::task::JoinHandle<()>,
    startup_timeout: Duration,
    poll_interval: Duration,
) -> Result<()> {
    let start_time = Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }

        if server_state.is_listening() {
            info!("HTTP server is ready and accepting connections");
            return Ok(());
        }

        if start_time.elapsed() > startup_timeout {
            return Err(anyhow::anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }

        tokio::time::sleep(poll_interval).await;
    }
}
