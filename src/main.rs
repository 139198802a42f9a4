//! # PaaS Crypt Gateway
//!
//! HTTP service that encrypts secrets for tenants and checks that tenant secret
//! bundles decrypt with the currently mounted RSA keys.
//!
//! ## Overview
//!
//! 1. **Per-tenant handles** - One RSA-OAEP handle per tenant, the tenant name is bound
//!    into every ciphertext
//! 2. **Key rotation** - Mounted key files are fingerprinted; a change drops every cached handle
//! 3. **Bundle checks** - Every secret of a bundle, including disabled capabilities, must decrypt
//!
//! ## Configuration
//!
//! See [`paas_crypt_gateway::config`] for the environment variables.

use anyhow::Result;
use paas_crypt_gateway::runtime::initialization::initialize;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let init_result = initialize().await?;

    if let Err(e) = init_result.server_handle.await {
        anyhow::bail!("HTTP server task failed: {e}");
    }

    info!("PaaS crypt gateway stopped");
    Ok(())
}
