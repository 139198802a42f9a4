//! # Constants
//!
//! Default values shared by configuration, the HTTP server and the CLI.

/// Default public key location (mounted secret in the deployment)
pub const DEFAULT_PUBLIC_KEY_PATH: &str = "/secrets/paas/publicKey";

/// Default private key location(s), comma separated
pub const DEFAULT_PRIVATE_KEYS_PATH: &str = "/secrets/paas/privateKey";

/// Default listen address for the API server
pub const DEFAULT_ENDPOINT: &str = "0.0.0.0:8080";

/// Minimum interval between two key file checks (milliseconds)
///
/// Also the longest time handles built from replaced key files can still be served.
pub const DEFAULT_KEY_CHECK_INTERVAL_MS: u64 = 1000;

/// RSA modulus size used when generating new keypairs
pub const DEFAULT_KEY_BITS: usize = 4096;

/// Server startup timeout (seconds)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Server readiness poll interval (milliseconds)
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Default tracing filter when `RUST_LOG` is not set
pub const DEFAULT_LOG_FILTER: &str = "paas_crypt_gateway=info,tower_http=info";
