//! # Gateway Configuration
//!
//! Process configuration loaded from environment variables.
//!
//! All configuration has sensible defaults and can be overridden via environment variables.
//! In the deployment the variables are populated from a ConfigMap, the key files themselves
//! are mounted from a Secret and rotated by replacing the mounted files.

mod keys;
mod server;

pub use keys::KeyConfig;
pub use server::ServerConfig;

/// Load configuration from environment variables with defaults
pub fn load_config() -> (KeyConfig, ServerConfig) {
    (KeyConfig::from_env(), ServerConfig::from_env())
}

/// Read environment variable or return default value
pub(crate) fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T
where
    <T as std::str::FromStr>::Err: std::fmt::Debug,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Split a comma separated environment value into trimmed, non-empty items
pub(crate) fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(ToString::to_string)
        .collect()
}
