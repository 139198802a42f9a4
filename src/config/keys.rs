//! # Key Configuration
//!
//! Locations of the RSA key files and how often they are checked for rotation.

use super::{env_var_or_default, split_list};
use crate::constants::{
    DEFAULT_KEY_CHECK_INTERVAL_MS, DEFAULT_PRIVATE_KEYS_PATH, DEFAULT_PUBLIC_KEY_PATH,
};
use crate::crypt::KeyPaths;
use std::path::PathBuf;
use std::time::Duration;

/// Key material configuration
#[derive(Debug, Clone)]
pub struct KeyConfig {
    /// Public key used for encryption
    pub public_key_path: PathBuf,
    /// Private keys tried in order for decryption
    pub private_key_paths: Vec<PathBuf>,
    /// Minimum interval between two key file checks
    /// Zero checks the files on every request. After a key file is replaced, cached
    /// handles of the old keys can be served for up to this long.
    pub check_interval: Duration,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            public_key_path: PathBuf::from(DEFAULT_PUBLIC_KEY_PATH),
            private_key_paths: split_list(DEFAULT_PRIVATE_KEYS_PATH)
                .into_iter()
                .map(PathBuf::from)
                .collect(),
            check_interval: Duration::from_millis(DEFAULT_KEY_CHECK_INTERVAL_MS),
        }
    }
}

impl KeyConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let public_key_path = std::env::var("PAAS_PUBLIC_KEY_PATH")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map_or(defaults.public_key_path, PathBuf::from);

        let private_key_paths = std::env::var("PAAS_PRIVATE_KEYS_PATH")
            .ok()
            .map(|v| split_list(&v))
            .filter(|paths| !paths.is_empty())
            .map_or(defaults.private_key_paths, |paths| {
                paths.into_iter().map(PathBuf::from).collect()
            });

        Self {
            public_key_path,
            private_key_paths,
            check_interval: Duration::from_millis(env_var_or_default(
                "PAAS_KEY_CHECK_INTERVAL_MS",
                DEFAULT_KEY_CHECK_INTERVAL_MS,
            )),
        }
    }

    /// Key paths handed to the handle factory
    pub fn key_paths(&self) -> KeyPaths {
        KeyPaths::new(self.private_key_paths.clone(), self.public_key_path.clone())
    }
}
