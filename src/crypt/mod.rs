//! # Crypt Handles
//!
//! Per-tenant encrypt/decrypt contexts built from a shared keypair.
//!
//! ## Module Structure
//!
//! - `error.rs` - Error types and classification
//! - `oaep.rs` - RSA-OAEP handle and factory, keypair generation
//! - `detection.rs` - Private key detection for the encrypt endpoint

pub mod detection;
pub mod error;
pub mod oaep;

pub use detection::is_private_key;
pub use error::{ConstructionError, ConstructionFailureReason, CryptError, CryptResult, ErrorKind};
pub use oaep::{generate_key_pair, RsaCrypt, RsaCryptFactory};

use std::path::{Path, PathBuf};

/// Encrypt/decrypt context bound to a keypair and a tenant identity
///
/// Handles are immutable once built and are shared between requests.
pub trait CryptHandle: Send + Sync {
    /// Encrypt plaintext into its textual transport form
    fn encrypt(&self, plaintext: &[u8]) -> CryptResult<String>;

    /// Recover plaintext from its textual transport form
    fn decrypt(&self, ciphertext: &str) -> CryptResult<Vec<u8>>;
}

/// Builds handles for a tenant from key files on disk
///
/// Construction may be slow (key parsing) and is fallible.
pub trait HandleFactory: Send + Sync {
    type Handle: CryptHandle;

    fn build(&self, keys: &KeyPaths, tenant: &str) -> Result<Self::Handle, ConstructionError>;
}

impl<T: HandleFactory + ?Sized> HandleFactory for std::sync::Arc<T> {
    type Handle = T::Handle;

    fn build(&self, keys: &KeyPaths, tenant: &str) -> Result<Self::Handle, ConstructionError> {
        (**self).build(keys, tenant)
    }
}

/// Location of the key files a handle is built from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPaths {
    private_keys: Vec<PathBuf>,
    public_key: PathBuf,
}

impl KeyPaths {
    pub fn new(private_keys: Vec<PathBuf>, public_key: PathBuf) -> Self {
        Self {
            private_keys,
            public_key,
        }
    }

    pub fn private_keys(&self) -> &[PathBuf] {
        &self.private_keys
    }

    pub fn public_key(&self) -> &Path {
        &self.public_key
    }

    /// Every watched file: private keys first, then the public key
    pub fn all(&self) -> impl Iterator<Item = &Path> {
        self.private_keys
            .iter()
            .map(PathBuf::as_path)
            .chain(std::iter::once(self.public_key.as_path()))
    }
}
