//! # Bundle Validation
//!
//! Decides whether every secret of a [`SecretBundle`] decrypts under a handle.
//!
//! Secrets are visited top-level first, then capability by capability, names in
//! lexicographic order. The first secret that fails ends the walk and is reported with
//! its position in the tree. Capabilities are checked whether they are enabled or not:
//! a bundle that only partially decrypts is invalid.

pub mod bundle;

pub use bundle::{BundleMetadata, BundleSpec, Capability, SecretBundle, Secrets};

use crate::crypt::{CryptError, CryptHandle, ErrorKind};
use std::fmt;
use thiserror::Error;
use zeroize::Zeroizing;

/// Position of a secret in a bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretLocation {
    /// `spec.sshSecrets[name]`
    TopLevel { name: String },
    /// `spec.capabilities[capability].sshSecrets[name]`
    Capability { capability: String, name: String },
}

impl fmt::Display for SecretLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecretLocation::TopLevel { name } => write!(f, "secret '{name}'"),
            SecretLocation::Capability { capability, name } => {
                write!(f, "secret '{name}' of capability '{capability}'")
            }
        }
    }
}

/// First secret of a bundle that could not be decrypted
#[derive(Debug, Error)]
#[error("unable to decrypt {location}: {source}")]
pub struct ValidationError {
    pub location: SecretLocation,
    #[source]
    pub source: CryptError,
}

impl ValidationError {
    /// Classification of the underlying failure (`Decode` or `Decrypt`)
    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }
}

/// Check that every secret in `bundle` decrypts with `handle`
///
/// # Errors
///
/// Returns the first failing secret in traversal order.
pub fn validate_bundle<H>(handle: &H, bundle: &SecretBundle) -> Result<(), ValidationError>
where
    H: CryptHandle + ?Sized,
{
    check_secrets(handle, &bundle.spec.ssh_secrets, |name| SecretLocation::TopLevel {
        name: name.to_string(),
    })?;

    for (capability, cap) in &bundle.spec.capabilities {
        check_secrets(handle, &cap.ssh_secrets, |name| SecretLocation::Capability {
            capability: capability.clone(),
            name: name.to_string(),
        })?;
    }

    Ok(())
}

fn check_secrets<H, L>(handle: &H, secrets: &Secrets, location: L) -> Result<(), ValidationError>
where
    H: CryptHandle + ?Sized,
    L: Fn(&str) -> SecretLocation,
{
    for (name, ciphertext) in secrets {
        // Plaintext is only needed to prove the secret decrypts
        let _plaintext = handle
            .decrypt(ciphertext)
            .map(Zeroizing::new)
            .map_err(|source| ValidationError {
                location: location(name),
                source,
            })?;
    }
    Ok(())
}
