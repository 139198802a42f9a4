//! # RSA-OAEP Handles
//!
//! Encrypts with the shared public key and decrypts with any of the configured
//! private keys. The tenant identity is used as the OAEP label, so ciphertext
//! produced for one tenant never decrypts for another.
//!
//! Wire format: plaintext is split into chunks that fit a single OAEP block,
//! every chunk is encrypted separately, the blocks are concatenated and the
//! result is standard base64.

use super::error::{
    ConstructionError, ConstructionFailureReason as Reason, CryptError, CryptResult,
};
use super::{CryptHandle, HandleFactory, KeyPaths};
use anyhow::Context;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::rngs::OsRng;
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey, EncodeRsaPrivateKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha512;
use std::fmt;
use std::io::Write;
use std::path::Path;
use tracing::debug;
use zeroize::Zeroizing;

/// SHA-512 output length in bytes
const HASH_LEN: usize = 64;

/// OAEP overhead per block: two hashes plus two marker bytes
const OAEP_OVERHEAD: usize = 2 * HASH_LEN + 2;

/// Handle built from an RSA keypair and bound to one tenant
pub struct RsaCrypt {
    private_keys: Vec<RsaPrivateKey>,
    public_key: RsaPublicKey,
    tenant: String,
}

impl fmt::Debug for RsaCrypt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaCrypt")
            .field("tenant", &self.tenant)
            .field("private_keys", &self.private_keys.len())
            .field("modulus_bits", &(self.public_key.size() * 8))
            .finish()
    }
}

impl RsaCrypt {
    /// Build a handle from parsed keys
    ///
    /// At least one private key must belong to the public key.
    pub fn new(
        private_keys: Vec<RsaPrivateKey>,
        public_key: RsaPublicKey,
        tenant: &str,
    ) -> Result<Self, ConstructionError> {
        if tenant.is_empty() {
            return Err(ConstructionError::empty_identity());
        }
        if private_keys.is_empty() {
            return Err(ConstructionError::new(
                Reason::KeyNotFound,
                "no private keys configured",
            ));
        }
        ensure_oaep_capacity(public_key.size())?;
        if !private_keys
            .iter()
            .any(|key| key.to_public_key() == public_key)
        {
            return Err(ConstructionError::new(
                Reason::KeyMismatch,
                "public key does not belong to any of the private keys",
            ));
        }

        Ok(Self {
            private_keys,
            public_key,
            tenant: tenant.to_string(),
        })
    }

    /// Load the keys named by `keys` and build a handle for `tenant`
    pub fn from_files(keys: &KeyPaths, tenant: &str) -> Result<Self, ConstructionError> {
        // Reject before touching the disk
        if tenant.is_empty() {
            return Err(ConstructionError::empty_identity());
        }

        let public_key = parse_public_key(&read_key_file(keys.public_key())?)
            .map_err(|e| with_path(e, keys.public_key()))?;
        let private_keys = keys
            .private_keys()
            .iter()
            .map(|path| {
                parse_private_key(&read_key_file(path)?).map_err(|e| with_path(e, path))
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            tenant = tenant,
            private_keys = private_keys.len(),
            "Loaded RSA key material"
        );
        Self::new(private_keys, public_key, tenant)
    }

    /// Tenant this handle is bound to
    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    fn padding(&self) -> Oaep {
        Oaep::new_with_label::<Sha512, _>(&self.tenant)
    }

    /// Try one private key; `None` if any block fails
    fn decrypt_with(&self, key: &RsaPrivateKey, data: &[u8]) -> Option<Vec<u8>> {
        let block_len = key.size();
        if data.len() % block_len != 0 {
            return None;
        }

        let mut plaintext = Vec::with_capacity(data.len());
        for block in data.chunks(block_len) {
            let chunk = Zeroizing::new(key.decrypt(self.padding(), block).ok()?);
            plaintext.extend_from_slice(&chunk);
        }
        Some(plaintext)
    }
}

impl CryptHandle for RsaCrypt {
    fn encrypt(&self, plaintext: &[u8]) -> CryptResult<String> {
        let block_len = self.public_key.size();
        let step = block_len - OAEP_OVERHEAD;

        let mut rng = OsRng;
        let mut encrypted = Vec::with_capacity(plaintext.len().div_ceil(step) * block_len);
        for chunk in plaintext.chunks(step) {
            let block = self
                .public_key
                .encrypt(&mut rng, self.padding(), chunk)
                .map_err(|e| CryptError::Encrypt(e.to_string()))?;
            encrypted.extend_from_slice(&block);
        }

        Ok(STANDARD.encode(encrypted))
    }

    fn decrypt(&self, ciphertext: &str) -> CryptResult<Vec<u8>> {
        let data = STANDARD.decode(ciphertext)?;

        self.private_keys
            .iter()
            .find_map(|key| self.decrypt_with(key, &data))
            .ok_or(CryptError::Decrypt)
    }
}

/// Factory building [`RsaCrypt`] handles from PEM files
#[derive(Debug, Clone, Copy, Default)]
pub struct RsaCryptFactory;

impl HandleFactory for RsaCryptFactory {
    type Handle = RsaCrypt;

    fn build(&self, keys: &KeyPaths, tenant: &str) -> Result<RsaCrypt, ConstructionError> {
        RsaCrypt::from_files(keys, tenant)
    }
}

/// Parse a PEM private key (PKCS#1 `RSA PRIVATE KEY` or PKCS#8 `PRIVATE KEY`)
pub fn parse_private_key(pem: &str) -> Result<RsaPrivateKey, ConstructionError> {
    let key = RsaPrivateKey::from_pkcs1_pem(pem)
        .or_else(|_| RsaPrivateKey::from_pkcs8_pem(pem))
        .map_err(|e| {
            ConstructionError::new(
                Reason::InvalidKeyFormat,
                format!("not a PEM encoded RSA private key: {e}"),
            )
        })?;
    ensure_oaep_capacity(key.size())?;
    Ok(key)
}

/// Parse a PEM public key (PKCS#1 `RSA PUBLIC KEY` or SPKI `PUBLIC KEY`)
pub fn parse_public_key(pem: &str) -> Result<RsaPublicKey, ConstructionError> {
    RsaPublicKey::from_pkcs1_pem(pem)
        .or_else(|_| RsaPublicKey::from_public_key_pem(pem))
        .map_err(|e| {
            ConstructionError::new(
                Reason::InvalidKeyFormat,
                format!("not a PEM encoded RSA public key: {e}"),
            )
        })
}

/// Generate a new keypair and write it to disk
///
/// The private key is written as PKCS#1 PEM (owner-only permissions on unix),
/// the public key as SPKI PEM.
pub fn generate_key_pair(private_path: &Path, public_path: &Path, bits: usize) -> anyhow::Result<()> {
    let mut rng = OsRng;
    let private_key = RsaPrivateKey::new(&mut rng, bits)
        .with_context(|| format!("Failed to generate {bits} bit RSA key"))?;
    let public_key = private_key.to_public_key();

    let private_pem = private_key
        .to_pkcs1_pem(LineEnding::LF)
        .context("Failed to encode private key")?;
    let public_pem = public_key
        .to_public_key_pem(LineEnding::LF)
        .context("Failed to encode public key")?;

    write_private_file(private_path, private_pem.as_bytes())
        .with_context(|| format!("Failed to write private key to {}", private_path.display()))?;
    std::fs::write(public_path, public_pem)
        .with_context(|| format!("Failed to write public key to {}", public_path.display()))?;
    Ok(())
}

#[cfg(unix)]
fn write_private_file(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use std::os::unix::fs::OpenOptionsExt;
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(contents)
}

#[cfg(not(unix))]
fn write_private_file(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    file.write_all(contents)
}

fn read_key_file(path: &Path) -> Result<Zeroizing<String>, ConstructionError> {
    std::fs::read_to_string(path)
        .map(Zeroizing::new)
        .map_err(|e| {
            ConstructionError::new(
                Reason::KeyNotFound,
                format!("unable to read key file {}: {e}", path.display()),
            )
        })
}

fn ensure_oaep_capacity(block_len: usize) -> Result<(), ConstructionError> {
    if block_len <= OAEP_OVERHEAD {
        return Err(ConstructionError::new(
            Reason::InvalidKeyFormat,
            format!(
                "{} bit key is too small for OAEP with SHA-512",
                block_len * 8
            ),
        ));
    }
    Ok(())
}

fn with_path(err: ConstructionError, path: &Path) -> ConstructionError {
    ConstructionError::new(err.reason, format!("{}: {}", path.display(), err.message))
}
