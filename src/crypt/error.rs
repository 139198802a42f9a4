//! # Crypt Error Types
//!
//! Error types for handle construction and for encrypt/decrypt operations.
//! Every error carries an explicit [`ErrorKind`] so callers classify failures
//! without inspecting messages.

use thiserror::Error;

/// Classification of a failure, produced where the failure happens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Key material could not be loaded or the request cannot be bound to a tenant
    Construction,
    /// A ciphertext is not in the expected transport encoding
    Decode,
    /// A ciphertext is well-formed but cannot be recovered with the current keys
    Decrypt,
    /// The primitive failed to encrypt
    Encrypt,
}

impl ErrorKind {
    /// Get human-readable kind string for metrics and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Construction => "construction",
            ErrorKind::Decode => "decode",
            ErrorKind::Decrypt => "decrypt",
            ErrorKind::Encrypt => "encrypt",
        }
    }

    /// Whether the failure was caused by the caller's input
    pub fn is_client_error(&self) -> bool {
        matches!(self, ErrorKind::Decode | ErrorKind::Decrypt)
    }
}

/// Handle construction error with classification
#[derive(Debug, Clone, Error)]
#[error("unable to create a crypt: {reason:?} - {message}")]
pub struct ConstructionError {
    pub reason: ConstructionFailureReason,
    pub message: String,
}

impl ConstructionError {
    pub fn new(reason: ConstructionFailureReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }

    pub fn empty_identity() -> Self {
        Self::new(
            ConstructionFailureReason::EmptyIdentity,
            "tenant identity must not be empty",
        )
    }

    /// Get remediation guidance for this error
    pub fn remediation(&self) -> &'static str {
        self.reason.remediation()
    }
}

/// Classification of handle construction failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstructionFailureReason {
    /// No tenant identity was supplied (caller error)
    EmptyIdentity,
    /// A key file is missing or unreadable
    KeyNotFound,
    /// A key file does not contain a supported PEM encoded RSA key
    InvalidKeyFormat,
    /// None of the private keys belongs to the public key
    KeyMismatch,
}

impl ConstructionFailureReason {
    /// Get human-readable reason string for metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            ConstructionFailureReason::EmptyIdentity => "empty_identity",
            ConstructionFailureReason::KeyNotFound => "key_not_found",
            ConstructionFailureReason::InvalidKeyFormat => "invalid_key_format",
            ConstructionFailureReason::KeyMismatch => "key_mismatch",
        }
    }

    /// Whether the failure was caused by the caller rather than the service
    pub fn is_client_error(&self) -> bool {
        matches!(self, ConstructionFailureReason::EmptyIdentity)
    }

    /// Get remediation guidance for this error type
    pub fn remediation(&self) -> &'static str {
        match self {
            ConstructionFailureReason::EmptyIdentity => {
                "Provide the name of the tenant the secrets belong to."
            }
            ConstructionFailureReason::KeyNotFound => {
                "Verify PAAS_PUBLIC_KEY_PATH and PAAS_PRIVATE_KEYS_PATH point at mounted, readable key files."
            }
            ConstructionFailureReason::InvalidKeyFormat => {
                "Key files must be PEM encoded RSA keys (PKCS#1 or PKCS#8 private keys, PKCS#1 or SPKI public key)."
            }
            ConstructionFailureReason::KeyMismatch => {
                "The public key does not belong to any configured private key. Check that a rotation replaced both files."
            }
        }
    }
}

/// Error returned by a crypt handle
#[derive(Debug, Error)]
pub enum CryptError {
    /// Handle could not be built
    #[error(transparent)]
    Construction(#[from] ConstructionError),

    /// Ciphertext is not valid base64
    #[error("illegal base64 data: {0}")]
    Decode(#[from] base64::DecodeError),

    /// No configured private key recovers the plaintext
    #[error("unable to decrypt data with any of the private keys")]
    Decrypt,

    /// Encryption with the public key failed
    #[error("unable to encrypt data: {0}")]
    Encrypt(String),
}

impl CryptError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CryptError::Construction(_) => ErrorKind::Construction,
            CryptError::Decode(_) => ErrorKind::Decode,
            CryptError::Decrypt => ErrorKind::Decrypt,
            CryptError::Encrypt(_) => ErrorKind::Encrypt,
        }
    }
}

pub type CryptResult<T> = std::result::Result<T, CryptError>;
