//! # Service Errors
//!
//! Failures surfaced by the API handlers and their HTTP status mapping.
//!
//! | Failure | Status |
//! |---|---|
//! | empty tenant identity | 400 |
//! | ciphertext not base64 / not decryptable | 422 |
//! | key material unavailable or invalid | 500 |
//! | encryption or worker failure | 500 |

use crate::crypt::{ConstructionError, CryptError, ErrorKind};
use crate::validation::ValidationError;
use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Construction(#[from] ConstructionError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Crypt(#[from] CryptError),

    #[error("worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

impl ServiceError {
    /// Error kind for metrics and logs (`None` for worker failures)
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            ServiceError::Construction(_) => Some(ErrorKind::Construction),
            ServiceError::Validation(e) => Some(e.kind()),
            ServiceError::Crypt(e) => Some(e.kind()),
            ServiceError::Worker(_) => None,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::Construction(e) if e.reason.is_client_error() => StatusCode::BAD_REQUEST,
            ServiceError::Validation(_) | ServiceError::Crypt(_)
                if self.kind().is_some_and(|k| k.is_client_error()) =>
            {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the failure means the key material itself is unusable
    pub fn is_key_failure(&self) -> bool {
        match self {
            ServiceError::Construction(e) => !e.reason.is_client_error(),
            ServiceError::Crypt(CryptError::Construction(e)) => !e.reason.is_client_error(),
            _ => false,
        }
    }

    /// Label used for the bundle validation metric
    pub fn metric_label(&self) -> &'static str {
        self.kind().map_or("internal", |k| k.as_str())
    }
}
