//! Client error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("No commitment pinned: call fetch_commitment first")]
    NotInitialized,

    #[error("Record {index} failed verification after {attempts} attempt(s)")]
    VerificationFailed { index: u64, attempts: u32 },

    #[error(transparent)]
    Core(#[from] saltree_core::Error),
}

impl ClientError {
    /// Server refused the index because it is tombstoned
    pub fn is_unavailable(&self) -> bool {
        matches!(self, ClientError::Server { status: 410, .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::Server { status: 404, .. })
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
