//! Server error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use saltree_core::Error as CoreError;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Tree is full: max_leaves = {max}")]
    CapacityExceeded { max: u64 },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("No snapshot path configured")]
    SnapshotNotConfigured,

    #[error("No snapshot or seed records found to build the tree from")]
    NoInitialRecords,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Core(CoreError::IndexOutOfRange { .. }) => StatusCode::NOT_FOUND,
            ServerError::Core(CoreError::RecordUnavailable { .. }) => StatusCode::GONE,
            ServerError::Core(CoreError::RecordTooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
            ServerError::Core(CoreError::EmptyInput | CoreError::InvalidRecord(_)) => {
                StatusCode::BAD_REQUEST
            }
            ServerError::Core(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::CapacityExceeded { .. } => StatusCode::INSUFFICIENT_STORAGE,
            ServerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::SnapshotNotConfigured => StatusCode::CONFLICT,
            ServerError::NoInitialRecords => StatusCode::SERVICE_UNAVAILABLE,
            ServerError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Metrics outcome label
    pub fn outcome(&self) -> &'static str {
        if self.status().is_client_error() {
            crate::metrics::OUTCOME_CLIENT_ERROR
        } else {
            crate::metrics::OUTCOME_SERVER_ERROR
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let out_of_range = ServerError::from(CoreError::IndexOutOfRange { index: 9, size: 3 });
        assert_eq!(out_of_range.status(), StatusCode::NOT_FOUND);
        assert_eq!(out_of_range.outcome(), crate::metrics::OUTCOME_CLIENT_ERROR);

        let gone = ServerError::from(CoreError::RecordUnavailable { index: 1 });
        assert_eq!(gone.status(), StatusCode::GONE);

        let oversized = ServerError::from(CoreError::RecordTooLarge { len: 5, max: 4 });
        assert_eq!(oversized.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(oversized.outcome(), crate::metrics::OUTCOME_CLIENT_ERROR);

        let full = ServerError::CapacityExceeded { max: 4 };
        assert_eq!(full.status(), StatusCode::INSUFFICIENT_STORAGE);
        assert_eq!(full.outcome(), crate::metrics::OUTCOME_SERVER_ERROR);

        let internal = ServerError::Internal("boom".into());
        assert_eq!(internal.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_core_message_passes_through() {
        let err = ServerError::from(CoreError::RecordUnavailable { index: 2 });
        assert_eq!(err.to_string(), "Record unavailable: index 2 is tombstoned");
    }
}
