//! Mapping from workflow errors to HTTP responses.

use axum::{http::StatusCode, response::IntoResponse, Json};
use tracing::error;

use docreq_core::{Error, ErrorKind};

/// Shown to clients whose upload token does not resolve.
pub const INVALID_UPLOAD_LINK: &str = "Invalid or expired upload link";

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Forbidden(String),
    /// Upstream failure. The detail is logged, never returned.
    Internal(String),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err.kind() {
            ErrorKind::Validation => ApiError::BadRequest(err.to_string()),
            ErrorKind::NotFound | ErrorKind::NoFile => ApiError::NotFound(err.to_string()),
            ErrorKind::Upstream => ApiError::Internal(err.to_string()),
        }
    }
}

impl ApiError {
    /// Like `From<Error>`, but a not-found token becomes the generic upload-link message.
    pub fn from_upload(err: Error) -> Self {
        match err.kind() {
            ErrorKind::NotFound => ApiError::NotFound(INVALID_UPLOAD_LINK.to_string()),
            _ => err.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::Internal(detail) => {
                error!(subsystem = "api", error = %detail, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(serde_json::json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn status_of(err: Error) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_of(Error::InvalidInput("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(Error::TransactionNotFound(Uuid::nil())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(status_of(Error::UploadTokenNotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_of(Error::NoFile(Uuid::nil())), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(Error::Mail("smtp down".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(Error::Storage("bucket".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_upload_errors_hide_details() {
        match ApiError::from_upload(Error::UploadTokenNotFound) {
            ApiError::NotFound(msg) => assert_eq!(msg, INVALID_UPLOAD_LINK),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            ApiError::from_upload(Error::InvalidInput("empty".into())),
            ApiError::BadRequest(_)
        ));
    }
}
