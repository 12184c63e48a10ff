//! Error types for docreq.

use thiserror::Error;
use uuid::Uuid;

/// Result type alias using docreq's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`].
///
/// Boundary layers map these to user-facing responses: `Validation` is the
/// caller's fault, `NotFound` and `NoFile` describe missing state, and
/// `Upstream` means a record store, object store, or mail sender failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    NoFile,
    Upstream,
}

/// Core error type for docreq operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid input (blank fields, malformed email, empty upload)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Transaction not found
    #[error("Transaction not found: {0}")]
    TransactionNotFound(Uuid),

    /// Notification not found
    #[error("Notification not found: {0}")]
    NotificationNotFound(Uuid),

    /// Upload token does not match any notification. The token itself is
    /// never echoed back.
    #[error("No notification found for the provided upload token")]
    UploadTokenNotFound,

    /// Download requested before any file was attached
    #[error("No file found for transaction: {0}")]
    NoFile(Uuid),

    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Object store operation failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Mail sender failed
    #[error("Mail error: {0}")]
    Mail(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Classify this error for the boundary layer.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidInput(_) => ErrorKind::Validation,
            Error::NotFound(_)
            | Error::TransactionNotFound(_)
            | Error::NotificationNotFound(_)
            | Error::UploadTokenNotFound => ErrorKind::NotFound,
            Error::NoFile(_) => ErrorKind::NoFile,
            Error::Database(_)
            | Error::Storage(_)
            | Error::Mail(_)
            | Error::Request(_)
            | Error::Serialization(_)
            | Error::Io(_) => ErrorKind::Upstream,
        }
    }

    /// Shorthand for `self.kind() == ErrorKind::NotFound`.
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_invalid_input() {
        let err = Error::InvalidInput("client_id must not be blank".to_string());
        assert_eq!(err.to_string(), "Invalid input: client_id must not be blank");
    }

    #[test]
    fn test_error_display_transaction_not_found() {
        let id = Uuid::nil();
        let err = Error::TransactionNotFound(id);
        assert_eq!(err.to_string(), format!("Transaction not found: {}", id));
    }

    #[test]
    fn test_upload_token_not_found_does_not_echo_token() {
        let err = Error::UploadTokenNotFound;
        assert_eq!(
            err.to_string(),
            "No notification found for the provided upload token"
        );
    }

    #[test]
    fn test_error_display_no_file() {
        let id = Uuid::new_v4();
        let err = Error::NoFile(id);
        assert!(err.to_string().contains(&id.to_string()));
    }

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            Error::InvalidInput("x".into()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(Error::NotFound("x".into()).kind(), ErrorKind::NotFound);
        assert_eq!(
            Error::TransactionNotFound(Uuid::nil()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            Error::NotificationNotFound(Uuid::nil()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(Error::UploadTokenNotFound.kind(), ErrorKind::NotFound);
        assert_eq!(Error::NoFile(Uuid::nil()).kind(), ErrorKind::NoFile);
        assert_eq!(Error::Storage("s3".into()).kind(), ErrorKind::Upstream);
        assert_eq!(Error::Mail("smtp".into()).kind(), ErrorKind::Upstream);
        assert_eq!(
            Error::Database(sqlx::Error::RowNotFound).kind(),
            ErrorKind::Upstream
        );
    }

    #[test]
    fn test_is_not_found() {
        assert!(Error::UploadTokenNotFound.is_not_found());
        assert!(!Error::NoFile(Uuid::nil()).is_not_found());
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        match err {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(err.kind(), ErrorKind::Upstream);
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
