//! Core data models for docreq.
//!
//! These types are shared across all docreq crates and represent the
//! document-request domain: transactions, the notifications that carry
//! upload tokens, and the inputs to the workflow operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::ids::new_v7;

// =============================================================================
// TRANSACTION TYPES
// =============================================================================

/// A tracked request for a client to supply a document.
///
/// `file_key` is set exactly when `is_completed` is true. Use
/// [`Transaction::attach_file`] and [`Transaction::record_notification`]
/// rather than mutating fields directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub client_id: String,
    pub client_email: String,
    pub description: String,
    pub is_completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_key: Option<String>,
    /// Most recent notification sent for this transaction (back-reference).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_notification_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Build a new open transaction from a validated request.
    pub fn new(req: CreateTransactionRequest, now: DateTime<Utc>) -> Self {
        Self {
            id: new_v7(),
            client_id: req.client_id,
            client_email: req.client_email,
            description: req.description,
            is_completed: false,
            file_key: None,
            last_notification_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Link the latest notification sent for this transaction.
    pub fn record_notification(&mut self, notification_id: Uuid, now: DateTime<Utc>) {
        self.last_notification_id = Some(notification_id);
        self.updated_at = now;
    }

    /// Attach an uploaded file and mark the transaction complete.
    pub fn attach_file(&mut self, file_key: impl Into<String>, now: DateTime<Utc>) {
        self.file_key = Some(file_key.into());
        self.is_completed = true;
        self.updated_at = now;
    }

    /// Whether the completion flag agrees with the presence of a file key.
    pub fn is_consistent(&self) -> bool {
        self.file_key.is_some() == self.is_completed
    }
}

/// Request for creating a new transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTransactionRequest {
    pub client_id: String,
    pub client_email: String,
    pub description: String,
}

impl CreateTransactionRequest {
    pub fn new(
        client_id: impl Into<String>,
        client_email: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_email: client_email.into(),
            description: description.into(),
        }
    }

    /// Reject blank fields and malformed client emails.
    pub fn validate(&self) -> Result<()> {
        require_non_blank("client_id", &self.client_id)?;
        require_non_blank("client_email", &self.client_email)?;
        require_non_blank("description", &self.description)?;
        require_email("client_email", &self.client_email)
    }
}

// =============================================================================
// NOTIFICATION TYPES
// =============================================================================

/// A record of an outbound email plus its upload token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub recipient_email: String,
    pub subject: String,
    /// Full message body as sent, including the upload URL.
    pub message: String,
    pub sent_at: DateTime<Utc>,
    pub upload_token: String,
    pub is_resolved: bool,
}

/// Notification as exposed to operators, without the upload token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSummary {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub recipient_email: String,
    pub subject: String,
    pub message: String,
    pub sent_at: DateTime<Utc>,
    pub is_resolved: bool,
}

impl From<Notification> for NotificationSummary {
    fn from(n: Notification) -> Self {
        Self {
            id: n.id,
            transaction_id: n.transaction_id,
            recipient_email: n.recipient_email,
            subject: n.subject,
            message: n.message,
            sent_at: n.sent_at,
            is_resolved: n.is_resolved,
        }
    }
}

/// Request for sending a document-request notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendNotificationRequest {
    pub subject: String,
    pub message: String,
}

impl SendNotificationRequest {
    pub fn new(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            message: message.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        require_non_blank("subject", &self.subject)?;
        require_non_blank("message", &self.message)
    }
}

// =============================================================================
// FILE AND MAIL TYPES
// =============================================================================

/// A file received from a client upload.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl FileUpload {
    pub fn new(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            data: data.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.data.is_empty() {
            return Err(Error::InvalidInput(
                "Please select a file to upload".to_string(),
            ));
        }
        Ok(())
    }
}

/// A plain-text email handed to a [`crate::MailSender`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text_body: String,
}

/// Direction of access granted by a presigned URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PresignMethod {
    Get,
    Put,
}

impl PresignMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PresignMethod::Get => "GET",
            PresignMethod::Put => "PUT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Some(PresignMethod::Get),
            "PUT" => Some(PresignMethod::Put),
            _ => None,
        }
    }
}

impl std::fmt::Display for PresignMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A time-limited capability URL for one object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresignedUrl {
    pub url: String,
    pub method: PresignMethod,
    pub expires_at: DateTime<Utc>,
}

// =============================================================================
// VALIDATION HELPERS
// =============================================================================

/// Fail with `InvalidInput` when `value` is empty or whitespace.
pub fn require_non_blank(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::InvalidInput(format!("{} must not be blank", field)));
    }
    Ok(())
}

/// Minimal address shape check: one `@`, non-empty local part and domain,
/// no whitespace.
pub fn require_email(field: &str, value: &str) -> Result<()> {
    let value = value.trim();
    let valid = match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !value.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(Error::InvalidInput(format!(
            "{} is not a valid email address",
            field
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_transaction() -> Transaction {
        Transaction::new(
            CreateTransactionRequest::new("C1", "c1@x.com", "invoice"),
            Utc::now(),
        )
    }

    #[test]
    fn test_new_transaction_is_open() {
        let tx = open_transaction();
        assert!(!tx.is_completed);
        assert!(tx.file_key.is_none());
        assert!(tx.last_notification_id.is_none());
        assert_eq!(tx.created_at, tx.updated_at);
        assert!(tx.is_consistent());
    }

    #[test]
    fn test_attach_file_completes_transaction() {
        let mut tx = open_transaction();
        let later = tx.updated_at + chrono::Duration::seconds(5);
        tx.attach_file("abc-invoice.pdf", later);
        assert!(tx.is_completed);
        assert_eq!(tx.file_key.as_deref(), Some("abc-invoice.pdf"));
        assert_eq!(tx.updated_at, later);
        assert!(tx.is_consistent());
    }

    #[test]
    fn test_record_notification_keeps_completion() {
        let mut tx = open_transaction();
        let id = Uuid::new_v4();
        tx.record_notification(id, Utc::now());
        assert_eq!(tx.last_notification_id, Some(id));
        assert!(!tx.is_completed);
        assert!(tx.is_consistent());
    }

    #[test]
    fn test_create_request_rejects_blank_fields() {
        for req in [
            CreateTransactionRequest::new("", "c1@x.com", "invoice"),
            CreateTransactionRequest::new("C1", "  ", "invoice"),
            CreateTransactionRequest::new("C1", "c1@x.com", "\t"),
        ] {
            let err = req.validate().unwrap_err();
            assert!(matches!(err, Error::InvalidInput(_)));
        }
    }

    #[test]
    fn test_create_request_rejects_malformed_email() {
        for email in ["no-at-sign", "@x.com", "c1@", "c 1@x.com", "a@b@c"] {
            let req = CreateTransactionRequest::new("C1", email, "invoice");
            assert!(req.validate().is_err(), "accepted {}", email);
        }
        assert!(CreateTransactionRequest::new("C1", "c1@x.com", "invoice")
            .validate()
            .is_ok());
    }

    #[test]
    fn test_send_notification_request_validation() {
        assert!(SendNotificationRequest::new("Please upload", "See request")
            .validate()
            .is_ok());
        assert!(SendNotificationRequest::new(" ", "See request")
            .validate()
            .is_err());
        assert!(SendNotificationRequest::new("Please upload", "")
            .validate()
            .is_err());
    }

    #[test]
    fn test_empty_upload_rejected() {
        let upload = FileUpload::new("a.pdf", "application/pdf", Vec::new());
        assert!(matches!(upload.validate(), Err(Error::InvalidInput(_))));
        let upload = FileUpload::new("a.pdf", "application/pdf", vec![1u8]);
        assert!(upload.validate().is_ok());
    }

    #[test]
    fn test_notification_summary_hides_token() {
        let n = Notification {
            id: Uuid::new_v4(),
            transaction_id: Uuid::new_v4(),
            recipient_email: "c1@x.com".into(),
            subject: "Please upload".into(),
            message: "body".into(),
            sent_at: Utc::now(),
            upload_token: "secret-token".into(),
            is_resolved: false,
        };
        let json = serde_json::to_string(&NotificationSummary::from(n)).unwrap();
        assert!(!json.contains("secret-token"));
        assert!(!json.contains("upload_token"));
    }

    #[test]
    fn test_presign_method_parse() {
        assert_eq!(PresignMethod::parse("get"), Some(PresignMethod::Get));
        assert_eq!(PresignMethod::parse("PUT"), Some(PresignMethod::Put));
        assert_eq!(PresignMethod::parse("DELETE"), None);
        assert_eq!(PresignMethod::Get.to_string(), "GET");
    }
}
