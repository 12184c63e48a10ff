//! Client and accountant notification workflow.
//!
//! A client notification is persisted *before* its email is sent. If the
//! mail sender then fails, the stored upload token still resolves, so the
//! operator can resend the link rather than lose it.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info};
use uuid::Uuid;

use docreq_core::defaults::UPLOAD_INSTRUCTIONS;
use docreq_core::{
    new_upload_token, new_v7, require_email, require_non_blank, Error, MailSender, Notification,
    NotificationRepository, OutboundEmail, Result, WorkflowConfig,
};

/// Mints upload tokens, records notifications, and sends workflow email.
#[derive(Clone)]
pub struct NotificationService {
    notifications: Arc<dyn NotificationRepository>,
    mail: Arc<dyn MailSender>,
    config: Arc<WorkflowConfig>,
}

impl NotificationService {
    pub fn new(
        notifications: Arc<dyn NotificationRepository>,
        mail: Arc<dyn MailSender>,
        config: Arc<WorkflowConfig>,
    ) -> Self {
        Self {
            notifications,
            mail,
            config,
        }
    }

    /// Email `recipient_email` a request carrying a fresh upload link.
    ///
    /// The returned notification's `message` is the body as sent, ending in
    /// the upload URL.
    pub async fn send_email_notification(
        &self,
        recipient_email: &str,
        transaction_id: Uuid,
        subject: &str,
        message_body: &str,
    ) -> Result<Notification> {
        require_email("recipient_email", recipient_email)?;
        require_non_blank("subject", subject)?;
        require_non_blank("message", message_body)?;

        let upload_token = new_upload_token();
        let upload_url = self.config.upload_url(&upload_token);
        let notification = Notification {
            id: new_v7(),
            transaction_id,
            recipient_email: recipient_email.to_string(),
            subject: subject.to_string(),
            message: format!("{}\n\n{} {}", message_body, UPLOAD_INSTRUCTIONS, upload_url),
            sent_at: Utc::now(),
            upload_token,
            is_resolved: false,
        };

        self.notifications.put(&notification).await?;

        let email = OutboundEmail {
            from: self.config.sender_email.clone(),
            to: notification.recipient_email.clone(),
            subject: notification.subject.clone(),
            text_body: notification.message.clone(),
        };
        if let Err(e) = self.mail.send(&email).await {
            error!(
                subsystem = "workflow",
                component = "notifications",
                op = "send_email_notification",
                transaction_id = %transaction_id,
                notification_id = %notification.id,
                error = %e,
                "Client email failed after notification was stored; upload link remains valid"
            );
            return Err(e);
        }

        info!(
            subsystem = "workflow",
            component = "notifications",
            op = "send_email_notification",
            transaction_id = %transaction_id,
            notification_id = %notification.id,
            "Client notification sent"
        );
        Ok(notification)
    }

    /// Tell the accountant a document arrived. Nothing is persisted.
    pub async fn send_accountant_notification(
        &self,
        accountant_email: &str,
        transaction_id: Uuid,
        file_key: &str,
        download_url: &str,
    ) -> Result<()> {
        let email = OutboundEmail {
            from: self.config.sender_email.clone(),
            to: accountant_email.to_string(),
            subject: format!("Document Uploaded for Transaction {}", transaction_id),
            text_body: format!(
                "A document has been uploaded for transaction {}.\n\n\
                 You can download the document using this link: {}",
                transaction_id, download_url
            ),
        };
        self.mail.send(&email).await?;

        info!(
            subsystem = "workflow",
            component = "notifications",
            op = "send_accountant_notification",
            transaction_id = %transaction_id,
            file_key = %file_key,
            "Accountant notified"
        );
        Ok(())
    }

    pub async fn get_notification_by_upload_token(&self, token: &str) -> Result<Notification> {
        if token.is_empty() {
            return Err(Error::UploadTokenNotFound);
        }
        self.notifications
            .find_by_upload_token(token)
            .await?
            .ok_or(Error::UploadTokenNotFound)
    }

    /// Set `is_resolved`. Calling it again on a resolved notification is a no-op.
    pub async fn mark_notification_as_resolved(
        &self,
        notification_id: Uuid,
    ) -> Result<Notification> {
        let mut notification = self
            .notifications
            .get(notification_id)
            .await?
            .ok_or(Error::NotificationNotFound(notification_id))?;

        if !notification.is_resolved {
            notification.is_resolved = true;
            self.notifications.put(&notification).await?;
        }
        Ok(notification)
    }

    pub async fn list_for_transaction(&self, transaction_id: Uuid) -> Result<Vec<Notification>> {
        let mut notifications = self.notifications.list_by_transaction(transaction_id).await?;
        notifications.sort_by_key(|n| n.sent_at);
        Ok(notifications)
    }
}
