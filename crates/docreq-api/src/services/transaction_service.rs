//! Transaction workflow: the upload-token-gated state machine.
//!
//! State changes span three independently fallible systems (record store,
//! object store, mail sender) and are never rolled back across them:
//!
//! - `send_notification`: the email can go out while the transaction's
//!   `last_notification_id` write fails. That error is returned and logged
//!   with both ids.
//! - `attach_file_to_transaction`: a failed object upload aborts before any
//!   record changes. Once the transaction is marked complete, failures to
//!   presign or email the accountant are logged at WARN and swallowed.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use docreq_core::{
    CreateTransactionRequest, Error, FileUpload, Notification, PresignedUrl, Result,
    SendNotificationRequest, Transaction, TransactionRepository, WorkflowConfig,
};
use docreq_db::ObjectStoreGateway;

use super::NotificationService;

#[derive(Clone)]
pub struct TransactionService {
    transactions: Arc<dyn TransactionRepository>,
    notifications: NotificationService,
    files: ObjectStoreGateway,
    config: Arc<WorkflowConfig>,
}

impl TransactionService {
    pub fn new(
        transactions: Arc<dyn TransactionRepository>,
        notifications: NotificationService,
        files: ObjectStoreGateway,
        config: Arc<WorkflowConfig>,
    ) -> Self {
        Self {
            transactions,
            notifications,
            files,
            config,
        }
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    pub fn notifications(&self) -> &NotificationService {
        &self.notifications
    }

    pub async fn create_transaction(&self, req: CreateTransactionRequest) -> Result<Transaction> {
        req.validate()?;
        let transaction = Transaction::new(req, Utc::now());
        self.transactions.put(&transaction).await?;

        info!(
            subsystem = "workflow",
            component = "transactions",
            op = "create",
            transaction_id = %transaction.id,
            client_id = %transaction.client_id,
            "Transaction created"
        );
        Ok(transaction)
    }

    pub async fn get_transaction_by_id(&self, id: Uuid) -> Result<Transaction> {
        self.transactions
            .get(id)
            .await?
            .ok_or(Error::TransactionNotFound(id))
    }

    /// All transactions for `client_id`, in no guaranteed order.
    pub async fn get_transactions_by_client_id(
        &self,
        client_id: &str,
    ) -> Result<Vec<Transaction>> {
        let transactions = self.transactions.list_by_client(client_id).await?;
        debug!(
            subsystem = "workflow",
            component = "transactions",
            op = "list_by_client",
            client_id = %client_id,
            result_count = transactions.len(),
            "Listed transactions"
        );
        Ok(transactions)
    }

    /// Email the transaction's client a request with a fresh upload link and
    /// link the new notification from the transaction.
    pub async fn send_notification(
        &self,
        transaction_id: Uuid,
        req: SendNotificationRequest,
    ) -> Result<Notification> {
        req.validate()?;
        let mut transaction = self.get_transaction_by_id(transaction_id).await?;

        let notification = self
            .notifications
            .send_email_notification(
                &transaction.client_email,
                transaction.id,
                &req.subject,
                &req.message,
            )
            .await?;

        transaction.record_notification(notification.id, Utc::now());
        if let Err(e) = self.transactions.put(&transaction).await {
            error!(
                subsystem = "workflow",
                component = "transactions",
                op = "send_notification",
                transaction_id = %transaction.id,
                notification_id = %notification.id,
                error = %e,
                "Email sent but transaction link not saved; needs reconciliation"
            );
            return Err(e);
        }

        info!(
            subsystem = "workflow",
            component = "transactions",
            op = "send_notification",
            transaction_id = %transaction.id,
            notification_id = %notification.id,
            "Notification sent for transaction"
        );
        Ok(notification)
    }

    /// Succeeds iff `token` belongs to a notification. Reveals nothing else.
    pub async fn validate_upload_token(&self, token: &str) -> Result<()> {
        self.resolve_upload_token(token).await.map(|_| ())
    }

    /// Store an uploaded file and complete the transaction the token points to.
    ///
    /// Returns the updated transaction.
    pub async fn attach_file_to_transaction(
        &self,
        token: &str,
        upload: FileUpload,
    ) -> Result<Transaction> {
        let start = Instant::now();
        upload.validate()?;

        let notification = self.resolve_upload_token(token).await?;
        let mut transaction = self
            .get_transaction_by_id(notification.transaction_id)
            .await?;

        let file_key = self
            .files
            .upload(&upload.data, &upload.content_type, &upload.filename)
            .await?;

        transaction.attach_file(file_key.clone(), Utc::now());
        if let Err(e) = self.transactions.put(&transaction).await {
            error!(
                subsystem = "workflow",
                component = "transactions",
                op = "attach_file",
                transaction_id = %transaction.id,
                notification_id = %notification.id,
                file_key = %file_key,
                error = %e,
                "Object stored but transaction not updated; orphaned object"
            );
            return Err(e);
        }

        if let Err(e) = self
            .notifications
            .mark_notification_as_resolved(notification.id)
            .await
        {
            error!(
                subsystem = "workflow",
                component = "transactions",
                op = "attach_file",
                transaction_id = %transaction.id,
                notification_id = %notification.id,
                file_key = %file_key,
                error = %e,
                "Transaction completed but notification not marked resolved"
            );
            return Err(e);
        }

        self.notify_accountant(&transaction, notification.id, &file_key)
            .await;

        info!(
            subsystem = "workflow",
            component = "transactions",
            op = "attach_file",
            transaction_id = %transaction.id,
            notification_id = %notification.id,
            file_key = %file_key,
            size_bytes = upload.data.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "File attached to transaction"
        );
        Ok(transaction)
    }

    pub async fn download_transaction_file(&self, transaction_id: Uuid) -> Result<Vec<u8>> {
        let transaction = self.get_transaction_by_id(transaction_id).await?;
        let file_key = transaction
            .file_key
            .as_deref()
            .ok_or(Error::NoFile(transaction_id))?;
        self.files.download(file_key).await
    }

    pub async fn get_file_download_url(&self, transaction_id: Uuid) -> Result<PresignedUrl> {
        let transaction = self.get_transaction_by_id(transaction_id).await?;
        let file_key = transaction
            .file_key
            .as_deref()
            .ok_or(Error::NoFile(transaction_id))?;
        self.files
            .presign_download(file_key, self.config.download_url_ttl())
            .await
    }

    /// Notifications sent for a transaction, oldest first.
    pub async fn list_notifications(&self, transaction_id: Uuid) -> Result<Vec<Notification>> {
        self.get_transaction_by_id(transaction_id).await?;
        self.notifications.list_for_transaction(transaction_id).await
    }

    /// Look up the notification behind `token`, applying the single-use policy.
    async fn resolve_upload_token(&self, token: &str) -> Result<Notification> {
        let notification = self
            .notifications
            .get_notification_by_upload_token(token)
            .await?;
        if self.config.single_use_upload_tokens && notification.is_resolved {
            debug!(
                subsystem = "workflow",
                component = "transactions",
                op = "resolve_upload_token",
                notification_id = %notification.id,
                "Rejected already-used upload token"
            );
            return Err(Error::UploadTokenNotFound);
        }
        Ok(notification)
    }

    /// Best effort: the transaction is already complete when this runs.
    async fn notify_accountant(
        &self,
        transaction: &Transaction,
        notification_id: Uuid,
        file_key: &str,
    ) {
        let link = match self
            .files
            .presign_download(file_key, self.config.download_url_ttl())
            .await
        {
            Ok(link) => link,
            Err(e) => {
                warn!(
                    subsystem = "workflow",
                    component = "transactions",
                    op = "notify_accountant",
                    transaction_id = %transaction.id,
                    notification_id = %notification_id,
                    file_key = %file_key,
                    error = %e,
                    "Could not presign download for accountant; skipping email"
                );
                return;
            }
        };

        if let Err(e) = self
            .notifications
            .send_accountant_notification(
                &self.config.accountant_email,
                transaction.id,
                file_key,
                &link.url,
            )
            .await
        {
            warn!(
                subsystem = "workflow",
                component = "transactions",
                op = "notify_accountant",
                transaction_id = %transaction.id,
                notification_id = %notification_id,
                file_key = %file_key,
                error = %e,
                "Accountant email failed; file remains attached"
            );
        }
    }
}
