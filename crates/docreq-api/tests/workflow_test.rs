//! Workflow tests for the transaction and notification services.
//!
//! Every store is in memory and the mail sender is a recording mock, so
//! these run without Postgres or network access.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use docreq_api::{NotificationService, TransactionService};
use docreq_core::defaults::UPLOAD_INSTRUCTIONS;
use docreq_core::{
    CreateTransactionRequest, Error, FileUpload, Notification, NotificationRepository,
    ObjectStore, PresignMethod, Result, SendNotificationRequest, Transaction,
    TransactionRepository, WorkflowConfig,
};
use docreq_db::{
    InMemoryNotificationRepository, InMemoryObjectStore, InMemoryTransactionRepository,
    ObjectStoreGateway,
};
use docreq_mail::mock::MockMailSender;

const SENDER: &str = "office@firm.com";
const ACCOUNTANT: &str = "accountant@firm.com";
const CLIENT_EMAIL: &str = "alice@example.com";

/// Transaction store whose writes can be switched off mid-test.
#[derive(Clone, Default)]
struct FlakyTransactions {
    inner: InMemoryTransactionRepository,
    fail_puts: Arc<AtomicBool>,
}

#[async_trait]
impl TransactionRepository for FlakyTransactions {
    async fn put(&self, transaction: &Transaction) -> Result<()> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(Error::Storage("record store unavailable".to_string()));
        }
        self.inner.put(transaction).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<Transaction>> {
        self.inner.get(id).await
    }

    async fn list_by_client(&self, client_id: &str) -> Result<Vec<Transaction>> {
        self.inner.list_by_client(client_id).await
    }
}

/// Object store that can reject uploads or presigning.
#[derive(Clone, Default)]
struct FlakyObjects {
    inner: InMemoryObjectStore,
    fail_puts: Arc<AtomicBool>,
    fail_presign: Arc<AtomicBool>,
}

#[async_trait]
impl ObjectStore for FlakyObjects {
    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> Result<()> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(Error::Storage("bucket unavailable".to_string()));
        }
        self.inner.put(key, data, content_type).await
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.inner.get(key).await
    }

    async fn presign(
        &self,
        key: &str,
        expires_in: Duration,
        method: PresignMethod,
    ) -> Result<String> {
        if self.fail_presign.load(Ordering::SeqCst) {
            return Err(Error::Storage("presign unavailable".to_string()));
        }
        self.inner.presign(key, expires_in, method).await
    }
}

struct Harness {
    service: TransactionService,
    transactions: FlakyTransactions,
    notifications: InMemoryNotificationRepository,
    objects: FlakyObjects,
    mail: MockMailSender,
}

fn harness() -> Harness {
    harness_with(WorkflowConfig::new(SENDER, ACCOUNTANT), MockMailSender::new())
}

fn harness_with(config: WorkflowConfig, mail: MockMailSender) -> Harness {
    let config = Arc::new(config);
    let transactions = FlakyTransactions::default();
    let notifications = InMemoryNotificationRepository::new();
    let objects = FlakyObjects::default();

    let notification_service = NotificationService::new(
        Arc::new(notifications.clone()),
        Arc::new(mail.clone()),
        config.clone(),
    );
    let service = TransactionService::new(
        Arc::new(transactions.clone()),
        notification_service,
        ObjectStoreGateway::new(Arc::new(objects.clone())),
        config,
    );

    Harness {
        service,
        transactions,
        notifications,
        objects,
        mail,
    }
}

fn new_request(client_id: &str) -> CreateTransactionRequest {
    CreateTransactionRequest::new(client_id, CLIENT_EMAIL, "2025 tax return")
}

fn bank_statement(data: &[u8]) -> FileUpload {
    FileUpload::new("statement.pdf", "application/pdf", data.to_vec())
}

/// Create a transaction and send one notification for it.
async fn notified_transaction(h: &Harness) -> (Transaction, Notification) {
    let transaction = h
        .service
        .create_transaction(new_request("C1"))
        .await
        .expect("create transaction");
    let notification = h
        .service
        .send_notification(
            transaction.id,
            SendNotificationRequest::new("Docs", "Please send your W-2"),
        )
        .await
        .expect("send notification");
    (transaction, notification)
}

fn sorted_by_id(mut transactions: Vec<Transaction>) -> Vec<Transaction> {
    transactions.sort_by_key(|t| t.id);
    transactions
}

// =============================================================================
// TRANSACTIONS
// =============================================================================

#[tokio::test]
async fn test_create_transaction_starts_incomplete() {
    let h = harness();
    let tx = h.service.create_transaction(new_request("C1")).await.unwrap();

    assert_eq!(tx.client_id, "C1");
    assert_eq!(tx.client_email, CLIENT_EMAIL);
    assert_eq!(tx.description, "2025 tax return");
    assert!(!tx.is_completed);
    assert!(tx.file_key.is_none());
    assert!(tx.last_notification_id.is_none());
    assert!(tx.is_consistent());

    let stored = h.service.get_transaction_by_id(tx.id).await.unwrap();
    assert_eq!(stored, tx);
}

#[tokio::test]
async fn test_create_transaction_ids_are_unique() {
    let h = harness();
    let mut ids = std::collections::HashSet::new();
    for _ in 0..50 {
        let tx = h.service.create_transaction(new_request("C1")).await.unwrap();
        assert!(ids.insert(tx.id), "duplicate transaction id {}", tx.id);
    }
    assert_eq!(h.transactions.inner.len(), 50);
}

#[tokio::test]
async fn test_create_transaction_rejects_invalid_input() {
    let h = harness();

    let blank_client = CreateTransactionRequest::new("  ", CLIENT_EMAIL, "desc");
    let bad_email = CreateTransactionRequest::new("C1", "not-an-email", "desc");
    let blank_description = CreateTransactionRequest::new("C1", CLIENT_EMAIL, "");

    for req in [blank_client, bad_email, blank_description] {
        let err = h.service.create_transaction(req).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)), "got {:?}", err);
    }
    assert!(h.transactions.inner.is_empty());
}

#[tokio::test]
async fn test_get_transaction_unknown_id() {
    let h = harness();
    let id = Uuid::new_v4();
    let err = h.service.get_transaction_by_id(id).await.unwrap_err();
    assert!(matches!(err, Error::TransactionNotFound(missing) if missing == id));
}

#[tokio::test]
async fn test_transactions_by_client_id() {
    let h = harness();
    let a1 = h.service.create_transaction(new_request("A")).await.unwrap();
    let a2 = h.service.create_transaction(new_request("A")).await.unwrap();
    h.service.create_transaction(new_request("B")).await.unwrap();

    let listed = h.service.get_transactions_by_client_id("A").await.unwrap();
    assert_eq!(sorted_by_id(listed), sorted_by_id(vec![a1, a2]));

    let none = h.service.get_transactions_by_client_id("nobody").await.unwrap();
    assert!(none.is_empty());
}

// =============================================================================
// NOTIFICATIONS
// =============================================================================

#[tokio::test]
async fn test_send_notification_emails_client_with_upload_link() {
    let h = harness();
    let (tx, notification) = notified_transaction(&h).await;

    assert_eq!(notification.transaction_id, tx.id);
    assert_eq!(notification.recipient_email, CLIENT_EMAIL);
    assert_eq!(notification.subject, "Docs");
    assert!(!notification.is_resolved);
    assert!(!notification.upload_token.is_empty());

    let expected_url = format!("http://localhost:3000/upload/{}", notification.upload_token);
    assert_eq!(
        notification.message,
        format!("Please send your W-2\n\n{} {}", UPLOAD_INSTRUCTIONS, expected_url)
    );
    assert!(notification.message.ends_with(&notification.upload_token));

    let sent = h.mail.sent_to(CLIENT_EMAIL);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].from, SENDER);
    assert_eq!(sent[0].subject, "Docs");
    assert_eq!(sent[0].text_body, notification.message);

    let stored = h.service.get_transaction_by_id(tx.id).await.unwrap();
    assert_eq!(stored.last_notification_id, Some(notification.id));
    assert!(stored.updated_at >= tx.updated_at);
}

#[tokio::test]
async fn test_send_notification_unknown_transaction_sends_nothing() {
    let h = harness();
    let err = h
        .service
        .send_notification(Uuid::new_v4(), SendNotificationRequest::new("s", "m"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::TransactionNotFound(_)));
    assert_eq!(h.mail.attempt_count(), 0);
    assert!(h.notifications.is_empty());
}

#[tokio::test]
async fn test_send_notification_rejects_blank_subject() {
    let h = harness();
    let tx = h.service.create_transaction(new_request("C1")).await.unwrap();
    let err = h
        .service
        .send_notification(tx.id, SendNotificationRequest::new(" ", "body"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InvalidInput(_)));
    assert_eq!(h.mail.attempt_count(), 0);
}

#[tokio::test]
async fn test_each_notification_gets_fresh_token() {
    let h = harness();
    let (tx, first) = notified_transaction(&h).await;
    let second = h
        .service
        .send_notification(tx.id, SendNotificationRequest::new("Reminder", "Still waiting"))
        .await
        .unwrap();

    assert_ne!(first.upload_token, second.upload_token);
    assert_ne!(first.id, second.id);

    let stored = h.service.get_transaction_by_id(tx.id).await.unwrap();
    assert_eq!(stored.last_notification_id, Some(second.id));

    // Older tokens keep working.
    h.service.validate_upload_token(&first.upload_token).await.unwrap();
    h.service.validate_upload_token(&second.upload_token).await.unwrap();

    let listed = h.service.list_notifications(tx.id).await.unwrap();
    let ids: Vec<Uuid> = listed.iter().map(|n| n.id).collect();
    assert_eq!(ids, vec![first.id, second.id]);
}

#[tokio::test]
async fn test_list_notifications_unknown_transaction() {
    let h = harness();
    let err = h.service.list_notifications(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, Error::TransactionNotFound(_)));
}

#[tokio::test]
async fn test_mail_failure_keeps_notification_and_token() {
    let h = harness_with(
        WorkflowConfig::new(SENDER, ACCOUNTANT),
        MockMailSender::new().failing(),
    );
    let tx = h.service.create_transaction(new_request("C1")).await.unwrap();

    let err = h
        .service
        .send_notification(tx.id, SendNotificationRequest::new("Docs", "W-2 please"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Mail(_)));
    assert_eq!(h.mail.attempt_count(), 1);

    // The record was written before the send was attempted.
    let stored = h.notifications.snapshot();
    assert_eq!(stored.len(), 1);
    h.service
        .validate_upload_token(&stored[0].upload_token)
        .await
        .unwrap();

    let tx = h.service.get_transaction_by_id(tx.id).await.unwrap();
    assert!(tx.last_notification_id.is_none());
}

#[tokio::test]
async fn test_transaction_write_failure_after_email_is_reported() {
    let h = harness();
    let tx = h.service.create_transaction(new_request("C1")).await.unwrap();
    h.transactions.fail_puts.store(true, Ordering::SeqCst);

    let err = h
        .service
        .send_notification(tx.id, SendNotificationRequest::new("Docs", "W-2 please"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Storage(_)));

    // The email already went out and its notification exists.
    assert_eq!(h.mail.sent_count(), 1);
    assert_eq!(h.notifications.len(), 1);
}

#[tokio::test]
async fn test_mark_resolved_is_idempotent() {
    let h = harness();
    let (_, notification) = notified_transaction(&h).await;
    let notifications = h.service.notifications();

    let first = notifications
        .mark_notification_as_resolved(notification.id)
        .await
        .unwrap();
    let second = notifications
        .mark_notification_as_resolved(notification.id)
        .await
        .unwrap();

    assert!(first.is_resolved);
    assert_eq!(first, second);
    assert_eq!(h.notifications.snapshot(), vec![second]);
}

#[tokio::test]
async fn test_mark_resolved_unknown_notification() {
    let h = harness();
    let id = Uuid::new_v4();
    let err = h
        .service
        .notifications()
        .mark_notification_as_resolved(id)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotificationNotFound(missing) if missing == id));
}

// =============================================================================
// UPLOAD TOKENS
// =============================================================================

#[tokio::test]
async fn test_validate_upload_token() {
    let h = harness();
    let (_, notification) = notified_transaction(&h).await;

    h.service
        .validate_upload_token(&notification.upload_token)
        .await
        .unwrap();

    for token in ["", "not-a-token", &Uuid::new_v4().to_string()] {
        let err = h.service.validate_upload_token(token).await.unwrap_err();
        assert!(matches!(err, Error::UploadTokenNotFound), "token {:?}", token);
    }
}

#[tokio::test]
async fn test_upload_with_unknown_token_changes_nothing() {
    let h = harness();
    let (tx, _) = notified_transaction(&h).await;
    let transactions_before = h.transactions.inner.snapshot();
    let notifications_before = h.notifications.snapshot();

    let err = h
        .service
        .attach_file_to_transaction("bogus", bank_statement(&[1, 2, 3]))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::UploadTokenNotFound));
    assert_eq!(h.transactions.inner.snapshot(), transactions_before);
    assert_eq!(h.notifications.snapshot(), notifications_before);
    assert!(h.objects.inner.is_empty());
    assert!(!h.service.get_transaction_by_id(tx.id).await.unwrap().is_completed);
}

#[tokio::test]
async fn test_empty_upload_rejected_before_any_change() {
    let h = harness();
    let (tx, notification) = notified_transaction(&h).await;

    let err = h
        .service
        .attach_file_to_transaction(&notification.upload_token, bank_statement(&[]))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InvalidInput(_)));
    assert!(h.objects.inner.is_empty());
    let stored = h.service.get_transaction_by_id(tx.id).await.unwrap();
    assert!(!stored.is_completed);
    assert!(stored.file_key.is_none());
}

// =============================================================================
// FILE ATTACHMENT
// =============================================================================

#[tokio::test]
async fn test_upload_completes_transaction_end_to_end() {
    let h = harness();
    let (tx, notification) = notified_transaction(&h).await;
    let before = Utc::now();

    let updated = h
        .service
        .attach_file_to_transaction(&notification.upload_token, bank_statement(&[0x01, 0x02]))
        .await
        .unwrap();

    assert_eq!(updated.id, tx.id);
    assert!(updated.is_completed);
    assert!(updated.is_consistent());
    assert!(updated.updated_at >= before);

    let file_key = updated.file_key.clone().unwrap();
    assert!(file_key.ends_with("-statement.pdf"), "key was {}", file_key);
    assert_eq!(
        h.objects.inner.content_type(&file_key).as_deref(),
        Some("application/pdf")
    );

    let stored = h.service.get_transaction_by_id(tx.id).await.unwrap();
    assert_eq!(stored, updated);

    let data = h.service.download_transaction_file(tx.id).await.unwrap();
    assert_eq!(data, vec![0x01, 0x02]);

    let resolved = h.notifications.get(notification.id).await.unwrap().unwrap();
    assert!(resolved.is_resolved);

    let alerts = h.mail.sent_to(ACCOUNTANT);
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].from, SENDER);
    assert_eq!(
        alerts[0].subject,
        format!("Document Uploaded for Transaction {}", tx.id)
    );
    assert!(alerts[0]
        .text_body
        .starts_with(&format!("A document has been uploaded for transaction {}.", tx.id)));
    assert!(alerts[0].text_body.contains("memory://objects/"));
}

#[tokio::test]
async fn test_download_without_file() {
    let h = harness();
    let tx = h.service.create_transaction(new_request("C1")).await.unwrap();

    let err = h.service.download_transaction_file(tx.id).await.unwrap_err();
    assert!(matches!(err, Error::NoFile(id) if id == tx.id));

    let err = h.service.get_file_download_url(tx.id).await.unwrap_err();
    assert!(matches!(err, Error::NoFile(_)));

    let err = h.service.download_transaction_file(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, Error::TransactionNotFound(_)));
}

#[tokio::test]
async fn test_file_download_url_expires_after_configured_hours() {
    let h = harness_with(
        WorkflowConfig::new(SENDER, ACCOUNTANT).with_download_url_expiration_hours(2),
        MockMailSender::new(),
    );
    let (tx, notification) = notified_transaction(&h).await;
    h.service
        .attach_file_to_transaction(&notification.upload_token, bank_statement(b"pdf"))
        .await
        .unwrap();

    let link = h.service.get_file_download_url(tx.id).await.unwrap();
    assert_eq!(link.method, PresignMethod::Get);
    assert!(link.url.contains("method=GET"));

    let ttl = link.expires_at - Utc::now();
    assert!(ttl > chrono::Duration::minutes(119), "ttl was {}", ttl);
    assert!(ttl <= chrono::Duration::hours(2));
}

#[tokio::test]
async fn test_accountant_mail_failure_is_swallowed() {
    let h = harness_with(
        WorkflowConfig::new(SENDER, ACCOUNTANT),
        MockMailSender::new().failing_for(ACCOUNTANT),
    );
    let (tx, notification) = notified_transaction(&h).await;

    let updated = h
        .service
        .attach_file_to_transaction(&notification.upload_token, bank_statement(b"pdf"))
        .await
        .unwrap();

    assert!(updated.is_completed);
    assert!(h.mail.sent_to(ACCOUNTANT).is_empty());
    // One client send plus the failed accountant attempt.
    assert_eq!(h.mail.attempt_count(), 2);
    let resolved = h.notifications.get(notification.id).await.unwrap().unwrap();
    assert!(resolved.is_resolved);
    assert_eq!(h.service.download_transaction_file(tx.id).await.unwrap(), b"pdf");
}

#[tokio::test]
async fn test_presign_failure_skips_accountant_email() {
    let h = harness();
    let (_, notification) = notified_transaction(&h).await;
    h.objects.fail_presign.store(true, Ordering::SeqCst);

    let updated = h
        .service
        .attach_file_to_transaction(&notification.upload_token, bank_statement(b"pdf"))
        .await
        .unwrap();

    assert!(updated.is_completed);
    assert!(h.mail.sent_to(ACCOUNTANT).is_empty());
    assert_eq!(h.mail.attempt_count(), 1);
}

#[tokio::test]
async fn test_object_store_failure_aborts_upload() {
    let h = harness();
    let (tx, notification) = notified_transaction(&h).await;
    h.objects.fail_puts.store(true, Ordering::SeqCst);

    let err = h
        .service
        .attach_file_to_transaction(&notification.upload_token, bank_statement(b"pdf"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Storage(_)));
    let stored = h.service.get_transaction_by_id(tx.id).await.unwrap();
    assert!(!stored.is_completed);
    assert!(stored.file_key.is_none());
    let pending = h.notifications.get(notification.id).await.unwrap().unwrap();
    assert!(!pending.is_resolved);
    assert!(h.mail.sent_to(ACCOUNTANT).is_empty());
}

#[tokio::test]
async fn test_token_reuse_replaces_file_by_default() {
    let h = harness();
    let (tx, notification) = notified_transaction(&h).await;

    let first = h
        .service
        .attach_file_to_transaction(&notification.upload_token, bank_statement(b"v1"))
        .await
        .unwrap();
    h.service
        .validate_upload_token(&notification.upload_token)
        .await
        .unwrap();
    let second = h
        .service
        .attach_file_to_transaction(&notification.upload_token, bank_statement(b"v2"))
        .await
        .unwrap();

    assert_ne!(first.file_key, second.file_key);
    assert_eq!(h.service.download_transaction_file(tx.id).await.unwrap(), b"v2");
    assert_eq!(h.objects.inner.len(), 2);
    assert_eq!(h.mail.sent_to(ACCOUNTANT).len(), 2);
}

#[tokio::test]
async fn test_single_use_tokens_reject_second_upload() {
    let h = harness_with(
        WorkflowConfig::new(SENDER, ACCOUNTANT).with_single_use_upload_tokens(true),
        MockMailSender::new(),
    );
    let (tx, notification) = notified_transaction(&h).await;

    h.service
        .attach_file_to_transaction(&notification.upload_token, bank_statement(b"v1"))
        .await
        .unwrap();

    let err = h
        .service
        .validate_upload_token(&notification.upload_token)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UploadTokenNotFound));

    let err = h
        .service
        .attach_file_to_transaction(&notification.upload_token, bank_statement(b"v2"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UploadTokenNotFound));
    assert_eq!(h.service.download_transaction_file(tx.id).await.unwrap(), b"v1");
    assert_eq!(h.objects.inner.len(), 1);
}

#[tokio::test]
async fn test_completion_flag_tracks_file_key_throughout() {
    let h = harness();
    let tx = h.service.create_transaction(new_request("C1")).await.unwrap();
    assert!(tx.is_consistent());

    let notification = h
        .service
        .send_notification(tx.id, SendNotificationRequest::new("Docs", "W-2"))
        .await
        .unwrap();
    assert!(h.transactions.inner.snapshot().iter().all(Transaction::is_consistent));

    h.service
        .attach_file_to_transaction(&notification.upload_token, bank_statement(b"pdf"))
        .await
        .unwrap();
    let all = h.transactions.inner.snapshot();
    assert!(all.iter().all(Transaction::is_consistent));
    assert!(all.iter().all(|t| t.is_completed));
}

#[tokio::test]
async fn test_invoice_request_scenario() {
    let h = harness();
    let tx = h
        .service
        .create_transaction(CreateTransactionRequest::new("C1", "c1@x.com", "invoice"))
        .await
        .unwrap();

    let notification = h
        .service
        .send_notification(
            tx.id,
            SendNotificationRequest::new("Please upload", "See attached request"),
        )
        .await
        .unwrap();
    assert!(notification.message.starts_with("See attached request"));
    let url = notification.message.rsplit(' ').next().unwrap();
    assert!(url.ends_with(&notification.upload_token));

    let updated = h
        .service
        .attach_file_to_transaction(&notification.upload_token, bank_statement(&[0x01, 0x02]))
        .await
        .unwrap();
    assert!(updated.is_completed);
    assert_eq!(
        h.service.download_transaction_file(tx.id).await.unwrap(),
        vec![0x01, 0x02]
    );
    let resolved = h.notifications.get(notification.id).await.unwrap().unwrap();
    assert!(resolved.is_resolved);
}
