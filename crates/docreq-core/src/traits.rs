//! Core traits for docreq abstractions.
//!
//! These are the seams to the three external systems the workflow spans:
//! record stores, an object store, and a mail sender. Implementations live
//! in `docreq-db` and `docreq-mail`.

use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// RECORD STORE TRAITS
// =============================================================================

/// Durable mapping from transaction id to [`Transaction`].
#[async_trait]
pub trait TransactionRepository: Send + Sync {
    /// Insert or replace a transaction (last writer wins).
    async fn put(&self, transaction: &Transaction) -> Result<()>;

    /// Fetch a transaction by id.
    async fn get(&self, id: Uuid) -> Result<Option<Transaction>>;

    /// All transactions for a client. No ordering is guaranteed.
    async fn list_by_client(&self, client_id: &str) -> Result<Vec<Transaction>>;
}

/// Durable mapping from notification id and upload token to [`Notification`].
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// Insert or replace a notification (last writer wins).
    async fn put(&self, notification: &Notification) -> Result<()>;

    /// Fetch a notification by id.
    async fn get(&self, id: Uuid) -> Result<Option<Notification>>;

    /// Fetch the notification that issued `token`.
    async fn find_by_upload_token(&self, token: &str) -> Result<Option<Notification>>;

    /// All notifications sent for a transaction. No ordering is guaranteed.
    async fn list_by_transaction(&self, transaction_id: Uuid) -> Result<Vec<Notification>>;
}

// =============================================================================
// OBJECT STORE TRAITS
// =============================================================================

/// Blob storage keyed by opaque strings.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write `data` under `key`.
    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> Result<()>;

    /// Read the object at `key`. Fails with a not-found error if absent.
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Mint a URL granting `method` access to `key` for `expires_in`.
    async fn presign(&self, key: &str, expires_in: Duration, method: PresignMethod)
        -> Result<String>;
}

// =============================================================================
// MAIL TRAITS
// =============================================================================

/// Outbound email transport.
#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, email: &OutboundEmail) -> Result<()>;
}
