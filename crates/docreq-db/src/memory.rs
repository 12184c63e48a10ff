//! In-process record and object stores.
//!
//! Used by tests and by the server when `RECORD_STORE=memory`. Secondary
//! lookups go through indexes that are maintained on every `put`, so they
//! behave like the Postgres indexes rather than a scan.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use docreq_db::memory::InMemoryTransactionRepository;
//!
//! let repo = InMemoryTransactionRepository::new();
//! repo.put(&transaction).await?;
//! let for_client = repo.list_by_client("C1").await?;
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use docreq_core::{
    Error, Notification, NotificationRepository, ObjectStore, PresignMethod, Result, Transaction,
    TransactionRepository,
};

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// =============================================================================
// TRANSACTIONS
// =============================================================================

#[derive(Default)]
struct TransactionTables {
    by_id: HashMap<Uuid, Transaction>,
    by_client: HashMap<String, HashSet<Uuid>>,
}

/// In-memory transaction repository.
#[derive(Clone, Default)]
pub struct InMemoryTransactionRepository {
    tables: Arc<RwLock<TransactionTables>>,
}

impl InMemoryTransactionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored transactions.
    pub fn len(&self) -> usize {
        read(&self.tables).by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of every stored transaction, for assertions.
    pub fn snapshot(&self) -> Vec<Transaction> {
        read(&self.tables).by_id.values().cloned().collect()
    }
}

#[async_trait]
impl TransactionRepository for InMemoryTransactionRepository {
    async fn put(&self, transaction: &Transaction) -> Result<()> {
        let mut tables = write(&self.tables);
        if let Some(previous) = tables.by_id.get(&transaction.id) {
            let old_client = previous.client_id.clone();
            if let Some(ids) = tables.by_client.get_mut(&old_client) {
                ids.remove(&transaction.id);
            }
        }
        tables
            .by_client
            .entry(transaction.client_id.clone())
            .or_default()
            .insert(transaction.id);
        tables.by_id.insert(transaction.id, transaction.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Transaction>> {
        Ok(read(&self.tables).by_id.get(&id).cloned())
    }

    async fn list_by_client(&self, client_id: &str) -> Result<Vec<Transaction>> {
        let tables = read(&self.tables);
        Ok(tables
            .by_client
            .get(client_id)
            .into_iter()
            .flatten()
            .filter_map(|id| tables.by_id.get(id).cloned())
            .collect())
    }
}

// =============================================================================
// NOTIFICATIONS
// =============================================================================

#[derive(Default)]
struct NotificationTables {
    by_id: HashMap<Uuid, Notification>,
    by_token: HashMap<String, Uuid>,
    by_transaction: HashMap<Uuid, HashSet<Uuid>>,
}

/// In-memory notification repository.
#[derive(Clone, Default)]
pub struct InMemoryNotificationRepository {
    tables: Arc<RwLock<NotificationTables>>,
}

impl InMemoryNotificationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        read(&self.tables).by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<Notification> {
        read(&self.tables).by_id.values().cloned().collect()
    }
}

#[async_trait]
impl NotificationRepository for InMemoryNotificationRepository {
    async fn put(&self, notification: &Notification) -> Result<()> {
        let mut tables = write(&self.tables);
        if let Some(previous) = tables.by_id.get(&notification.id).cloned() {
            tables.by_token.remove(&previous.upload_token);
            if let Some(ids) = tables.by_transaction.get_mut(&previous.transaction_id) {
                ids.remove(&notification.id);
            }
        }
        tables
            .by_token
            .insert(notification.upload_token.clone(), notification.id);
        tables
            .by_transaction
            .entry(notification.transaction_id)
            .or_default()
            .insert(notification.id);
        tables.by_id.insert(notification.id, notification.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Notification>> {
        Ok(read(&self.tables).by_id.get(&id).cloned())
    }

    async fn find_by_upload_token(&self, token: &str) -> Result<Option<Notification>> {
        let tables = read(&self.tables);
        Ok(tables
            .by_token
            .get(token)
            .and_then(|id| tables.by_id.get(id).cloned()))
    }

    async fn list_by_transaction(&self, transaction_id: Uuid) -> Result<Vec<Notification>> {
        let tables = read(&self.tables);
        Ok(tables
            .by_transaction
            .get(&transaction_id)
            .into_iter()
            .flatten()
            .filter_map(|id| tables.by_id.get(id).cloned())
            .collect())
    }
}

// =============================================================================
// OBJECTS
// =============================================================================

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    content_type: String,
}

/// In-memory object store.
///
/// Presigned URLs use the `memory://` scheme and are not dereferenceable;
/// they exist so workflows can be exercised end to end.
#[derive(Clone, Default)]
pub struct InMemoryObjectStore {
    objects: Arc<RwLock<HashMap<String, StoredObject>>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        read(&self.objects).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Content type recorded for `key`, if the object exists.
    pub fn content_type(&self, key: &str) -> Option<String> {
        read(&self.objects).get(key).map(|o| o.content_type.clone())
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> Result<()> {
        write(&self.objects).insert(
            key.to_string(),
            StoredObject {
                data: data.to_vec(),
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        read(&self.objects)
            .get(key)
            .map(|o| o.data.clone())
            .ok_or_else(|| Error::NotFound(format!("Object not found: {}", key)))
    }

    async fn presign(
        &self,
        key: &str,
        expires_in: Duration,
        method: PresignMethod,
    ) -> Result<String> {
        let expires = Utc::now().timestamp() + expires_in.as_secs() as i64;
        Ok(format!(
            "memory://objects/{}?method={}&expires={}",
            urlencoding::encode(key),
            method,
            expires
        ))
    }
}
