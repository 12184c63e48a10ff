//! # docreq-db
//!
//! Record stores and object storage for docreq.
//!
//! This crate provides:
//! - Connection pool management
//! - PostgreSQL transaction and notification repositories
//! - In-memory repositories and object store for tests and single-process runs
//! - Object storage gateway with filesystem and S3 backends
//! - HMAC-signed URLs for filesystem-backed objects
//!
//! ## Example
//!
//! ```rust,ignore
//! use docreq_db::Database;
//! use docreq_core::TransactionRepository;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/docreq").await?;
//!     let open = db.transactions.list_by_client("C-1042").await?;
//!     println!("{} transactions", open.len());
//!     Ok(())
//! }
//! ```

pub mod file_storage;
pub mod memory;
pub mod notifications;
pub mod pool;
#[cfg(feature = "s3")]
pub mod s3;
pub mod transactions;
pub mod url_signing;

// Always compiled so integration tests in tests/ can reach it
pub mod test_fixtures;

pub use docreq_core::*;

pub use file_storage::{object_key, FilesystemObjectStore, ObjectStoreGateway};
pub use memory::{
    InMemoryNotificationRepository, InMemoryObjectStore, InMemoryTransactionRepository,
};
pub use notifications::PgNotificationRepository;
pub use pool::{create_pool, create_pool_with_config, PoolConfig};
#[cfg(feature = "s3")]
pub use s3::S3ObjectStore;
pub use transactions::PgTransactionRepository;
pub use url_signing::{SignatureError, UrlSigner, FILES_PATH};

/// PostgreSQL context holding the pool and both record repositories.
#[derive(Clone)]
pub struct Database {
    pub pool: sqlx::Pool<sqlx::Postgres>,
    pub transactions: PgTransactionRepository,
    pub notifications: PgNotificationRepository,
}

impl Database {
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            transactions: PgTransactionRepository::new(pool.clone()),
            notifications: PgNotificationRepository::new(pool.clone()),
            pool,
        }
    }

    /// Connect with the default pool configuration.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}
