//! PostgreSQL transaction record store.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use tracing::debug;
use uuid::Uuid;

use docreq_core::{Result, Transaction, TransactionRepository};

const SELECT_COLUMNS: &str = "id, client_id, client_email, description, is_completed, file_key,
     last_notification_id, created_at, updated_at";

/// PostgreSQL transaction repository.
#[derive(Clone)]
pub struct PgTransactionRepository {
    pool: Pool<Postgres>,
}

impl PgTransactionRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionRepository for PgTransactionRepository {
    async fn put(&self, transaction: &Transaction) -> Result<()> {
        debug!(
            subsystem = "db",
            component = "transactions",
            op = "put",
            transaction_id = %transaction.id,
            "Saving transaction"
        );
        sqlx::query(
            r#"INSERT INTO doc_transaction
                   (id, client_id, client_email, description, is_completed, file_key,
                    last_notification_id, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
               ON CONFLICT (id) DO UPDATE SET
                   client_id = EXCLUDED.client_id,
                   client_email = EXCLUDED.client_email,
                   description = EXCLUDED.description,
                   is_completed = EXCLUDED.is_completed,
                   file_key = EXCLUDED.file_key,
                   last_notification_id = EXCLUDED.last_notification_id,
                   updated_at = EXCLUDED.updated_at"#,
        )
        .bind(transaction.id)
        .bind(&transaction.client_id)
        .bind(&transaction.client_email)
        .bind(&transaction.description)
        .bind(transaction.is_completed)
        .bind(&transaction.file_key)
        .bind(transaction.last_notification_id)
        .bind(transaction.created_at)
        .bind(transaction.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Transaction>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM doc_transaction WHERE id = $1",
            SELECT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(transaction_from_row).transpose()
    }

    async fn list_by_client(&self, client_id: &str) -> Result<Vec<Transaction>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM doc_transaction WHERE client_id = $1",
            SELECT_COLUMNS
        ))
        .bind(client_id)
        .fetch_all(&self.pool)
        .await?;

        debug!(
            subsystem = "db",
            component = "transactions",
            op = "list_by_client",
            result_count = rows.len(),
            "Listed transactions for client"
        );
        rows.iter().map(transaction_from_row).collect()
    }
}

fn transaction_from_row(row: &PgRow) -> Result<Transaction> {
    Ok(Transaction {
        id: row.try_get("id")?,
        client_id: row.try_get("client_id")?,
        client_email: row.try_get("client_email")?,
        description: row.try_get("description")?,
        is_completed: row.try_get("is_completed")?,
        file_key: row.try_get("file_key")?,
        last_notification_id: row.try_get("last_notification_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
