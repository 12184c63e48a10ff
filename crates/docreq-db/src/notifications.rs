//! PostgreSQL notification record store.
//!
//! Upload-token and transaction lookups use the `idx_notification_upload_token`
//! (unique) and `idx_notification_transaction_id` indexes.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use tracing::debug;
use uuid::Uuid;

use docreq_core::{Notification, NotificationRepository, Result};

const SELECT_COLUMNS: &str =
    "id, transaction_id, recipient_email, subject, message, sent_at, upload_token, is_resolved";

/// PostgreSQL notification repository.
#[derive(Clone)]
pub struct PgNotificationRepository {
    pool: Pool<Postgres>,
}

impl PgNotificationRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationRepository for PgNotificationRepository {
    async fn put(&self, notification: &Notification) -> Result<()> {
        debug!(
            subsystem = "db",
            component = "notifications",
            op = "put",
            notification_id = %notification.id,
            transaction_id = %notification.transaction_id,
            "Saving notification"
        );
        sqlx::query(
            r#"INSERT INTO notification
                   (id, transaction_id, recipient_email, subject, message, sent_at,
                    upload_token, is_resolved)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
               ON CONFLICT (id) DO UPDATE SET
                   transaction_id = EXCLUDED.transaction_id,
                   recipient_email = EXCLUDED.recipient_email,
                   subject = EXCLUDED.subject,
                   message = EXCLUDED.message,
                   sent_at = EXCLUDED.sent_at,
                   upload_token = EXCLUDED.upload_token,
                   is_resolved = EXCLUDED.is_resolved"#,
        )
        .bind(notification.id)
        .bind(notification.transaction_id)
        .bind(&notification.recipient_email)
        .bind(&notification.subject)
        .bind(&notification.message)
        .bind(notification.sent_at)
        .bind(&notification.upload_token)
        .bind(notification.is_resolved)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Notification>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM notification WHERE id = $1",
            SELECT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(notification_from_row).transpose()
    }

    async fn find_by_upload_token(&self, token: &str) -> Result<Option<Notification>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM notification WHERE upload_token = $1",
            SELECT_COLUMNS
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(notification_from_row).transpose()
    }

    async fn list_by_transaction(&self, transaction_id: Uuid) -> Result<Vec<Notification>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM notification WHERE transaction_id = $1",
            SELECT_COLUMNS
        ))
        .bind(transaction_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(notification_from_row).collect()
    }
}

fn notification_from_row(row: &PgRow) -> Result<Notification> {
    Ok(Notification {
        id: row.try_get("id")?,
        transaction_id: row.try_get("transaction_id")?,
        recipient_email: row.try_get("recipient_email")?,
        subject: row.try_get("subject")?,
        message: row.try_get("message")?,
        sent_at: row.try_get("sent_at")?,
        upload_token: row.try_get("upload_token")?,
        is_resolved: row.try_get("is_resolved")?,
    })
}
