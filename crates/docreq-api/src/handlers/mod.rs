//! HTTP handlers.

pub mod files;
pub mod transactions;
pub mod uploads;

use axum::Json;
use uuid::Uuid;

use crate::error::ApiError;

/// Parse a path id. Ids that are not UUIDs cannot name a transaction.
pub(crate) fn parse_transaction_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw)
        .map_err(|_| ApiError::NotFound(format!("Transaction not found: {}", raw)))
}

pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
