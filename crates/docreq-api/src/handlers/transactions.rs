//! Operator-facing transaction endpoints under `/api/transactions`.

use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use docreq_core::{
    CreateTransactionRequest, NotificationSummary, SendNotificationRequest, Transaction,
};

use super::parse_transaction_id;
use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct DownloadUrlResponse {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

pub async fn create_transaction(
    State(state): State<AppState>,
    Json(req): Json<CreateTransactionRequest>,
) -> Result<(StatusCode, Json<Transaction>), ApiError> {
    let transaction = state.transactions.create_transaction(req).await?;
    Ok((StatusCode::CREATED, Json(transaction)))
}

pub async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Transaction>, ApiError> {
    let id = parse_transaction_id(&id)?;
    Ok(Json(state.transactions.get_transaction_by_id(id).await?))
}

pub async fn list_client_transactions(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
) -> Result<Json<Vec<Transaction>>, ApiError> {
    Ok(Json(
        state
            .transactions
            .get_transactions_by_client_id(&client_id)
            .await?,
    ))
}

pub async fn send_notification(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SendNotificationRequest>,
) -> Result<Json<NotificationSummary>, ApiError> {
    let id = parse_transaction_id(&id)?;
    let notification = state.transactions.send_notification(id, req).await?;
    Ok(Json(notification.into()))
}

pub async fn list_notifications(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<NotificationSummary>>, ApiError> {
    let id = parse_transaction_id(&id)?;
    let notifications = state.transactions.list_notifications(id).await?;
    Ok(Json(notifications.into_iter().map(Into::into).collect()))
}

pub async fn download_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_transaction_id(&id)?;
    let data = state.transactions.download_transaction_file(id).await?;

    let content_disposition = format!("attachment; filename=\"{}-document\"", id);
    let headers = [
        (
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/octet-stream"),
        ),
        (
            header::CONTENT_DISPOSITION,
            HeaderValue::from_str(&content_disposition)
                .map_err(|e| ApiError::Internal(format!("invalid header value: {}", e)))?,
        ),
    ];
    Ok((StatusCode::OK, headers, data))
}

pub async fn download_url(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DownloadUrlResponse>, ApiError> {
    let id = parse_transaction_id(&id)?;
    let link = state.transactions.get_file_download_url(id).await?;
    Ok(Json(DownloadUrlResponse {
        url: link.url,
        expires_at: link.expires_at,
    }))
}
