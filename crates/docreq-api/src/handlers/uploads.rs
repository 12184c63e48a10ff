//! Unauthenticated client upload endpoints under `/upload/:token`.
//!
//! Responses never reveal which transaction a token belongs to.

use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use serde::Serialize;

use docreq_core::FileUpload;

use crate::error::ApiError;
use crate::AppState;

pub const UPLOAD_SUCCESS_MESSAGE: &str = "Thank you! Your file has been uploaded successfully.";

const NO_FILE_MESSAGE: &str = "Please select a file to upload";

/// Carries no identifiers, so the token route reveals nothing about the transaction.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
}

pub async fn validate_token(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .transactions
        .validate_upload_token(&token)
        .await
        .map_err(ApiError::from_upload)?;
    Ok(Json(serde_json::json!({ "valid": true })))
}

/// Accept the multipart field `file` and attach it to the token's transaction.
pub async fn upload_file(
    State(state): State<AppState>,
    Path(token): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut upload: Option<FileUpload> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {}", e)))?
    {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or("document").to_string();
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(format!("Failed to read file data: {}", e)))?;
            upload = Some(FileUpload::new(filename, content_type, data.to_vec()));
            break;
        }
    }

    let upload = upload.ok_or_else(|| ApiError::BadRequest(NO_FILE_MESSAGE.to_string()))?;

    state
        .transactions
        .attach_file_to_transaction(&token, upload)
        .await
        .map_err(ApiError::from_upload)?;

    Ok(Json(UploadResponse {
        message: UPLOAD_SUCCESS_MESSAGE.to_string(),
    }))
}
