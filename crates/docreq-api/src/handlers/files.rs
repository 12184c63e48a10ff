//! Signed-URL object access at `/files/:key`.
//!
//! Only mounted when the filesystem object store is in use; S3 presigned
//! URLs point at S3 directly.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, warn};

use docreq_core::{ObjectStore, PresignMethod};
use docreq_db::UrlSigner;

use crate::error::ApiError;
use crate::AppState;

/// Store and signer behind `/files/:key`.
#[derive(Clone)]
pub struct SignedFileAccess {
    pub store: Arc<dyn ObjectStore>,
    pub signer: UrlSigner,
}

#[derive(Debug, Deserialize)]
pub struct SignedQuery {
    pub method: String,
    pub expires: i64,
    pub signature: String,
}

fn authorize(
    state: &AppState,
    key: &str,
    query: &SignedQuery,
    expected: PresignMethod,
) -> Result<Arc<dyn ObjectStore>, ApiError> {
    let access = state
        .signed_files
        .as_ref()
        .ok_or_else(|| ApiError::NotFound("Signed file access is not enabled".to_string()))?;

    let method = PresignMethod::parse(&query.method)
        .filter(|m| *m == expected)
        .ok_or_else(|| ApiError::Forbidden("Link does not permit this method".to_string()))?;

    access
        .signer
        .verify(key, method, query.expires, &query.signature, Utc::now())
        .map_err(|e| {
            warn!(
                subsystem = "api",
                component = "files",
                file_key = %key,
                reason = %e,
                "Rejected signed URL"
            );
            ApiError::Forbidden(format!("Invalid link: {}", e))
        })?;

    Ok(access.store.clone())
}

pub async fn get_object(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<SignedQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let store = authorize(&state, &key, &query, PresignMethod::Get)?;
    let data = store.get(&key).await?;
    debug!(
        subsystem = "api",
        component = "files",
        op = "get",
        file_key = %key,
        size_bytes = data.len(),
        "Served signed object"
    );

    let headers = [(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    )];
    Ok((StatusCode::OK, headers, data))
}

pub async fn put_object(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<SignedQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let store = authorize(&state, &key, &query, PresignMethod::Put)?;
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream");
    store.put(&key, &body, content_type).await?;
    debug!(
        subsystem = "api",
        component = "files",
        op = "put",
        file_key = %key,
        size_bytes = body.len(),
        "Stored signed object"
    );
    Ok(StatusCode::OK)
}
