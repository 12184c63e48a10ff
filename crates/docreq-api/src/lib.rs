//! docreq-api - document-request workflow services and HTTP surface.

pub mod error;
pub mod handlers;
pub mod services;

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use governor::{Quota, RateLimiter};
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

use docreq_core::defaults;

pub use error::ApiError;
pub use handlers::files::SignedFileAccess;
pub use services::{NotificationService, TransactionService};

// =============================================================================
// REQUEST ID (UUIDv7)
// =============================================================================

/// Generates time-ordered UUIDv7 request correlation IDs.
#[derive(Clone, Default)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

// =============================================================================
// STATE
// =============================================================================

/// Global rate limiter type (direct quota, not keyed per client).
pub type GlobalRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Build a limiter admitting `requests` per `period`, or `None` if either is zero.
pub fn rate_limiter(requests: u32, period: Duration) -> Option<Arc<GlobalRateLimiter>> {
    let burst = NonZeroU32::new(requests)?;
    let quota = Quota::with_period(period / requests)?.allow_burst(burst);
    Some(Arc::new(RateLimiter::direct(quota)))
}

/// Limiter for the upload routes, or `None` when disabled.
///
/// Enabled settings that cannot form a quota are rejected instead of
/// silently turning the limiter off.
pub fn upload_rate_limiter(
    enabled: bool,
    requests: u32,
    period: Duration,
) -> anyhow::Result<Option<Arc<GlobalRateLimiter>>> {
    if !enabled {
        return Ok(None);
    }
    if requests == 0 || period.is_zero() {
        anyhow::bail!(
            "rate limiting is enabled but RATE_LIMIT_REQUESTS ({}) and \
             RATE_LIMIT_PERIOD_SECS ({}) must both be at least 1",
            requests,
            period.as_secs()
        );
    }
    let limiter = rate_limiter(requests, period).ok_or_else(|| {
        anyhow::anyhow!("period {:?} is too short for {} requests", period, requests)
    })?;
    Ok(Some(limiter))
}

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub transactions: TransactionService,
    /// Set when objects live on the local filesystem and are served via `/files/:key`.
    pub signed_files: Option<SignedFileAccess>,
    /// Applied to the `/upload` routes only (None if rate limiting is disabled).
    pub rate_limiter: Option<Arc<GlobalRateLimiter>>,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(transactions: TransactionService) -> Self {
        Self {
            transactions,
            signed_files: None,
            rate_limiter: None,
            max_upload_bytes: defaults::MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_signed_files(mut self, access: SignedFileAccess) -> Self {
        self.signed_files = Some(access);
        self
    }

    pub fn with_rate_limiter(mut self, limiter: Option<Arc<GlobalRateLimiter>>) -> Self {
        self.rate_limiter = limiter;
        self
    }

    pub fn with_max_upload_bytes(mut self, bytes: usize) -> Self {
        self.max_upload_bytes = bytes;
        self
    }
}

// =============================================================================
// ROUTER
// =============================================================================

pub fn build_router(state: AppState) -> Router {
    let upload_routes = Router::new()
        .route(
            "/upload/:token",
            get(handlers::uploads::validate_token).post(handlers::uploads::upload_file),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ));

    Router::new()
        .route("/health", get(handlers::health_check))
        .route(
            "/api/transactions",
            post(handlers::transactions::create_transaction),
        )
        .route(
            "/api/transactions/:id",
            get(handlers::transactions::get_transaction),
        )
        .route(
            "/api/transactions/client/:client_id",
            get(handlers::transactions::list_client_transactions),
        )
        .route(
            "/api/transactions/:id/notify",
            post(handlers::transactions::send_notification),
        )
        .route(
            "/api/transactions/:id/notifications",
            get(handlers::transactions::list_notifications),
        )
        .route(
            "/api/transactions/:id/download",
            get(handlers::transactions::download_file),
        )
        .route(
            "/api/transactions/:id/download-url",
            get(handlers::transactions::download_url),
        )
        .route(
            "/files/:key",
            get(handlers::files::get_object).put(handlers::files::put_object),
        )
        .merge(upload_routes)
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(axum::extract::DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(state.max_upload_bytes))
        .with_state(state)
}

// =============================================================================
// RATE LIMITING MIDDLEWARE
// =============================================================================

async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    if let Some(limiter) = &state.rate_limiter {
        if limiter.check().is_err() {
            tracing::warn!(subsystem = "api", component = "rate_limit", "Rate limit exceeded");
            return Err((
                StatusCode::TOO_MANY_REQUESTS,
                Json(serde_json::json!({
                    "error": "Too many requests. Please wait before retrying."
                })),
            ));
        }
    }
    Ok(next.run(request).await)
}
