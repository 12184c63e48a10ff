//! docreq-api - HTTP API server for the document-request workflow

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docreq_api::{
    build_router, upload_rate_limiter, AppState, NotificationService, SignedFileAccess,
    TransactionService,
};
use docreq_core::{
    defaults, NotificationRepository, ObjectStore, TransactionRepository, WorkflowConfig,
};
use docreq_db::{
    Database, FilesystemObjectStore, InMemoryNotificationRepository, InMemoryObjectStore,
    InMemoryTransactionRepository, ObjectStoreGateway, PoolConfig, UrlSigner,
};
use docreq_mail::{build_sender, MailConfig};

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> anyhow::Result<T> {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => v
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} has an invalid value: {}", key, v)),
        _ => Ok(default),
    }
}

/// Initialize tracing with configurable output.
///
/// Environment variables:
///   LOG_FORMAT  - "json" or "text" (default: "text")
///   LOG_FILE    - path to log file (optional, enables file logging)
///   LOG_ANSI    - "true"/"false" override ANSI colors
///   RUST_LOG    - standard env filter (default: "docreq_api=debug,docreq_db=info,...")
fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_format = env_or("LOG_FORMAT", "text");
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "docreq_api=debug,docreq_db=info,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(env_filter);

    let guard = if let Some(ref path) = log_file {
        let file_dir = Path::new(path).parent().unwrap_or(Path::new("."));
        let file_name = Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("docreq-api.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );
    guard
}

/// Record stores selected by `RECORD_STORE`.
async fn record_stores() -> anyhow::Result<(
    Arc<dyn TransactionRepository>,
    Arc<dyn NotificationRepository>,
)> {
    match env_or("RECORD_STORE", "postgres").as_str() {
        "memory" => {
            info!(subsystem = "api", component = "init", "Using in-memory record stores");
            let transactions: Arc<dyn TransactionRepository> =
                Arc::new(InMemoryTransactionRepository::new());
            let notifications: Arc<dyn NotificationRepository> =
                Arc::new(InMemoryNotificationRepository::new());
            Ok((transactions, notifications))
        }
        "postgres" => {
            let database_url = env_or("DATABASE_URL", "postgres://localhost/docreq");
            info!("Connecting to database...");
            let db = Database::connect_with_config(&database_url, PoolConfig::from_env()?)
                .await
                .context("failed to connect to database")?;
            db.migrate().await.context("failed to run migrations")?;
            info!("Database connected and migrated");
            let transactions: Arc<dyn TransactionRepository> = Arc::new(db.transactions);
            let notifications: Arc<dyn NotificationRepository> = Arc::new(db.notifications);
            Ok((transactions, notifications))
        }
        other => anyhow::bail!("RECORD_STORE must be 'postgres' or 'memory', got: {}", other),
    }
}

/// Object store selected by `OBJECT_STORE`, plus signed access when it is local.
async fn object_store(
    config: &WorkflowConfig,
) -> anyhow::Result<(Arc<dyn ObjectStore>, Option<SignedFileAccess>)> {
    match env_or("OBJECT_STORE", "filesystem").as_str() {
        "filesystem" => {
            let base = env_or("FILE_STORAGE_PATH", "/var/lib/docreq");
            let secret = std::env::var("URL_SIGNING_SECRET")
                .context("URL_SIGNING_SECRET is required when OBJECT_STORE=filesystem")?;
            let signer = UrlSigner::new(secret, config.public_base_url.clone())?;
            let store = FilesystemObjectStore::new(&base, signer.clone());
            store
                .validate()
                .await
                .map_err(|e| anyhow::anyhow!("file storage at {} is not usable: {}", base, e))?;
            info!(
                subsystem = "api",
                component = "init",
                path = %base,
                "Using filesystem object store"
            );
            let store: Arc<dyn ObjectStore> = Arc::new(store);
            let access = SignedFileAccess {
                store: store.clone(),
                signer,
            };
            Ok((store, Some(access)))
        }
        "memory" => {
            let store: Arc<dyn ObjectStore> = Arc::new(InMemoryObjectStore::new());
            Ok((store, None))
        }
        #[cfg(feature = "s3")]
        "s3" => {
            let store: Arc<dyn ObjectStore> =
                Arc::new(docreq_db::S3ObjectStore::from_env(config.bucket.clone()).await);
            Ok((store, None))
        }
        other => anyhow::bail!("unsupported OBJECT_STORE: {}", other),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let _log_guard = init_tracing();

    let config = Arc::new(WorkflowConfig::from_env()?);
    let host = env_or("HOST", "0.0.0.0");
    let port: u16 = env_parse("PORT", 3000)?;
    let max_upload_bytes: usize = env_parse("MAX_UPLOAD_BYTES", defaults::MAX_UPLOAD_BYTES)?;

    let rate_limit_enabled = std::env::var("RATE_LIMIT_ENABLED")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(true);
    let rate_limit_requests: u32 =
        env_parse("RATE_LIMIT_REQUESTS", defaults::RATE_LIMIT_REQUESTS)?;
    let rate_limit_period_secs: u64 =
        env_parse("RATE_LIMIT_PERIOD_SECS", defaults::RATE_LIMIT_PERIOD_SECS)?;
    info!(
        "Upload rate limiting: {} ({} requests per {} seconds)",
        if rate_limit_enabled { "enabled" } else { "disabled" },
        rate_limit_requests,
        rate_limit_period_secs
    );
    let limiter = upload_rate_limiter(
        rate_limit_enabled,
        rate_limit_requests,
        Duration::from_secs(rate_limit_period_secs),
    )?;

    let (transactions, notifications) = record_stores().await?;
    let (store, signed_files) = object_store(&config).await?;
    let mail = build_sender(&MailConfig::from_env()?)?;

    let notification_service = NotificationService::new(notifications, mail, config.clone());
    let transaction_service = TransactionService::new(
        transactions,
        notification_service,
        ObjectStoreGateway::new(store),
        config.clone(),
    );

    let mut state = AppState::new(transaction_service)
        .with_rate_limiter(limiter)
        .with_max_upload_bytes(max_upload_bytes);
    if let Some(access) = signed_files {
        state = state.with_signed_files(access);
    }
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!(public_base_url = %config.public_base_url, "Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
