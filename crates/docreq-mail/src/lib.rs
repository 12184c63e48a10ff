//! # docreq-mail
//!
//! Mail sender backends for docreq.
//!
//! - [`HttpMailSender`]: POSTs JSON to a transactional mail API
//! - [`LogMailSender`]: logs emails for local development
//! - `mock::MockMailSender` (feature `mock`): records emails for tests
//!
//! [`build_sender`] picks one from a [`MailConfig`].

pub mod config;
pub mod http;
pub mod log_sender;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

use std::sync::Arc;

use tracing::{info, warn};

use docreq_core::{Error, MailSender, Result};

pub use config::{MailBackend, MailConfig, MailConfigError};
pub use http::HttpMailSender;
pub use log_sender::LogMailSender;

/// Build the configured sender.
pub fn build_sender(config: &MailConfig) -> Result<Arc<dyn MailSender>> {
    info!(
        subsystem = "mail",
        component = "init",
        backend = %config.backend,
        timeout_secs = config.timeout.as_secs(),
        "Configuring mail sender"
    );
    if !config.backend.delivers() {
        warn!(
            subsystem = "mail",
            component = "init",
            backend = %config.backend,
            "Mail backend does not deliver email; set MAIL_BACKEND=http in production"
        );
    }
    match config.backend {
        MailBackend::Log => Ok(Arc::new(LogMailSender::new())),
        MailBackend::Http => {
            let url = config.api_url.clone().ok_or_else(|| {
                Error::InvalidInput("mail API URL is required for the http backend".to_string())
            })?;
            Ok(Arc::new(HttpMailSender::new(
                url,
                config.api_key.clone(),
                config.timeout,
            )?))
        }
    }
}
