//! Sender that writes emails to the log instead of delivering them.

use async_trait::async_trait;
use tracing::info;

use docreq_core::{MailSender, OutboundEmail, Result};

/// Local-development sender. Every email is logged at INFO and reported as sent.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailSender;

impl LogMailSender {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MailSender for LogMailSender {
    async fn send(&self, email: &OutboundEmail) -> Result<()> {
        info!(
            subsystem = "mail",
            component = "log",
            op = "send",
            from = %email.from,
            to = %email.to,
            subject = %email.subject,
            body = %email.text_body,
            "Email (not delivered)"
        );
        Ok(())
    }
}
