//! HTTP mail API sender.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, warn};

use docreq_core::{Error, MailSender, OutboundEmail, Result};

/// Longest slice of an error response body kept in the error message.
const ERROR_BODY_EXCERPT: usize = 256;

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

/// Delivers email by POSTing JSON to a transactional mail API.
#[derive(Clone)]
pub struct HttpMailSender {
    client: Client,
    api_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl HttpMailSender {
    pub fn new(
        api_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Mail(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_url: api_url.into(),
            api_key,
            timeout,
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl MailSender for HttpMailSender {
    async fn send(&self, email: &OutboundEmail) -> Result<()> {
        let start = Instant::now();
        let body = SendRequest {
            from: &email.from,
            to: &email.to,
            subject: &email.subject,
            text: &email.text_body,
        };

        let mut request = self.client.post(&self.api_url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Mail(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            let excerpt: String = text.chars().take(ERROR_BODY_EXCERPT).collect();
            warn!(
                subsystem = "mail",
                component = "http",
                op = "send",
                status = status.as_u16(),
                "Mail API rejected message"
            );
            return Err(Error::Mail(format!("Mail API returned {}: {}", status, excerpt)));
        }

        debug!(
            subsystem = "mail",
            component = "http",
            op = "send",
            duration_ms = start.elapsed().as_millis() as u64,
            "Email accepted by mail API"
        );
        Ok(())
    }
}
