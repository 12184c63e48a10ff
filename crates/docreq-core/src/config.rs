//! Workflow configuration.
//!
//! Loaded once at process start and shared immutably (behind `Arc`) by the
//! workflow services. Values come from environment variables; the binary
//! loads `.env` with `dotenvy` first.
//!
//! # Example
//!
//! ```rust,no_run
//! use docreq_core::config::WorkflowConfig;
//!
//! let config = WorkflowConfig::from_env().expect("invalid configuration");
//! println!("upload links point at {}", config.upload_url("<token>"));
//! ```

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::defaults;

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

pub const ENV_SENDER_EMAIL: &str = "SENDER_EMAIL";
pub const ENV_ACCOUNTANT_EMAIL: &str = "ACCOUNTANT_EMAIL";
pub const ENV_PUBLIC_BASE_URL: &str = "PUBLIC_BASE_URL";
pub const ENV_DOWNLOAD_EXPIRATION_HOURS: &str = "FILE_DOWNLOAD_EXPIRATION_HOURS";
pub const ENV_FILE_BUCKET: &str = "FILE_BUCKET";
pub const ENV_UPLOAD_TOKEN_SINGLE_USE: &str = "UPLOAD_TOKEN_SINGLE_USE";

/// Static settings consumed by the notification and transaction workflows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// `From` address for every outbound email.
    pub sender_email: String,
    /// Recipient of upload-complete alerts.
    pub accountant_email: String,
    /// Public base URL for upload links, without a trailing slash.
    pub public_base_url: String,
    /// Lifetime of presigned download URLs, in hours.
    pub download_url_expiration_hours: u64,
    /// Object store bucket or container.
    pub bucket: String,
    /// Reject upload tokens whose notification is already resolved.
    pub single_use_upload_tokens: bool,
}

impl WorkflowConfig {
    /// Build a config with defaults for everything but the two addresses.
    pub fn new(sender_email: impl Into<String>, accountant_email: impl Into<String>) -> Self {
        Self {
            sender_email: sender_email.into(),
            accountant_email: accountant_email.into(),
            public_base_url: defaults::PUBLIC_BASE_URL.to_string(),
            download_url_expiration_hours: defaults::DOWNLOAD_URL_EXPIRATION_HOURS,
            bucket: defaults::FILE_BUCKET.to_string(),
            single_use_upload_tokens: false,
        }
    }

    pub fn with_public_base_url(mut self, url: impl Into<String>) -> Self {
        self.public_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_download_url_expiration_hours(mut self, hours: u64) -> Self {
        self.download_url_expiration_hours = hours;
        self
    }

    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    pub fn with_single_use_upload_tokens(mut self, enabled: bool) -> Self {
        self.single_use_upload_tokens = enabled;
        self
    }

    /// Load from process environment variables.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load using an arbitrary key lookup (used by tests).
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let sender_email =
            non_empty(ENV_SENDER_EMAIL).ok_or(ConfigError::Missing(ENV_SENDER_EMAIL))?;
        let accountant_email =
            non_empty(ENV_ACCOUNTANT_EMAIL).ok_or(ConfigError::Missing(ENV_ACCOUNTANT_EMAIL))?;

        let mut config = Self::new(sender_email.trim(), accountant_email.trim());

        if let Some(url) = non_empty(ENV_PUBLIC_BASE_URL) {
            config = config.with_public_base_url(url.trim());
        }
        if let Some(hours) = non_empty(ENV_DOWNLOAD_EXPIRATION_HOURS) {
            let hours = hours.trim().parse::<u64>().map_err(|e| ConfigError::Invalid {
                key: ENV_DOWNLOAD_EXPIRATION_HOURS,
                reason: e.to_string(),
            })?;
            config = config.with_download_url_expiration_hours(hours);
        }
        if let Some(bucket) = non_empty(ENV_FILE_BUCKET) {
            config = config.with_bucket(bucket.trim());
        }
        if let Some(flag) = non_empty(ENV_UPLOAD_TOKEN_SINGLE_USE) {
            config = config.with_single_use_upload_tokens(parse_bool(
                ENV_UPLOAD_TOKEN_SINGLE_USE,
                &flag,
            )?);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        for (key, value) in [
            (ENV_SENDER_EMAIL, &self.sender_email),
            (ENV_ACCOUNTANT_EMAIL, &self.accountant_email),
        ] {
            crate::models::require_email(key, value).map_err(|e| ConfigError::Invalid {
                key,
                reason: e.to_string(),
            })?;
        }

        if !self.public_base_url.starts_with("http://")
            && !self.public_base_url.starts_with("https://")
        {
            return Err(ConfigError::Invalid {
                key: ENV_PUBLIC_BASE_URL,
                reason: format!(
                    "must start with http:// or https://, got: {}",
                    self.public_base_url
                ),
            });
        }

        if self.download_url_expiration_hours == 0 {
            return Err(ConfigError::Invalid {
                key: ENV_DOWNLOAD_EXPIRATION_HOURS,
                reason: "must be at least 1".to_string(),
            });
        }
        if self.download_url_expiration_hours > defaults::MAX_DOWNLOAD_URL_EXPIRATION_HOURS {
            return Err(ConfigError::Invalid {
                key: ENV_DOWNLOAD_EXPIRATION_HOURS,
                reason: format!(
                    "must be at most {}, got: {}",
                    defaults::MAX_DOWNLOAD_URL_EXPIRATION_HOURS,
                    self.download_url_expiration_hours
                ),
            });
        }

        if self.bucket.trim().is_empty() {
            return Err(ConfigError::Missing(ENV_FILE_BUCKET));
        }

        Ok(())
    }

    /// Public URL a client visits to upload a file for `token`.
    pub fn upload_url(&self, token: &str) -> String {
        format!("{}{}{}", self.public_base_url, defaults::UPLOAD_PATH, token)
    }

    /// Lifetime applied to every presigned download URL.
    pub fn download_url_ttl(&self) -> Duration {
        Duration::from_secs(self.download_url_expiration_hours.saturating_mul(3600))
    }
}

fn parse_bool(key: &'static str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Invalid {
            key,
            reason: format!("expected a boolean, got: {}", other),
        }),
    }
}
