//! Mail backend configuration.
//!
//! ```rust,no_run
//! use docreq_mail::config::MailConfig;
//! use docreq_mail::build_sender;
//!
//! let config = MailConfig::from_env().expect("invalid mail configuration");
//! let sender = build_sender(&config).expect("failed to build mail sender");
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use docreq_core::defaults;

pub const ENV_MAIL_BACKEND: &str = "MAIL_BACKEND";
pub const ENV_MAIL_API_URL: &str = "MAIL_API_URL";
pub const ENV_MAIL_API_KEY: &str = "MAIL_API_KEY";
pub const ENV_MAIL_TIMEOUT_SECS: &str = "MAIL_TIMEOUT_SECS";

/// Mail configuration errors.
#[derive(Debug, Error)]
pub enum MailConfigError {
    #[error("Invalid mail backend: {0}")]
    InvalidBackend(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

pub type MailConfigResult<T> = Result<T, MailConfigError>;

/// Which [`docreq_core::MailSender`] implementation to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MailBackend {
    /// Deliver through an HTTP mail API.
    Http,
    /// Log the email instead of sending it.
    #[default]
    Log,
}

impl MailBackend {
    /// Whether sends through this backend reach a real inbox.
    pub fn delivers(&self) -> bool {
        matches!(self, MailBackend::Http)
    }
}

impl FromStr for MailBackend {
    type Err = MailConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "log" => Ok(Self::Log),
            _ => Err(MailConfigError::InvalidBackend(s.to_string())),
        }
    }
}

impl fmt::Display for MailBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http => write!(f, "http"),
            Self::Log => write!(f, "log"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub backend: MailBackend,
    /// Endpoint that accepts `{from, to, subject, text}` JSON.
    pub api_url: Option<String>,
    /// Sent as a bearer token when present.
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            backend: MailBackend::Log,
            api_url: None,
            api_key: None,
            timeout: Duration::from_secs(defaults::MAIL_TIMEOUT_SECS),
        }
    }
}

impl MailConfig {
    /// Configuration for the HTTP backend pointed at `api_url`.
    pub fn http(api_url: impl Into<String>) -> Self {
        Self {
            backend: MailBackend::Http,
            api_url: Some(api_url.into()),
            ..Self::default()
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn from_env() -> MailConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> MailConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let backend = match get(ENV_MAIL_BACKEND) {
            Some(v) => v.parse()?,
            None => MailBackend::default(),
        };

        let timeout = match get(ENV_MAIL_TIMEOUT_SECS) {
            Some(v) => {
                let secs: u64 = v.trim().parse().map_err(|_| {
                    MailConfigError::Validation(format!(
                        "{} must be a whole number of seconds, got: {}",
                        ENV_MAIL_TIMEOUT_SECS, v
                    ))
                })?;
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(defaults::MAIL_TIMEOUT_SECS),
        };

        let config = Self {
            backend,
            api_url: get(ENV_MAIL_API_URL),
            api_key: get(ENV_MAIL_API_KEY),
            timeout,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> MailConfigResult<()> {
        if self.timeout.is_zero() {
            return Err(MailConfigError::Validation(
                "mail timeout must be greater than zero".to_string(),
            ));
        }
        if self.backend == MailBackend::Http {
            let url = self.api_url.as_deref().unwrap_or_default();
            if url.is_empty() {
                return Err(MailConfigError::Validation(format!(
                    "{} is required when {}=http",
                    ENV_MAIL_API_URL, ENV_MAIL_BACKEND
                )));
            }
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(MailConfigError::Validation(format!(
                    "{} must start with http:// or https://, got: {}",
                    ENV_MAIL_API_URL, url
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_to_log_backend() {
        let config = MailConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.backend, MailBackend::Log);
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert!(config.api_url.is_none());
    }

    #[test]
    fn test_http_backend_from_lookup() {
        let config = MailConfig::from_lookup(lookup(&[
            (ENV_MAIL_BACKEND, "HTTP"),
            (ENV_MAIL_API_URL, "https://mail.example.com/send"),
            (ENV_MAIL_API_KEY, "k"),
            (ENV_MAIL_TIMEOUT_SECS, "3"),
        ]))
        .unwrap();
        assert_eq!(config.backend, MailBackend::Http);
        assert_eq!(config.api_key.as_deref(), Some("k"));
        assert_eq!(config.timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_http_backend_requires_url() {
        let err = MailConfig::from_lookup(lookup(&[(ENV_MAIL_BACKEND, "http")])).unwrap_err();
        assert!(matches!(err, MailConfigError::Validation(_)));

        let err = MailConfig::from_lookup(lookup(&[
            (ENV_MAIL_BACKEND, "http"),
            (ENV_MAIL_API_URL, "mail.example.com"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("http://"));
    }

    #[test]
    fn test_invalid_backend_and_timeout() {
        assert!(matches!(
            MailConfig::from_lookup(lookup(&[(ENV_MAIL_BACKEND, "smtp")])),
            Err(MailConfigError::InvalidBackend(_))
        ));
        assert!(MailConfig::from_lookup(lookup(&[(ENV_MAIL_TIMEOUT_SECS, "soon")])).is_err());
        assert!(MailConfig::from_lookup(lookup(&[(ENV_MAIL_TIMEOUT_SECS, "0")])).is_err());
    }

    #[test]
    fn test_backend_display_round_trip() {
        for backend in [MailBackend::Http, MailBackend::Log] {
            assert_eq!(backend.to_string().parse::<MailBackend>().unwrap(), backend);
        }
    }
}
