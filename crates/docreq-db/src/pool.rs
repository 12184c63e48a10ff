//! Postgres pool sizing and construction.

use std::env;
use std::time::{Duration, Instant};

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use docreq_core::config::{ConfigError, ConfigResult};
use docreq_core::{Error, Result};

pub const ENV_MAX_CONNECTIONS: &str = "DATABASE_MAX_CONNECTIONS";
pub const ENV_MIN_CONNECTIONS: &str = "DATABASE_MIN_CONNECTIONS";
pub const ENV_ACQUIRE_TIMEOUT_SECS: &str = "DATABASE_ACQUIRE_TIMEOUT_SECS";

/// Upper bound on pooled connections. Each request touches at most two tables.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// Connections idle longer than this are closed.
const IDLE_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS),
        }
    }
}

impl PoolConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_connections(mut self, n: u32) -> Self {
        self.max_connections = n;
        self
    }

    pub fn min_connections(mut self, n: u32) -> Self {
        self.min_connections = n;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read overrides through `lookup`; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let number = |key: &'static str| -> ConfigResult<Option<u64>> {
            match lookup(key).filter(|v| !v.trim().is_empty()) {
                Some(v) => v.trim().parse::<u64>().map(Some).map_err(|e| {
                    ConfigError::Invalid {
                        key,
                        reason: e.to_string(),
                    }
                }),
                None => Ok(None),
            }
        };
        let count = |key: &'static str| -> ConfigResult<Option<u32>> {
            number(key)?
                .map(|n| {
                    u32::try_from(n).map_err(|e| ConfigError::Invalid {
                        key,
                        reason: e.to_string(),
                    })
                })
                .transpose()
        };

        let mut config = Self::default();
        if let Some(n) = count(ENV_MAX_CONNECTIONS)? {
            config = config.max_connections(n);
        }
        if let Some(n) = count(ENV_MIN_CONNECTIONS)? {
            config = config.min_connections(n);
        }
        if let Some(secs) = number(ENV_ACQUIRE_TIMEOUT_SECS)? {
            config = config.acquire_timeout(Duration::from_secs(secs));
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_connections == 0 {
            return Err(ConfigError::Invalid {
                key: ENV_MAX_CONNECTIONS,
                reason: "must be at least 1".to_string(),
            });
        }
        if self.min_connections > self.max_connections {
            return Err(ConfigError::Invalid {
                key: ENV_MIN_CONNECTIONS,
                reason: format!(
                    "{} exceeds {} ({})",
                    self.min_connections, ENV_MAX_CONNECTIONS, self.max_connections
                ),
            });
        }
        Ok(())
    }
}

pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    create_pool_with_config(database_url, PoolConfig::default()).await
}

pub async fn create_pool_with_config(database_url: &str, config: PoolConfig) -> Result<PgPool> {
    let start = Instant::now();

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(IDLE_TIMEOUT)
        .connect(database_url)
        .await
        .map_err(Error::Database)?;

    info!(
        subsystem = "db",
        component = "pool",
        op = "connect",
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        pool_size = pool.size(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Record store pool ready"
    );
    Ok(pool)
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
    fn test_defaults_when_unset() {
        let config = PoolConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, PoolConfig::default());
        assert_eq!(config.max_connections, DEFAULT_MAX_CONNECTIONS);
    }

    #[test]
    fn test_overrides() {
        let config = PoolConfig::from_lookup(lookup(&[
            (ENV_MAX_CONNECTIONS, "20"),
            (ENV_MIN_CONNECTIONS, "4"),
            (ENV_ACQUIRE_TIMEOUT_SECS, " 5 "),
        ]))
        .unwrap();
        assert_eq!(config.max_connections, 20);
        assert_eq!(config.min_connections, 4);
        assert_eq!(config.acquire_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_rejects_min_above_max() {
        let err = PoolConfig::from_lookup(lookup(&[
            (ENV_MAX_CONNECTIONS, "2"),
            (ENV_MIN_CONNECTIONS, "3"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key, .. } if key == ENV_MIN_CONNECTIONS));
    }

    #[test]
    fn test_rejects_garbage() {
        let err = PoolConfig::from_lookup(lookup(&[(ENV_MAX_CONNECTIONS, "lots")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key, .. } if key == ENV_MAX_CONNECTIONS));
        assert!(PoolConfig::new().max_connections(0).validate().is_err());
    }
}
