//! Store configuration.
//!
//! # Responsibility
//! - Describe how to reach the backing store and how hard to try.
//! - Load overrides from `DEVICE_STORE_*` environment variables.
//!
//! # Invariants
//! - Every field has a default, so an empty environment yields a usable
//!   configuration.

use crate::db::RetryPolicy;
use serde::Deserialize;
use std::str::FromStr;
use thiserror::Error;

pub const ENV_DRIVER: &str = "DEVICE_STORE_DRIVER";
pub const ENV_URL: &str = "DEVICE_STORE_URL";
pub const ENV_POOL_SIZE: &str = "DEVICE_STORE_POOL_SIZE";
pub const ENV_BUSY_TIMEOUT_MS: &str = "DEVICE_STORE_BUSY_TIMEOUT_MS";
pub const ENV_CONNECTION_TIMEOUT_MS: &str = "DEVICE_STORE_CONNECTION_TIMEOUT_MS";
pub const ENV_MAX_ATTEMPTS: &str = "DEVICE_STORE_MAX_ATTEMPTS";
pub const ENV_BACKOFF_UNIT_MS: &str = "DEVICE_STORE_BACKOFF_UNIT_MS";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value `{value}` for {key}: {message}")]
    InvalidValue {
        key: &'static str,
        value: String,
        message: String,
    },
}

/// Connection, pool and retry settings for [`crate::db::open_store_with`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Backing-store kind; only `sqlite` is supported.
    pub driver: String,
    /// Database file path, or `:memory:`.
    pub connection_string: String,
    pub pool_size: u32,
    pub busy_timeout_ms: u32,
    /// Upper bound on waiting for a pooled connection; `0` is treated as 1ms.
    pub connection_timeout_ms: u64,
    pub retry: RetryPolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            driver: "sqlite".to_string(),
            connection_string: "device_store.sqlite3".to_string(),
            pool_size: 16,
            busy_timeout_ms: 30_000,
            connection_timeout_ms: 5_000,
            retry: RetryPolicy::default(),
        }
    }
}

impl StoreConfig {
    /// Builds a configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from defaults overridden by `lookup`.
    ///
    /// Blank values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value_of = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut config = Self::default();

        if let Some(driver) = value_of(ENV_DRIVER) {
            config.driver = driver.trim().to_string();
        }
        if let Some(url) = value_of(ENV_URL) {
            config.connection_string = url;
        }
        if let Some(value) = value_of(ENV_POOL_SIZE) {
            config.pool_size = parse_value(ENV_POOL_SIZE, &value)?;
        }
        if let Some(value) = value_of(ENV_BUSY_TIMEOUT_MS) {
            config.busy_timeout_ms = parse_value(ENV_BUSY_TIMEOUT_MS, &value)?;
        }
        if let Some(value) = value_of(ENV_CONNECTION_TIMEOUT_MS) {
            config.connection_timeout_ms = parse_value(ENV_CONNECTION_TIMEOUT_MS, &value)?;
            if config.connection_timeout_ms == 0 {
                return Err(ConfigError::InvalidValue {
                    key: ENV_CONNECTION_TIMEOUT_MS,
                    value,
                    message: "connection timeout must be positive".to_string(),
                });
            }
        }
        if let Some(value) = value_of(ENV_MAX_ATTEMPTS) {
            config.retry.max_attempts = parse_value(ENV_MAX_ATTEMPTS, &value)?;
        }
        if let Some(value) = value_of(ENV_BACKOFF_UNIT_MS) {
            config.retry.backoff_unit_ms = parse_value(ENV_BACKOFF_UNIT_MS, &value)?;
        }

        Ok(config)
    }
}

fn parse_value<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|err| ConfigError::InvalidValue {
            key,
            value: value.to_string(),
            message: err.to_string(),
        })
}
