//! Runtime configuration for the `vantage` binary.
//!
//! Values come from environment variables (a `.env` file is loaded first)
//! and can be overridden by command-line flags.

use std::env;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use vantage_core::defaults;
use vantage_query::{CacheConfig, HttpFetcher};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value}")]
    InvalidValue { var: &'static str, value: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Failed to create HTTP fetcher: {0}")]
    Fetcher(#[from] vantage_core::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

pub const ENV_API_URL: &str = "VANTAGE_API_URL";
pub const ENV_STATE_FILE: &str = "VANTAGE_STATE_FILE";
pub const ENV_CACHE_CAPACITY: &str = "VANTAGE_CACHE_CAPACITY";
pub const ENV_DEDUPE_INTERVAL_MS: &str = "VANTAGE_DEDUPE_INTERVAL_MS";
pub const ENV_HTTP_TIMEOUT_SECS: &str = "VANTAGE_HTTP_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardConfig {
    /// Base URL of the dashboard backend.
    pub api_url: String,
    /// JSON file backing the durable filter slot.
    pub state_file: PathBuf,
    pub cache_capacity: usize,
    pub dedupe_interval_ms: u64,
    pub http_timeout_secs: u64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_url: defaults::API_URL.to_string(),
            state_file: PathBuf::from(".").join(defaults::STATE_FILE),
            cache_capacity: defaults::CACHE_CAPACITY,
            dedupe_interval_ms: defaults::DEDUPE_INTERVAL_MS,
            http_timeout_secs: defaults::HTTP_TIMEOUT_SECS,
        }
    }
}

impl DashboardConfig {
    /// Load from process environment variables.
    ///
    /// Reads:
    /// - `VANTAGE_API_URL` (default: http://localhost:8000)
    /// - `VANTAGE_STATE_FILE` (default: ./vantage-state.json)
    /// - `VANTAGE_CACHE_CAPACITY` (default: 256)
    /// - `VANTAGE_DEDUPE_INTERVAL_MS` (default: 2000)
    /// - `VANTAGE_HTTP_TIMEOUT_SECS` (default: 30)
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Load using `lookup` in place of the process environment.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_API_URL) {
            config.api_url = url;
        }
        if let Some(path) = lookup(ENV_STATE_FILE) {
            config.state_file = PathBuf::from(path);
        }
        if let Some(v) = parse_var(&lookup, ENV_CACHE_CAPACITY)? {
            config.cache_capacity = v;
        }
        if let Some(v) = parse_var(&lookup, ENV_DEDUPE_INTERVAL_MS)? {
            config.dedupe_interval_ms = v;
        }
        if let Some(v) = parse_var(&lookup, ENV_HTTP_TIMEOUT_SECS)? {
            config.http_timeout_secs = v;
        }

        debug!(
            api_url = %config.api_url,
            state_file = %config.state_file.display(),
            cache_capacity = config.cache_capacity,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.api_url.is_empty() {
            return Err(ConfigError::Validation(
                "API URL cannot be empty".to_string(),
            ));
        }

        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            return Err(ConfigError::Validation(format!(
                "API URL must start with http:// or https://, got: {}",
                self.api_url
            )));
        }

        if self.cache_capacity == 0 {
            return Err(ConfigError::Validation(
                "Cache capacity must be greater than 0".to_string(),
            ));
        }

        if self.http_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "HTTP timeout must be greater than 0".to_string(),
            ));
        }

        if self.state_file.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "State file path cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            capacity: NonZeroUsize::new(self.cache_capacity).unwrap_or(NonZeroUsize::MIN),
            dedupe_interval: Duration::from_millis(self.dedupe_interval_ms),
            ..CacheConfig::default()
        }
    }

    pub fn http_fetcher(&self) -> ConfigResult<HttpFetcher> {
        Ok(HttpFetcher::new(
            self.api_url.as_str(),
            Duration::from_secs(self.http_timeout_secs),
        )?)
    }
}

fn parse_var<T, F>(lookup: &F, var: &'static str) -> ConfigResult<Option<T>>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { var, value: raw }),
    }
}
