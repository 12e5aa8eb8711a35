//! Network boundary of the query cache.
//!
//! The cache only knows keys and JSON values. A [`Fetcher`] turns a key
//! (`/api/mentions?range=7d&limit=50`) into the backend's JSON response.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value as JsonValue;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use vantage_core::{Error, Result};

/// Resolves a cache key to JSON.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, key: &str) -> Result<JsonValue>;
}

/// Fetcher issuing `GET <base_url><key>` against the dashboard backend.
pub struct HttpFetcher {
    client: Client,
    base_url: String,
}

impl HttpFetcher {
    /// Create a fetcher for `base_url` with a per-request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(Error::Config(format!(
                "API base URL must start with http:// or https://, got: {}",
                base_url
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a cache key.
    pub fn url_for(&self, key: &str) -> String {
        if key.starts_with('/') {
            format!("{}{}", self.base_url, key)
        } else {
            format!("{}/{}", self.base_url, key)
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, key: &str) -> Result<JsonValue> {
        let url = self.url_for(key);
        let start = Instant::now();

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::CACHE_CONTROL, "no-store")
            .send()
            .await
            .map_err(|e| Error::Request(format!("Failed to fetch {}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            warn!(
                subsystem = "query",
                component = "http_fetcher",
                cache_key = key,
                status = status.as_u16(),
                "Backend returned error status"
            );
            return Err(Error::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        let body: JsonValue = response
            .json()
            .await
            .map_err(|e| Error::Serialization(format!("Failed to parse response from {}: {}", url, e)))?;

        debug!(
            subsystem = "query",
            component = "http_fetcher",
            cache_key = key,
            status = status.as_u16(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Fetched"
        );
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_http_base_url() {
        let err = HttpFetcher::new("localhost:8000", Duration::from_secs(1))
            .err()
            .unwrap();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_url_for_joins_cleanly() {
        let fetcher = HttpFetcher::new("http://api.local/", Duration::from_secs(1)).unwrap();
        assert_eq!(fetcher.base_url(), "http://api.local");
        assert_eq!(
            fetcher.url_for("/api/mentions?range=7d"),
            "http://api.local/api/mentions?range=7d"
        );
        assert_eq!(fetcher.url_for("api/alerts"), "http://api.local/api/alerts");
    }
}
