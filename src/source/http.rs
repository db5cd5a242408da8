//! The network-backed [`FeedFetcher`].

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use url::Url;

use super::{parse_body, FeedFetcher, FeedItem};
use crate::error::{ConfigError, FetchError};

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    /// Ceiling for a single fetch, so one dead host can't stall a cycle.
    pub timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("rss2epub/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Fetches `http(s)://` feeds with reqwest and reads `file://` feeds from disk.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .gzip(true)
            .build()?;
        Ok(Self { client })
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let parsed = Url::parse(url).map_err(|e| FetchError::Parse(e.to_string()))?;

        match parsed.scheme() {
            "http" | "https" => {
                let response = self.client.get(parsed).send().await?.error_for_status()?;
                Ok(response.bytes().await?.to_vec())
            }
            "file" => {
                let path = parsed
                    .to_file_path()
                    .map_err(|()| FetchError::UnsupportedScheme(url.to_string()))?;
                Ok(tokio::fs::read(path).await?)
            }
            other => Err(FetchError::UnsupportedScheme(other.to_string())),
        }
    }
}

#[async_trait]
impl FeedFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<FeedItem>, FetchError> {
        let body = self.fetch_bytes(url).await?;
        debug!(source = %url, bytes = body.len(), "fetched feed body");
        parse_body(&body)
    }
}
