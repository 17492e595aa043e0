//! Source adapters: turn a [`SourceConfig`] into raw items.
//!
//! [`HttpAdapter`] is the production adapter. It dispatches on the source
//! kind to [`rss`] or [`reddit`], each of which exposes a pure `parse_*`
//! function so parsing can be tested without a network.

pub mod reddit;
pub mod rss;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::FetchError;
use crate::model::{RawBatch, SourceConfig, SourceKind};

pub const DEFAULT_TIMEOUT_SECS: u64 = 20;
pub const DEFAULT_REDDIT_BASE: &str = "https://www.reddit.com";

const USER_AGENT: &str = "MorningFeed/1.0 (feed dashboard)";

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    async fn fetch(&self, source: &SourceConfig) -> Result<RawBatch, FetchError>;
}

pub struct HttpAdapter {
    client: Client,
    reddit_base: String,
}

impl HttpAdapter {
    pub fn new(timeout: Duration, reddit_base: impl Into<String>) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FetchError::network(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            reddit_base: reddit_base.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl SourceAdapter for HttpAdapter {
    async fn fetch(&self, source: &SourceConfig) -> Result<RawBatch, FetchError> {
        let batch = match &source.kind {
            SourceKind::Rss { url } => rss::fetch(&self.client, url).await?,
            SourceKind::Reddit { subreddit } => {
                reddit::fetch(&self.client, &self.reddit_base, subreddit, source.limit).await?
            }
        };
        Ok(batch.truncate(source.limit))
    }
}

/// Read a response body, mapping non-success statuses to errors.
async fn read_body(client: &Client, url: &str) -> Result<Vec<u8>, FetchError> {
    let response = client.get(url).send().await?;

    if !response.status().is_success() {
        return Err(FetchError::from_status(response.status(), url));
    }

    let bytes = response.bytes().await?;
    Ok(bytes.to_vec())
}

fn is_blank(body: &[u8]) -> bool {
    body.iter().all(|b| b.is_ascii_whitespace())
}
