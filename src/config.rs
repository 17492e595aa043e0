use serde::Deserialize;
use std::path::Path;

use crate::model::SourceConfig;
use crate::normalize::DEFAULT_PREVIEW_CHARS;
use crate::source::{DEFAULT_REDDIT_BASE, DEFAULT_TIMEOUT_SECS};
use crate::view::{SourceView, DEFAULT_PAGE_SIZE};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Address the dashboard listens on
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Per-source fetch timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Refresh automatically every N minutes; 0 means only on demand
    #[serde(default)]
    pub auto_refresh_minutes: u64,
    #[serde(default)]
    pub view: ViewConfig,
    #[serde(default)]
    pub filters: FilterConfig,
    #[serde(default)]
    pub feeds: Vec<FeedConfig>,
    #[serde(default)]
    pub reddit: RedditConfig,
}

fn default_listen() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

#[derive(Debug, Deserialize, Clone)]
pub struct ViewConfig {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
    #[serde(default)]
    pub default_source: SourceView,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            preview_chars: default_preview_chars(),
            default_source: SourceView::default(),
        }
    }
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_preview_chars() -> usize {
    DEFAULT_PREVIEW_CHARS
}

#[derive(Debug, Deserialize, Clone)]
pub struct FilterConfig {
    /// Drop items older than this many days; 0 disables the check
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
    #[serde(default)]
    pub include_keywords: Vec<String>,
    #[serde(default)]
    pub exclude_keywords: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            lookback_days: default_lookback_days(),
            include_keywords: Vec::new(),
            exclude_keywords: Vec::new(),
        }
    }
}

fn default_lookback_days() -> u32 {
    7
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeedConfig {
    /// Display name; the feed's own title is used when absent
    #[serde(default)]
    pub name: Option<String>,
    pub url: String,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedditConfig {
    #[serde(default)]
    pub subreddits: Vec<String>,
    /// Posts per subreddit (capped at 100 by the listing API)
    #[serde(default = "default_reddit_limit")]
    pub limit: usize,
    #[serde(default = "default_reddit_base")]
    pub base_url: String,
}

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            subreddits: Vec::new(),
            limit: default_reddit_limit(),
            base_url: default_reddit_base(),
        }
    }
}

fn default_reddit_limit() -> usize {
    100
}

fn default_reddit_base() -> String {
    DEFAULT_REDDIT_BASE.to_string()
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse config from a TOML string (useful for testing)
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.timeout_secs == 0 {
            anyhow::bail!("timeout_secs must be greater than zero");
        }
        if self.view.page_size == 0 {
            anyhow::bail!("view.page_size must be greater than zero");
        }
        if let Some(feed) = self.feeds.iter().find(|f| f.url.trim().is_empty()) {
            anyhow::bail!("feed {:?} has an empty url", feed.name);
        }
        Ok(())
    }

    /// Every configured source, feeds first, in configuration order.
    pub fn sources(&self) -> Vec<SourceConfig> {
        let feeds = self.feeds.iter().map(|feed| {
            SourceConfig::rss(feed.url.trim(), feed.name.clone().unwrap_or_default())
                .with_limit(feed.limit)
        });

        let subreddits = self
            .reddit
            .subreddits
            .iter()
            .filter(|s| !s.trim().is_empty())
            .map(|s| SourceConfig::reddit(s.as_str()).with_limit(Some(self.reddit.limit)));

        feeds.chain(subreddits).collect()
    }

    /// Subreddit names as the view knows them (prefix stripped).
    pub fn subreddit_names(&self) -> Vec<String> {
        self.reddit
            .subreddits
            .iter()
            .map(|s| crate::model::normalize_subreddit(s))
            .filter(|s| !s.is_empty())
            .collect()
    }
}
