use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which kind of upstream a source or item belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Rss,
    Reddit,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Rss => "rss",
            SourceType::Reddit => "reddit",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a source lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    Rss { url: String },
    Reddit { subreddit: String },
}

/// One thing to fetch during a refresh cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    pub kind: SourceKind,
    /// Configured display name. For RSS this may be empty, in which case the
    /// feed's own title is used.
    pub name: String,
    pub limit: Option<usize>,
}

impl SourceConfig {
    pub fn rss(url: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::Rss { url: url.into() },
            name: name.into(),
            limit: None,
        }
    }

    pub fn reddit(subreddit: impl Into<String>) -> Self {
        let subreddit = normalize_subreddit(&subreddit.into());
        Self {
            name: format!("r/{}", subreddit),
            kind: SourceKind::Reddit { subreddit },
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// Name to show for this source before anything has been fetched.
    pub fn display_name(&self) -> &str {
        if !self.name.is_empty() {
            return &self.name;
        }
        match &self.kind {
            SourceKind::Rss { url } => url,
            SourceKind::Reddit { subreddit } => subreddit,
        }
    }
}

/// Strip an `r/` or `/r/` prefix and surrounding whitespace from a subreddit name.
pub fn normalize_subreddit(name: &str) -> String {
    let name = name.trim().trim_start_matches('/');
    name.strip_prefix("r/").unwrap_or(name).trim_matches('/').to_string()
}

/// A canonical, display-ready item produced by the normalizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedItem {
    pub id: String,
    pub source_type: SourceType,
    pub source_name: String,
    pub title: String,
    pub summary: String,
    pub full_text: Option<String>,
    pub url: String,
    pub author: Option<String>,
    pub published_at: DateTime<Utc>,
}

/// An entry as parsed out of an RSS/Atom document, before normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RssEntry {
    pub guid: String,
    pub title: Option<String>,
    pub link: Option<String>,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub author: Option<String>,
    pub published: Option<DateTime<Utc>>,
}

/// A post from a subreddit listing, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RedditPost {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub selftext: String,
    #[serde(default)]
    pub permalink: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub created_utc: Option<f64>,
}

/// Source-specific raw shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum RawItem {
    Rss(RssEntry),
    Reddit(RedditPost),
}

/// What an adapter hands back for one source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawBatch {
    /// Title advertised by the upstream document, if any.
    pub feed_title: Option<String>,
    pub items: Vec<RawItem>,
}

impl RawBatch {
    pub fn new(feed_title: Option<String>, items: Vec<RawItem>) -> Self {
        Self { feed_title, items }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn truncate(mut self, limit: Option<usize>) -> Self {
        if let Some(limit) = limit {
            self.items.truncate(limit);
        }
        self
    }
}
