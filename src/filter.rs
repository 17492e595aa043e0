use chrono::{DateTime, Duration, Utc};

use crate::config::FilterConfig;
use crate::model::FeedItem;

/// Recency and keyword filters applied to normalized items.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemFilter {
    lookback_days: u32,
    include: Vec<String>,
    exclude: Vec<String>,
}

impl ItemFilter {
    pub fn new(lookback_days: u32, include: &[String], exclude: &[String]) -> Self {
        Self {
            lookback_days,
            include: lowercase_keywords(include),
            exclude: lowercase_keywords(exclude),
        }
    }

    pub fn from_config(config: &FilterConfig) -> Self {
        Self::new(
            config.lookback_days,
            &config.include_keywords,
            &config.exclude_keywords,
        )
    }

    pub fn lookback_days(&self) -> u32 {
        self.lookback_days
    }

    pub fn include_keywords(&self) -> &[String] {
        &self.include
    }

    pub fn exclude_keywords(&self) -> &[String] {
        &self.exclude
    }

    /// A lookback of zero days disables the recency check.
    pub fn is_recent(&self, published_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        if self.lookback_days == 0 {
            return true;
        }
        published_at >= now - Duration::days(i64::from(self.lookback_days))
    }

    pub fn matches_keywords(&self, item: &FeedItem) -> bool {
        if self.include.is_empty() && self.exclude.is_empty() {
            return true;
        }

        let body = item.full_text.as_deref().unwrap_or(&item.summary);
        let haystack = format!("{}\n{}", item.title, body).to_lowercase();

        if !self.include.is_empty() && !self.include.iter().any(|k| haystack.contains(k)) {
            return false;
        }
        !self.exclude.iter().any(|k| haystack.contains(k))
    }

    pub fn keep(&self, item: &FeedItem, now: DateTime<Utc>) -> bool {
        self.is_recent(item.published_at, now) && self.matches_keywords(item)
    }

    pub fn apply(&self, items: Vec<FeedItem>, now: DateTime<Utc>) -> Vec<FeedItem> {
        items.into_iter().filter(|item| self.keep(item, now)).collect()
    }
}

/// Split a comma-separated keyword list as typed into the filter form.
pub fn split_keywords(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(String::from)
        .collect()
}

fn lowercase_keywords(keywords: &[String]) -> Vec<String> {
    keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect()
}
