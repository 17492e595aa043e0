//! One refresh: fetch every source concurrently, normalize, filter, aggregate.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::aggregate::aggregate;
use crate::error::FetchError;
use crate::filter::ItemFilter;
use crate::model::{FeedItem, RawBatch, SourceConfig};
use crate::normalize::Normalizer;
use crate::source::SourceAdapter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFailure {
    pub source_name: String,
    pub error: FetchError,
}

/// How a refresh went overall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshHealth {
    /// Every source answered (possibly with nothing new).
    Complete,
    /// Some sources failed, at least one succeeded.
    Partial,
    /// Every attempted source failed.
    Failed,
}

#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    pub items: Vec<FeedItem>,
    pub failures: Vec<SourceFailure>,
    pub attempted: usize,
    pub fetched_at: DateTime<Utc>,
}

impl RefreshOutcome {
    pub fn health(&self) -> RefreshHealth {
        if self.failures.is_empty() {
            RefreshHealth::Complete
        } else if self.failures.len() >= self.attempted {
            RefreshHealth::Failed
        } else {
            RefreshHealth::Partial
        }
    }

    /// Human-readable list of what failed, e.g. `r/rust (not found error: ...)`.
    pub fn failure_summary(&self) -> String {
        self.failures
            .iter()
            .map(|f| format!("{} ({})", f.source_name, f.error))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

pub struct Pipeline {
    adapter: Arc<dyn SourceAdapter>,
    normalizer: Normalizer,
    timeout: Duration,
}

impl Pipeline {
    pub fn new(
        adapter: Arc<dyn SourceAdapter>,
        normalizer: Normalizer,
        timeout: Duration,
    ) -> Self {
        Self {
            adapter,
            normalizer,
            timeout,
        }
    }

    pub async fn run(&self, sources: &[SourceConfig], filter: &ItemFilter) -> RefreshOutcome {
        self.run_at(sources, filter, Utc::now()).await
    }

    /// Run with an explicit fetch time, which stands in for missing dates
    /// and anchors the lookback window.
    pub async fn run_at(
        &self,
        sources: &[SourceConfig],
        filter: &ItemFilter,
        now: DateTime<Utc>,
    ) -> RefreshOutcome {
        info!("Refreshing {} sources", sources.len());

        let mut handles = Vec::with_capacity(sources.len());
        for source in sources {
            let adapter = self.adapter.clone();
            let source = source.clone();
            let timeout = self.timeout;

            handles.push(tokio::spawn(async move {
                match tokio::time::timeout(timeout, adapter.fetch(&source)).await {
                    Ok(result) => result,
                    Err(_) => Err(FetchError::timeout(timeout.as_secs())),
                }
            }));
        }

        // Awaiting in configuration order keeps insertion order stable no
        // matter which fetch finishes first.
        let mut batches = Vec::with_capacity(sources.len());
        let mut failures = Vec::new();
        for (source, handle) in sources.iter().zip(handles) {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    error!("Fetch task for '{}' failed: {}", source.display_name(), e);
                    Err(FetchError::network(format!("fetch task failed: {}", e)))
                }
            };

            match result {
                Ok(batch) => batches.push(self.process(source, batch, filter, now)),
                Err(e) => {
                    warn!("Failed to fetch '{}': {}", source.display_name(), e);
                    failures.push(SourceFailure {
                        source_name: source.display_name().to_string(),
                        error: e,
                    });
                }
            }
        }

        let items = aggregate(batches);
        info!(
            "Refresh complete: {} items, {} of {} sources failed",
            items.len(),
            failures.len(),
            sources.len()
        );

        RefreshOutcome {
            items,
            failures,
            attempted: sources.len(),
            fetched_at: now,
        }
    }

    /// Normalize and filter one source's batch.
    pub fn process(
        &self,
        source: &SourceConfig,
        batch: RawBatch,
        filter: &ItemFilter,
        now: DateTime<Utc>,
    ) -> Vec<FeedItem> {
        let source_name = if source.name.is_empty() {
            batch
                .feed_title
                .clone()
                .unwrap_or_else(|| source.display_name().to_string())
        } else {
            source.name.clone()
        };

        let items = batch
            .items
            .iter()
            .map(|raw| self.normalizer.normalize(raw, &source_name, now))
            .collect();

        filter.apply(items, now)
    }
}
