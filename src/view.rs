//! Selection state and what the dashboard shows.
//!
//! [`ViewState`] is a plain value: every transition consumes the old state
//! and returns the new one. [`ViewController`] owns the current state behind
//! a lock and is the only thing that runs the pipeline.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::filter::ItemFilter;
use crate::model::{normalize_subreddit, FeedItem, SourceConfig, SourceType};
use crate::normalize::Normalizer;
use crate::pipeline::{Pipeline, RefreshHealth, RefreshOutcome};
use crate::source::HttpAdapter;

pub const DEFAULT_PAGE_SIZE: usize = 25;

/// Which slice of the aggregate the user is looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceView {
    #[default]
    All,
    Rss,
    Reddit,
}

impl SourceView {
    pub const ALL: [SourceView; 3] = [SourceView::All, SourceView::Rss, SourceView::Reddit];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceView::All => "all",
            SourceView::Rss => "rss",
            SourceView::Reddit => "reddit",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SourceView::All => "All",
            SourceView::Rss => "Feeds",
            SourceView::Reddit => "Reddit",
        }
    }

    /// Unknown names fall back to [`SourceView::All`].
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "rss" | "feeds" => SourceView::Rss,
            "reddit" => SourceView::Reddit,
            _ => SourceView::All,
        }
    }

    pub fn includes(&self, source_type: SourceType) -> bool {
        match self {
            SourceView::All => true,
            SourceView::Rss => source_type == SourceType::Rss,
            SourceView::Reddit => source_type == SourceType::Reddit,
        }
    }
}

impl fmt::Display for SourceView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Some sources failed; what did load is shown.
    Partial,
    /// Every source failed; the previous result (if any) is still shown.
    Total,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastError {
    pub severity: ErrorSeverity,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Result of the last refresh that was applied.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub items: Arc<Vec<FeedItem>>,
    pub fetched_at: DateTime<Utc>,
    pub request: u64,
}

impl Snapshot {
    fn new(outcome: RefreshOutcome, ticket: RefreshTicket) -> Self {
        Self {
            items: Arc::new(outcome.items),
            fetched_at: outcome.fetched_at,
            request: ticket.0,
        }
    }
}

/// Handed out by [`ViewState::begin_refresh`]; only the newest ticket's
/// outcome is ever applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshTicket(u64);

impl RefreshTicket {
    pub fn sequence(&self) -> u64 {
        self.0
    }
}

/// One page of visible items.
#[derive(Debug, Clone)]
pub struct Page<'a> {
    pub items: Vec<&'a FeedItem>,
    pub offset: usize,
    pub next_offset: usize,
    pub total: usize,
    pub has_more: bool,
}

#[derive(Debug, Clone)]
pub struct ViewState {
    source: SourceView,
    subreddit: Option<String>,
    subreddits: Vec<String>,
    page_size: usize,
    filter: ItemFilter,
    source_names: Vec<String>,
    disabled: BTreeSet<String>,
    snapshot: Option<Snapshot>,
    last_error: Option<LastError>,
    issued: u64,
    applied: u64,
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE, Vec::new(), SourceView::All)
    }
}

impl ViewState {
    pub fn new(page_size: usize, subreddits: Vec<String>, source: SourceView) -> Self {
        Self {
            source,
            subreddit: None,
            subreddits,
            page_size: page_size.max(1),
            filter: ItemFilter::default(),
            source_names: Vec::new(),
            disabled: BTreeSet::new(),
            snapshot: None,
            last_error: None,
            issued: 0,
            applied: 0,
        }
    }

    pub fn with_filter(mut self, filter: ItemFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Names of the configured sources, all enabled.
    pub fn with_source_names(mut self, names: Vec<String>) -> Self {
        self.source_names = names;
        self.disabled.clear();
        self
    }

    // -- transitions ---------------------------------------------------------

    pub fn select_source(mut self, source: SourceView) -> Self {
        self.source = source;
        self
    }

    /// Select a subreddit by name. `"all"`, blank, or a subreddit that is not
    /// configured all mean "every subreddit".
    pub fn select_subreddit(mut self, name: &str) -> Self {
        let wanted = normalize_subreddit(name);
        self.subreddit = self
            .subreddits
            .iter()
            .find(|s| s.eq_ignore_ascii_case(&wanted))
            .cloned();
        self
    }

    /// Replace the filter and the set of enabled sources. Names that are not
    /// configured are ignored. Takes effect on the next refresh.
    pub fn update_filters(mut self, filter: ItemFilter, enabled: &[String]) -> Self {
        self.filter = filter;
        self.disabled = self
            .source_names
            .iter()
            .filter(|name| !enabled.contains(name))
            .cloned()
            .collect();
        self
    }

    pub fn begin_refresh(mut self) -> (Self, RefreshTicket) {
        self.issued += 1;
        let ticket = RefreshTicket(self.issued);
        (self, ticket)
    }

    /// Apply a finished refresh. Outcomes for superseded tickets are dropped.
    pub fn complete_refresh(mut self, ticket: RefreshTicket, outcome: RefreshOutcome) -> Self {
        if !self.is_current(ticket) {
            return self;
        }
        self.applied = ticket.0;

        let health = outcome.health();
        let summary = outcome.failure_summary();
        let failed = outcome.failures.len();
        let attempted = outcome.attempted;
        let at = outcome.fetched_at;

        match health {
            RefreshHealth::Complete => {
                self.snapshot = Some(Snapshot::new(outcome, ticket));
                self.last_error = None;
            }
            RefreshHealth::Partial => {
                self.snapshot = Some(Snapshot::new(outcome, ticket));
                self.last_error = Some(LastError {
                    severity: ErrorSeverity::Partial,
                    message: format!(
                        "Partial failure: {} of {} sources failed: {}",
                        failed, attempted, summary
                    ),
                    at,
                });
            }
            RefreshHealth::Failed => {
                // Stale-but-available: keep whatever was shown before.
                self.last_error = Some(LastError {
                    severity: ErrorSeverity::Total,
                    message: format!(
                        "Total failure: all {} sources failed: {}",
                        attempted, summary
                    ),
                    at,
                });
            }
        }
        self
    }

    // -- queries -------------------------------------------------------------

    pub fn is_current(&self, ticket: RefreshTicket) -> bool {
        ticket.0 == self.issued && ticket.0 > self.applied
    }

    pub fn is_refreshing(&self) -> bool {
        self.issued > self.applied
    }

    pub fn source(&self) -> SourceView {
        self.source
    }

    pub fn subreddit(&self) -> Option<&str> {
        self.subreddit.as_deref()
    }

    pub fn subreddits(&self) -> &[String] {
        &self.subreddits
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn filter(&self) -> &ItemFilter {
        &self.filter
    }

    pub fn source_names(&self) -> &[String] {
        &self.source_names
    }

    pub fn is_enabled(&self, source_name: &str) -> bool {
        !self.disabled.contains(source_name)
    }

    pub fn last_error(&self) -> Option<&LastError> {
        self.last_error.as_ref()
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    pub fn has_loaded(&self) -> bool {
        self.snapshot.is_some()
    }

    fn shows(&self, item: &FeedItem) -> bool {
        if !self.source.includes(item.source_type) {
            return false;
        }
        match (&self.source, &self.subreddit) {
            (SourceView::Reddit, Some(sub)) => {
                item.source_name.eq_ignore_ascii_case(&format!("r/{}", sub))
            }
            _ => true,
        }
    }

    /// Items matching the current selection, in aggregate order.
    pub fn visible_items(&self) -> Vec<&FeedItem> {
        match &self.snapshot {
            Some(snapshot) => snapshot.items.iter().filter(|i| self.shows(i)).collect(),
            None => Vec::new(),
        }
    }

    pub fn page(&self, offset: usize) -> Page<'_> {
        let visible = self.visible_items();
        let total = visible.len();
        let start = offset.min(total);
        let end = (start + self.page_size).min(total);

        Page {
            items: visible[start..end].to_vec(),
            offset: start,
            next_offset: end,
            total,
            has_more: end < total,
        }
    }
}

pub struct ViewController {
    state: RwLock<ViewState>,
    pipeline: Pipeline,
    sources: Vec<SourceConfig>,
}

impl ViewController {
    pub fn new(pipeline: Pipeline, sources: Vec<SourceConfig>, initial: ViewState) -> Self {
        let names = sources.iter().map(|s| s.display_name().to_string()).collect();
        Self {
            state: RwLock::new(initial.with_source_names(names)),
            pipeline,
            sources,
        }
    }

    /// Wire up the HTTP adapter and pipeline described by `config`.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let adapter = HttpAdapter::new(timeout, config.reddit.base_url.as_str())?;
        let pipeline = Pipeline::new(
            Arc::new(adapter),
            Normalizer::new(config.view.preview_chars),
            timeout,
        );
        let initial = ViewState::new(
            config.view.page_size,
            config.subreddit_names(),
            config.view.default_source,
        )
        .with_filter(ItemFilter::from_config(&config.filters));
        Ok(Self::new(pipeline, config.sources(), initial))
    }

    /// A copy of the current state for rendering.
    pub async fn state(&self) -> ViewState {
        self.state.read().await.clone()
    }

    pub async fn is_refreshing(&self) -> bool {
        self.state.read().await.is_refreshing()
    }

    pub async fn select_source(&self, source: SourceView) -> ViewState {
        let mut state = self.state.write().await;
        *state = std::mem::take(&mut *state).select_source(source);
        state.clone()
    }

    pub async fn select_subreddit(&self, name: &str) -> ViewState {
        let mut state = self.state.write().await;
        *state = std::mem::take(&mut *state).select_subreddit(name);
        state.clone()
    }

    pub async fn update_filters(&self, filter: ItemFilter, enabled: &[String]) -> ViewState {
        let mut state = self.state.write().await;
        *state = std::mem::take(&mut *state).update_filters(filter, enabled);
        state.clone()
    }

    /// Run the pipeline and apply its result unless a newer refresh was
    /// started in the meantime. Returns whether the result was applied.
    pub async fn refresh(&self) -> bool {
        let (ticket, filter, sources) = {
            let mut state = self.state.write().await;
            let (next, ticket) = std::mem::take(&mut *state).begin_refresh();
            *state = next;
            let sources: Vec<SourceConfig> = self
                .sources
                .iter()
                .filter(|s| state.is_enabled(s.display_name()))
                .cloned()
                .collect();
            (ticket, state.filter().clone(), sources)
        };
        debug!(
            "Starting refresh #{} over {} of {} sources",
            ticket.sequence(),
            sources.len(),
            self.sources.len()
        );

        let outcome = self.pipeline.run(&sources, &filter).await;
        let health = outcome.health();

        let mut state = self.state.write().await;
        if !state.is_current(ticket) {
            info!(
                "Discarding result of refresh #{}, superseded by a newer refresh",
                ticket.sequence()
            );
            return false;
        }
        *state = std::mem::take(&mut *state).complete_refresh(ticket, outcome);

        match health {
            RefreshHealth::Complete => {}
            RefreshHealth::Partial => warn!("Refresh #{} partially failed", ticket.sequence()),
            RefreshHealth::Failed => warn!(
                "Refresh #{} failed for every source, keeping previous items",
                ticket.sequence()
            ),
        }
        true
    }
}

/// Refresh on a fixed interval, on top of manual refreshes.
pub async fn start_auto_refresh(controller: Arc<ViewController>, interval_minutes: u64) {
    if interval_minutes == 0 {
        return;
    }
    let interval = Duration::from_secs(interval_minutes * 60);

    loop {
        tokio::time::sleep(interval).await;
        info!("Starting scheduled refresh");
        controller.refresh().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::pipeline::SourceFailure;
    use chrono::{Duration as ChronoDuration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 1, 9, 0, 0).unwrap()
    }

    fn make_item(id: &str, source_type: SourceType, source_name: &str, age_hours: i64) -> FeedItem {
        FeedItem {
            id: id.to_string(),
            source_type,
            source_name: source_name.to_string(),
            title: id.to_string(),
            summary: String::new(),
            full_text: None,
            url: format!("https://example.com/{}", id),
            author: None,
            published_at: now() - ChronoDuration::hours(age_hours),
        }
    }

    fn sample_items() -> Vec<FeedItem> {
        vec![
            make_item("blog-1", SourceType::Rss, "Blog", 1),
            make_item("rust-1", SourceType::Reddit, "r/rust", 2),
            make_item("netsec-1", SourceType::Reddit, "r/netsec", 3),
            make_item("blog-2", SourceType::Rss, "Blog", 4),
            make_item("rust-2", SourceType::Reddit, "r/rust", 5),
        ]
    }

    fn outcome(items: Vec<FeedItem>, failed: &[&str], attempted: usize) -> RefreshOutcome {
        RefreshOutcome {
            items,
            failures: failed
                .iter()
                .map(|name| SourceFailure {
                    source_name: name.to_string(),
                    error: FetchError::network("connection refused"),
                })
                .collect(),
            attempted,
            fetched_at: now(),
        }
    }

    fn loaded_state() -> ViewState {
        let state = ViewState::new(2, vec!["rust".into(), "netsec".into()], SourceView::All);
        let (state, ticket) = state.begin_refresh();
        state.complete_refresh(ticket, outcome(sample_items(), &[], 3))
    }

    fn visible_ids(state: &ViewState) -> Vec<String> {
        state.visible_items().iter().map(|i| i.id.clone()).collect()
    }

    mod selection_tests {
        use super::*;

        #[test]
        fn test_new_state_is_empty() {
            let state = ViewState::default();
            assert_eq!(state.source(), SourceView::All);
            assert!(state.subreddit().is_none());
            assert!(!state.has_loaded());
            assert!(!state.is_refreshing());
            assert!(state.visible_items().is_empty());
            assert!(state.last_error().is_none());
        }

        #[test]
        fn test_select_source_filters_by_type() {
            let state = loaded_state().select_source(SourceView::Rss);
            assert_eq!(visible_ids(&state), vec!["blog-1", "blog-2"]);

            let state = state.select_source(SourceView::Reddit);
            assert_eq!(visible_ids(&state), vec!["rust-1", "netsec-1", "rust-2"]);

            let state = state.select_source(SourceView::All);
            assert_eq!(visible_ids(&state).len(), 5);
        }

        #[test]
        fn test_select_subreddit_applies_in_reddit_view() {
            let state = loaded_state()
                .select_source(SourceView::Reddit)
                .select_subreddit("r/Rust");
            assert_eq!(state.subreddit(), Some("rust"));
            assert_eq!(visible_ids(&state), vec!["rust-1", "rust-2"]);
        }

        #[test]
        fn test_subreddit_ignored_outside_reddit_view() {
            let state = loaded_state().select_subreddit("netsec");
            assert_eq!(visible_ids(&state).len(), 5);

            let state = state.select_source(SourceView::Rss);
            assert_eq!(visible_ids(&state), vec!["blog-1", "blog-2"]);
        }

        #[test]
        fn test_unknown_or_all_subreddit_resets() {
            let state = loaded_state()
                .select_source(SourceView::Reddit)
                .select_subreddit("rust")
                .select_subreddit("all");
            assert!(state.subreddit().is_none());

            let state = state.select_subreddit("rust").select_subreddit("doesnotexist");
            assert!(state.subreddit().is_none());
            assert_eq!(visible_ids(&state).len(), 3);
        }

        #[test]
        fn test_source_view_parse() {
            assert_eq!(SourceView::parse("reddit"), SourceView::Reddit);
            assert_eq!(SourceView::parse(" RSS "), SourceView::Rss);
            assert_eq!(SourceView::parse("feeds"), SourceView::Rss);
            assert_eq!(SourceView::parse("all"), SourceView::All);
            assert_eq!(SourceView::parse("bogus"), SourceView::All);
        }
    }

    mod pagination_tests {
        use super::*;

        #[test]
        fn test_first_page() {
            let state = loaded_state();
            let page = state.page(0);
            assert_eq!(page.items.len(), 2);
            assert_eq!(page.items[0].id, "blog-1");
            assert_eq!(page.total, 5);
            assert_eq!(page.next_offset, 2);
            assert!(page.has_more);
        }

        #[test]
        fn test_last_page() {
            let state = loaded_state();
            let page = state.page(4);
            assert_eq!(page.items.len(), 1);
            assert_eq!(page.items[0].id, "rust-2");
            assert!(!page.has_more);
        }

        #[test]
        fn test_offset_past_end() {
            let state = loaded_state();
            let page = state.page(100);
            assert!(page.items.is_empty());
            assert_eq!(page.offset, 5);
            assert!(!page.has_more);
        }

        #[test]
        fn test_paging_does_not_touch_snapshot() {
            let state = loaded_state();
            let _ = state.page(0);
            let _ = state.page(2);
            assert_eq!(state.snapshot().unwrap().items.len(), 5);
        }

        #[test]
        fn test_page_of_filtered_view() {
            let state = loaded_state().select_source(SourceView::Reddit);
            let page = state.page(2);
            assert_eq!(page.total, 3);
            assert_eq!(page.items.len(), 1);
            assert_eq!(page.items[0].id, "rust-2");
        }
    }

    mod filter_state_tests {
        use super::*;

        fn names() -> Vec<String> {
            vec!["Blog".into(), "r/rust".into(), "r/netsec".into()]
        }

        #[test]
        fn test_all_sources_enabled_initially() {
            let state = ViewState::default().with_source_names(names());
            assert!(names().iter().all(|n| state.is_enabled(n)));
            assert_eq!(state.filter(), &ItemFilter::default());
        }

        #[test]
        fn test_update_filters_disables_unlisted_sources() {
            let filter = ItemFilter::new(3, &["rust".into()], &[]);
            let state = ViewState::default()
                .with_source_names(names())
                .update_filters(filter.clone(), &["Blog".into(), "r/unknown".into()]);

            assert!(state.is_enabled("Blog"));
            assert!(!state.is_enabled("r/rust"));
            assert!(!state.is_enabled("r/netsec"));
            assert_eq!(state.filter(), &filter);
        }

        #[test]
        fn test_update_filters_keeps_snapshot_and_selection() {
            let state = loaded_state()
                .with_source_names(names())
                .select_source(SourceView::Rss)
                .update_filters(ItemFilter::new(1, &[], &[]), &[]);

            assert_eq!(state.source(), SourceView::Rss);
            assert_eq!(visible_ids(&state), vec!["blog-1", "blog-2"]);
            assert!(!state.is_refreshing());
        }

        #[test]
        fn test_reenabling_sources() {
            let state = ViewState::default()
                .with_source_names(names())
                .update_filters(ItemFilter::default(), &[])
                .update_filters(ItemFilter::default(), &names());
            assert!(names().iter().all(|n| state.is_enabled(n)));
        }
    }

    mod refresh_state_tests {
        use super::*;

        #[test]
        fn test_begin_refresh_marks_refreshing() {
            let (state, ticket) = ViewState::default().begin_refresh();
            assert_eq!(ticket.sequence(), 1);
            assert!(state.is_refreshing());
            assert!(state.is_current(ticket));
        }

        #[test]
        fn test_superseded_outcome_is_discarded() {
            let state = ViewState::default();
            let (state, first) = state.begin_refresh();
            let (state, second) = state.begin_refresh();
            assert!(!state.is_current(first));

            let state = state.complete_refresh(
                second,
                outcome(vec![make_item("new", SourceType::Rss, "Blog", 1)], &[], 1),
            );
            let state = state.complete_refresh(
                first,
                outcome(vec![make_item("old", SourceType::Rss, "Blog", 1)], &[], 1),
            );

            assert_eq!(visible_ids(&state), vec!["new"]);
            assert_eq!(state.snapshot().unwrap().request, 2);
            assert!(!state.is_refreshing());
        }

        #[test]
        fn test_older_outcome_before_newer_is_also_discarded() {
            let (state, first) = ViewState::default().begin_refresh();
            let (state, second) = state.begin_refresh();

            let state = state.complete_refresh(
                first,
                outcome(vec![make_item("old", SourceType::Rss, "Blog", 1)], &[], 1),
            );
            assert!(!state.has_loaded());
            assert!(state.is_refreshing());

            let state = state.complete_refresh(second, outcome(Vec::new(), &[], 1));
            assert!(state.has_loaded());
            assert!(!state.is_refreshing());
        }

        #[test]
        fn test_same_ticket_applies_once() {
            let (state, ticket) = ViewState::default().begin_refresh();
            let state = state.complete_refresh(
                ticket,
                outcome(vec![make_item("a", SourceType::Rss, "Blog", 1)], &[], 1),
            );
            let state = state.complete_refresh(
                ticket,
                outcome(vec![make_item("b", SourceType::Rss, "Blog", 1)], &[], 1),
            );
            assert_eq!(visible_ids(&state), vec!["a"]);
        }

        #[test]
        fn test_partial_failure_shows_new_items_and_indicator() {
            let (state, ticket) = ViewState::default().begin_refresh();
            let state = state.complete_refresh(
                ticket,
                outcome(
                    vec![
                        make_item("a", SourceType::Rss, "A", 1),
                        make_item("c", SourceType::Rss, "C", 2),
                    ],
                    &["B"],
                    3,
                ),
            );

            assert_eq!(visible_ids(&state), vec!["a", "c"]);
            let error = state.last_error().unwrap();
            assert_eq!(error.severity, ErrorSeverity::Partial);
            assert!(error.message.contains("1 of 3"));
            assert!(error.message.contains("B"));
        }

        #[test]
        fn test_total_failure_keeps_previous_items() {
            let state = loaded_state();
            let (state, ticket) = state.begin_refresh();
            let state = state.complete_refresh(ticket, outcome(Vec::new(), &["A", "B", "C"], 3));

            assert_eq!(visible_ids(&state).len(), 5);
            assert_eq!(state.snapshot().unwrap().request, 1);
            let error = state.last_error().unwrap();
            assert_eq!(error.severity, ErrorSeverity::Total);
        }

        #[test]
        fn test_total_failure_without_prior_result() {
            let (state, ticket) = ViewState::default().begin_refresh();
            let state = state.complete_refresh(ticket, outcome(Vec::new(), &["A"], 1));

            assert!(!state.has_loaded());
            assert!(state.visible_items().is_empty());
            assert_eq!(state.last_error().unwrap().severity, ErrorSeverity::Total);
        }

        #[test]
        fn test_success_clears_error() {
            let (state, ticket) = ViewState::default().begin_refresh();
            let state = state.complete_refresh(ticket, outcome(Vec::new(), &["A"], 1));
            assert!(state.last_error().is_some());

            let (state, ticket) = state.begin_refresh();
            let state = state.complete_refresh(ticket, outcome(Vec::new(), &[], 1));
            assert!(state.last_error().is_none());
            assert!(state.has_loaded());
        }
    }

    mod controller_tests {
        use super::*;
        use crate::model::{RawBatch, RawItem, RssEntry};
        use crate::source::SourceAdapter;
        use async_trait::async_trait;
        use std::sync::atomic::{AtomicUsize, Ordering};

        /// First call is slow and returns "slow", later calls are fast.
        struct SequencedAdapter {
            calls: AtomicUsize,
        }

        #[async_trait]
        impl SourceAdapter for SequencedAdapter {
            async fn fetch(&self, _source: &SourceConfig) -> Result<RawBatch, FetchError> {
                let call = self.calls.fetch_add(1, Ordering::SeqCst);
                let label = if call == 0 {
                    tokio::time::sleep(Duration::from_millis(300)).await;
                    "slow"
                } else {
                    "fast"
                };
                Ok(RawBatch::new(
                    None,
                    vec![RawItem::Rss(RssEntry {
                        title: Some(label.to_string()),
                        link: Some(format!("https://example.com/{}", label)),
                        ..Default::default()
                    })],
                ))
            }
        }

        fn controller() -> Arc<ViewController> {
            let pipeline = Pipeline::new(
                Arc::new(SequencedAdapter {
                    calls: AtomicUsize::new(0),
                }),
                Normalizer::default(),
                Duration::from_secs(5),
            );
            Arc::new(ViewController::new(
                pipeline,
                vec![SourceConfig::rss("https://example.com/feed", "Example")],
                ViewState::default(),
            ))
        }

        #[tokio::test]
        async fn test_newer_refresh_supersedes_in_flight_one() {
            let controller = controller();

            let slow = {
                let controller = controller.clone();
                tokio::spawn(async move { controller.refresh().await })
            };
            tokio::time::sleep(Duration::from_millis(50)).await;
            assert!(controller.is_refreshing().await);

            assert!(controller.refresh().await);
            assert!(!slow.await.unwrap());

            let state = controller.state().await;
            let titles: Vec<_> = state.visible_items().iter().map(|i| i.title.clone()).collect();
            assert_eq!(titles, vec!["fast"]);
            assert!(!state.is_refreshing());
        }

        /// Returns one item titled after the source it was asked for.
        struct NamedAdapter;

        #[async_trait]
        impl SourceAdapter for NamedAdapter {
            async fn fetch(&self, source: &SourceConfig) -> Result<RawBatch, FetchError> {
                Ok(RawBatch::new(
                    None,
                    vec![RawItem::Rss(RssEntry {
                        title: Some(format!("{} news", source.name)),
                        link: Some(format!("https://example.com/{}", source.name)),
                        ..Default::default()
                    })],
                ))
            }
        }

        fn named_controller() -> ViewController {
            let pipeline = Pipeline::new(
                Arc::new(NamedAdapter),
                Normalizer::default(),
                Duration::from_secs(5),
            );
            ViewController::new(
                pipeline,
                vec![
                    SourceConfig::rss("https://alpha.example/feed", "Alpha"),
                    SourceConfig::rss("https://beta.example/feed", "Beta"),
                ],
                ViewState::default(),
            )
        }

        async fn titles(controller: &ViewController) -> Vec<String> {
            let state = controller.state().await;
            let mut titles: Vec<_> = state.visible_items().iter().map(|i| i.title.clone()).collect();
            titles.sort();
            titles
        }

        #[tokio::test]
        async fn test_refresh_skips_disabled_sources() {
            let controller = named_controller();
            assert_eq!(controller.state().await.source_names(), ["Alpha", "Beta"]);

            controller.refresh().await;
            assert_eq!(titles(&controller).await, vec!["Alpha news", "Beta news"]);

            controller
                .update_filters(ItemFilter::default(), &["Beta".to_string()])
                .await;
            controller.refresh().await;
            assert_eq!(titles(&controller).await, vec!["Beta news"]);
        }

        #[tokio::test]
        async fn test_refresh_applies_current_filter() {
            let controller = named_controller();
            let enabled = vec!["Alpha".to_string(), "Beta".to_string()];

            controller
                .update_filters(ItemFilter::new(0, &[], &["ALPHA".to_string()]), &enabled)
                .await;
            controller.refresh().await;
            assert_eq!(titles(&controller).await, vec!["Beta news"]);
        }

        #[tokio::test]
        async fn test_selection_through_controller() {
            let controller = controller();
            let state = controller.select_source(SourceView::Reddit).await;
            assert_eq!(state.source(), SourceView::Reddit);
            assert_eq!(controller.state().await.source(), SourceView::Reddit);

            let state = controller.select_subreddit("rust").await;
            assert!(state.subreddit().is_none());
        }
    }
}
