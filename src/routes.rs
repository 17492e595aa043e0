use std::sync::Arc;

use askama::Template;
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::debug;

use crate::export::to_markdown;
use crate::filter::{split_keywords, ItemFilter};
use crate::model::FeedItem;
use crate::view::{ErrorSeverity, SourceView, ViewController, ViewState};

const DASHBOARD_TITLE: &str = "Morning Feed";
const DATE_FORMAT: &str = "%b %d, %H:%M";

pub struct AppState {
    pub controller: Arc<ViewController>,
}

/// Every dynamic route. The binary adds static files and tracing on top.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/select", post(select))
        .route("/items/more", get(items_more))
        .route("/filters", post(update_filters))
        .route("/refresh", post(refresh))
        .route("/refresh/status", get(refresh_status))
        .route("/export.md", get(export_markdown))
        .route("/health", get(health))
        .with_state(state)
}

// Template structs
#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub title: String,
    pub tabs: Vec<TabView>,
    pub show_subreddits: bool,
    pub subreddits: Vec<SubredditOption>,
    pub filters: FiltersView,
    pub error: Option<ErrorView>,
    pub fetched_at: Option<String>,
    pub loaded: bool,
    pub total: usize,
    pub items: Vec<ItemView>,
    pub next_offset: usize,
    pub has_more: bool,
    pub refreshing: bool,
}

#[derive(Template)]
#[template(path = "feed_items.html")]
pub struct FeedItemsTemplate {
    pub items: Vec<ItemView>,
    pub next_offset: usize,
    pub has_more: bool,
}

#[derive(Template)]
#[template(path = "refresh_button.html")]
pub struct RefreshButtonTemplate {
    pub refreshing: bool,
}

pub struct TabView {
    pub value: &'static str,
    pub label: &'static str,
    pub active: bool,
}

pub struct SubredditOption {
    pub name: String,
    pub selected: bool,
}

/// Current values for the filter form.
pub struct FiltersView {
    pub lookback_days: u32,
    pub include: String,
    pub exclude: String,
    pub sources: Vec<SourceToggle>,
}

pub struct SourceToggle {
    pub name: String,
    pub enabled: bool,
}

impl FiltersView {
    fn from_state(view: &ViewState) -> Self {
        let filter = view.filter();
        Self {
            lookback_days: filter.lookback_days(),
            include: filter.include_keywords().join(", "),
            exclude: filter.exclude_keywords().join(", "),
            sources: view
                .source_names()
                .iter()
                .map(|name| SourceToggle {
                    name: name.clone(),
                    enabled: view.is_enabled(name),
                })
                .collect(),
        }
    }
}

pub struct ErrorView {
    pub class: &'static str,
    pub message: String,
}

/// A feed item with everything the templates print already formatted.
pub struct ItemView {
    pub title: String,
    pub url: String,
    pub source_name: String,
    pub source_type: &'static str,
    pub author: Option<String>,
    pub published: String,
    pub summary: String,
    /// Only set when it says more than the summary.
    pub full_text: Option<String>,
}

impl From<&FeedItem> for ItemView {
    fn from(item: &FeedItem) -> Self {
        let full_text = item
            .full_text
            .as_ref()
            .filter(|text| **text != item.summary)
            .cloned();

        Self {
            title: item.title.clone(),
            url: item.url.clone(),
            source_name: item.source_name.clone(),
            source_type: item.source_type.as_str(),
            author: item.author.clone(),
            published: item.published_at.format(DATE_FORMAT).to_string(),
            summary: item.summary.clone(),
            full_text,
        }
    }
}

fn item_views(items: &[&FeedItem]) -> Vec<ItemView> {
    items.iter().map(|item| ItemView::from(*item)).collect()
}

impl IndexTemplate {
    fn from_state(view: &ViewState) -> Self {
        let page = view.page(0);

        let tabs = SourceView::ALL
            .iter()
            .map(|tab| TabView {
                value: tab.as_str(),
                label: tab.label(),
                active: *tab == view.source(),
            })
            .collect();

        let subreddits = view
            .subreddits()
            .iter()
            .map(|name| SubredditOption {
                name: name.clone(),
                selected: view.subreddit() == Some(name.as_str()),
            })
            .collect();

        let error = view.last_error().map(|e| ErrorView {
            class: match e.severity {
                ErrorSeverity::Partial => "partial",
                ErrorSeverity::Total => "total",
            },
            message: e.message.clone(),
        });

        Self {
            title: DASHBOARD_TITLE.to_string(),
            tabs,
            show_subreddits: view.source() == SourceView::Reddit && !view.subreddits().is_empty(),
            subreddits,
            filters: FiltersView::from_state(view),
            error,
            fetched_at: view
                .snapshot()
                .map(|s| s.fetched_at.format(DATE_FORMAT).to_string()),
            loaded: view.has_loaded(),
            total: page.total,
            items: item_views(&page.items),
            next_offset: page.next_offset,
            has_more: page.has_more,
            refreshing: view.is_refreshing(),
        }
    }
}

// Wrapper for HTML responses
struct HtmlTemplate<T>(T);

impl<T: Template> IntoResponse for HtmlTemplate<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(html) => Html(html).into_response(),
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to render template: {}", err),
            )
                .into_response(),
        }
    }
}

// Custom error type
pub struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Error: {}", self.0),
        )
            .into_response()
    }
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(err: E) -> Self {
        AppError(err.into())
    }
}

// Route handlers
pub async fn index(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    let view = state.controller.state().await;
    Ok(HtmlTemplate(IndexTemplate::from_state(&view)))
}

#[derive(Debug, Deserialize)]
pub struct SelectForm {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub subreddit: Option<String>,
}

pub async fn select(
    State(state): State<Arc<AppState>>,
    Form(form): Form<SelectForm>,
) -> Result<impl IntoResponse, AppError> {
    debug!(?form, "Selection changed");

    if let Some(source) = form.source.as_deref() {
        state.controller.select_source(SourceView::parse(source)).await;
    }
    if let Some(subreddit) = form.subreddit.as_deref() {
        state.controller.select_subreddit(subreddit).await;
    }

    Ok(Redirect::to("/"))
}

/// The filter form. `enabled` repeats once per checked source, so the form
/// arrives as raw pairs rather than a flat struct.
#[derive(Debug, Default)]
pub struct FiltersForm {
    pub lookback_days: String,
    pub include_keywords: String,
    pub exclude_keywords: String,
    pub enabled: Vec<String>,
}

impl FiltersForm {
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut form = Self::default();
        for (key, value) in pairs {
            match key.as_str() {
                "lookback_days" => form.lookback_days = value,
                "include_keywords" => form.include_keywords = value,
                "exclude_keywords" => form.exclude_keywords = value,
                "enabled" => form.enabled.push(value),
                _ => {}
            }
        }
        form
    }

    /// A blank lookback means no recency limit.
    pub fn to_filter(&self) -> Result<ItemFilter, String> {
        let raw = self.lookback_days.trim();
        let lookback_days = if raw.is_empty() {
            0
        } else {
            raw.parse::<u32>()
                .map_err(|_| format!("Invalid lookback days: {:?}", raw))?
        };

        Ok(ItemFilter::new(
            lookback_days,
            &split_keywords(&self.include_keywords),
            &split_keywords(&self.exclude_keywords),
        ))
    }
}

pub async fn update_filters(
    State(state): State<Arc<AppState>>,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let form = FiltersForm::from_pairs(pairs);
    debug!(?form, "Filters changed");

    let filter = match form.to_filter() {
        Ok(filter) => filter,
        Err(message) => return Ok((StatusCode::BAD_REQUEST, message).into_response()),
    };
    state.controller.update_filters(filter, &form.enabled).await;

    let controller = state.controller.clone();
    tokio::spawn(async move {
        controller.refresh().await;
    });

    Ok(Redirect::to("/").into_response())
}

#[derive(Debug, Deserialize)]
pub struct MoreQuery {
    #[serde(default)]
    pub offset: usize,
}

pub async fn items_more(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MoreQuery>,
) -> Result<impl IntoResponse, AppError> {
    let view = state.controller.state().await;
    let page = view.page(query.offset);

    Ok(HtmlTemplate(FeedItemsTemplate {
        items: item_views(&page.items),
        next_offset: page.next_offset,
        has_more: page.has_more,
    }))
}

pub async fn refresh(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    // Spawn the refresh task
    let controller = state.controller.clone();
    tokio::spawn(async move {
        controller.refresh().await;
    });

    // Return refreshing state immediately
    Ok(HtmlTemplate(RefreshButtonTemplate { refreshing: true }))
}

pub async fn refresh_status(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let refreshing = state.controller.is_refreshing().await;
    let button = HtmlTemplate(RefreshButtonTemplate { refreshing });

    if refreshing {
        Ok(button.into_response())
    } else {
        // Done: have htmx reload the page so the new items show up.
        Ok(([("HX-Refresh", "true")], button).into_response())
    }
}

pub async fn export_markdown(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let view = state.controller.state().await;
    let now = Utc::now();
    let body = to_markdown(&view.visible_items(), DASHBOARD_TITLE, now);
    let disposition = format!(
        "attachment; filename=\"morning-feed-{}.md\"",
        now.format("%Y%m%d-%H%M")
    );

    Ok((
        [
            (header::CONTENT_TYPE, "text/markdown; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}

pub async fn health() -> impl IntoResponse {
    Html("OK")
}
