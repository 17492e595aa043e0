use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use super::{is_blank, read_body};
use crate::error::FetchError;
use crate::model::{RawBatch, RawItem, RedditPost};

/// Unauthenticated listings cap out at 100 posts per request.
pub const MAX_LISTING_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
struct Listing {
    #[serde(default)]
    data: ListingData,
}

#[derive(Debug, Default, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    #[serde(default)]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

pub fn listing_url(base: &str, subreddit: &str, limit: Option<usize>) -> String {
    let limit = limit.unwrap_or(MAX_LISTING_LIMIT).clamp(1, MAX_LISTING_LIMIT);
    format!(
        "{}/r/{}/new.json?limit={}",
        base.trim_end_matches('/'),
        subreddit,
        limit
    )
}

pub async fn fetch(
    client: &Client,
    base: &str,
    subreddit: &str,
    limit: Option<usize>,
) -> Result<RawBatch, FetchError> {
    let url = listing_url(base, subreddit, limit);
    info!("Fetching subreddit: r/{} ({})", subreddit, url);

    let body = read_body(client, &url).await?;
    let batch = parse_listing(&body)?;
    debug!("Parsed {} posts from r/{}", batch.items.len(), subreddit);
    Ok(batch)
}

/// Parse a subreddit listing document.
///
/// Only `t3` (link/self post) children are kept. Individual children that do
/// not look like posts are skipped rather than failing the whole listing.
pub fn parse_listing(body: &[u8]) -> Result<RawBatch, FetchError> {
    if is_blank(body) {
        return Ok(RawBatch::empty());
    }

    let listing: Listing = serde_json::from_slice(body)?;

    let items = listing
        .data
        .children
        .into_iter()
        .filter(|child| child.kind == "t3")
        .filter_map(|child| match serde_json::from_value::<RedditPost>(child.data) {
            Ok(post) => Some(RawItem::Reddit(post)),
            Err(e) => {
                debug!("Skipping malformed listing entry: {}", e);
                None
            }
        })
        .collect();

    Ok(RawBatch::new(None, items))
}
