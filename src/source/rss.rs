use chrono::{DateTime, Utc};
use feed_rs::parser;
use reqwest::Client;
use tracing::{debug, info};

use super::{is_blank, read_body};
use crate::error::FetchError;
use crate::model::{RawBatch, RawItem, RssEntry};

pub async fn fetch(client: &Client, url: &str) -> Result<RawBatch, FetchError> {
    info!("Fetching feed: {}", url);
    let body = read_body(client, url).await?;
    let batch = parse_feed(&body)?;
    debug!("Parsed {} entries from {}", batch.items.len(), url);
    Ok(batch)
}

/// Parse an RSS/Atom/JSON Feed document.
///
/// A blank body is an empty feed; anything else that fails to parse is a
/// [`FetchError`] of kind `Parse`.
pub fn parse_feed(body: &[u8]) -> Result<RawBatch, FetchError> {
    if is_blank(body) {
        return Ok(RawBatch::empty());
    }

    // Entries without a guid keep an empty id instead of a random one.
    let feed = parser::Builder::new()
        .id_generator(|_, _, _| String::new())
        .build()
        .parse(body)?;

    let feed_title = feed
        .title
        .map(|t| t.content.trim().to_string())
        .filter(|t| !t.is_empty());

    let items = feed
        .entries
        .into_iter()
        .map(|entry| {
            // Prefer an alternate link; feeds with several links usually
            // list the article first anyway.
            let link = entry
                .links
                .iter()
                .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
                .or_else(|| entry.links.first())
                .map(|l| l.href.clone());

            let published: Option<DateTime<Utc>> = entry.published.or(entry.updated);

            RawItem::Rss(RssEntry {
                guid: entry.id,
                title: entry.title.map(|t| t.content),
                link,
                summary: entry.summary.map(|s| s.content),
                content: entry.content.and_then(|c| c.body),
                author: entry.authors.first().map(|a| a.name.clone()),
                published,
            })
        })
        .collect();

    Ok(RawBatch::new(feed_title, items))
}
