//! Conversion of raw per-source items into [`FeedItem`]s.
//!
//! Everything here is pure: no I/O and no error path. Missing or malformed
//! fields degrade to empty strings.

use chrono::{DateTime, TimeZone, Utc};
use html_escape::decode_html_entities;
use sha2::{Digest, Sha256};

use crate::model::{FeedItem, RawItem, RedditPost, RssEntry, SourceType};

/// Default preview length, in characters.
pub const DEFAULT_PREVIEW_CHARS: usize = 280;

/// Appended to a summary that was cut short.
pub const ELLIPSIS: char = '…';

const REDDIT_BASE: &str = "https://www.reddit.com";

/// Tags that separate words when removed.
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption", "footer",
    "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "ol", "p", "pre", "section",
    "table", "td", "th", "tr", "ul",
];

/// Tags whose content is never text.
const SKIPPED_TAGS: &[&str] = &["script", "style"];

#[derive(Debug, Clone)]
pub struct Normalizer {
    preview_chars: usize,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(DEFAULT_PREVIEW_CHARS)
    }
}

impl Normalizer {
    pub fn new(preview_chars: usize) -> Self {
        Self { preview_chars }
    }

    /// Normalize one raw item. `fetched_at` stands in for a missing
    /// publication date.
    pub fn normalize(
        &self,
        raw: &RawItem,
        source_name: &str,
        fetched_at: DateTime<Utc>,
    ) -> FeedItem {
        match raw {
            RawItem::Rss(entry) => self.normalize_rss(entry, source_name, fetched_at),
            RawItem::Reddit(post) => self.normalize_reddit(post, source_name, fetched_at),
        }
    }

    fn normalize_rss(
        &self,
        entry: &RssEntry,
        source_name: &str,
        fetched_at: DateTime<Utc>,
    ) -> FeedItem {
        let title = entry.title.as_deref().map(strip_markup).unwrap_or_default();
        let link = entry
            .link
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_string();

        let summary_text = entry.summary.as_deref().map(strip_markup).unwrap_or_default();
        let body_text = entry.content.as_deref().map(strip_markup).unwrap_or_default();

        let preview_source = if summary_text.is_empty() {
            &body_text
        } else {
            &summary_text
        };
        let summary = truncate_preview(preview_source, self.preview_chars);

        let full_text = if !body_text.is_empty() {
            Some(body_text.clone())
        } else if !summary_text.is_empty() {
            Some(summary_text.clone())
        } else {
            None
        };

        let id = if !link.is_empty() {
            link.clone()
        } else if !entry.guid.trim().is_empty() {
            entry.guid.trim().to_string()
        } else {
            fallback_id(source_name, &title)
        };

        FeedItem {
            id,
            source_type: SourceType::Rss,
            source_name: source_name.to_string(),
            title,
            summary,
            full_text,
            url: link,
            author: entry
                .author
                .as_deref()
                .map(strip_markup)
                .filter(|a| !a.is_empty()),
            published_at: entry.published.unwrap_or(fetched_at),
        }
    }

    fn normalize_reddit(
        &self,
        post: &RedditPost,
        source_name: &str,
        fetched_at: DateTime<Utc>,
    ) -> FeedItem {
        let title = strip_markup(&post.title);
        let body = strip_markup(&post.selftext);

        let permalink = post.permalink.trim();
        let url = if permalink.is_empty() {
            post.url.as_deref().map(str::trim).unwrap_or_default().to_string()
        } else if permalink.starts_with("http") {
            permalink.to_string()
        } else {
            format!("{}{}", REDDIT_BASE, permalink)
        };

        let id = if !permalink.is_empty() {
            url.clone()
        } else if !post.id.trim().is_empty() {
            format!("reddit:{}", post.id.trim())
        } else if !url.is_empty() {
            url.clone()
        } else {
            fallback_id(source_name, &title)
        };

        let published_at = post
            .created_utc
            .and_then(timestamp_to_utc)
            .unwrap_or(fetched_at);

        FeedItem {
            id,
            source_type: SourceType::Reddit,
            source_name: source_name.to_string(),
            title,
            summary: truncate_preview(&body, self.preview_chars),
            full_text: if body.is_empty() { None } else { Some(body) },
            url,
            author: post
                .author
                .as_deref()
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(String::from),
            published_at,
        }
    }
}

fn timestamp_to_utc(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.trunc() as i64;
    let nanos = ((secs.fract()) * 1_000_000_000.0).round() as u32;
    Utc.timestamp_opt(whole, nanos.min(999_999_999)).single()
}

/// Deterministic identity for items that carry no link or guid.
pub fn fallback_id(source_name: &str, title: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_name.as_bytes());
    hasher.update([0u8]);
    hasher.update(title.as_bytes());
    format!("sha256:{:x}", hasher.finalize())
}

/// Cut `text` to at most `max_chars` characters, appending [`ELLIPSIS`] when
/// anything was removed.
pub fn truncate_preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        None => text.to_string(),
        Some((byte_idx, _)) => {
            let mut out = String::with_capacity(byte_idx + ELLIPSIS.len_utf8());
            out.push_str(&text[..byte_idx]);
            out.push(ELLIPSIS);
            out
        }
    }
}

/// Reduce an HTML fragment to plain text.
///
/// Tags and comments are removed, entities decoded and whitespace collapsed.
/// Entity-escaped markup (`&lt;p&gt;`) is stripped too once decoded.
pub fn strip_markup(input: &str) -> String {
    let mut text = collapse_whitespace(&decode_html_entities(&remove_tags(input)));

    // Escaped markup only shows up after one decode; a couple of passes is
    // enough for anything seen in real feeds.
    for _ in 0..2 {
        if !contains_tag(&text) && !contains_entity(&text) {
            break;
        }
        text = collapse_whitespace(&decode_html_entities(&remove_tags(&text)));
    }
    text
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A `<` followed by something that can open a tag, comment or declaration.
fn opens_tag(rest: &str) -> bool {
    matches!(
        rest.chars().nth(1),
        Some(c) if c.is_ascii_alphabetic() || c == '/' || c == '!' || c == '?'
    )
}

fn contains_tag(text: &str) -> bool {
    text.match_indices('<').any(|(idx, _)| {
        let rest = &text[idx..];
        opens_tag(rest) && rest.contains('>')
    })
}

/// An `&name;` or `&#123;` sequence that a decode pass would still rewrite.
fn contains_entity(text: &str) -> bool {
    text.match_indices('&').any(|(idx, _)| {
        let rest = &text[idx + 1..];
        match rest.find(';') {
            Some(end) if end > 0 && end <= 32 => {
                let name = &rest[..end];
                name.chars().all(|c| c.is_ascii_alphanumeric() || c == '#')
                    && decode_html_entities(&text[idx..idx + end + 2]) != &text[idx..idx + end + 2]
            }
            _ => false,
        }
    })
}

fn tag_name(tag: &str) -> String {
    tag.trim_start_matches('/')
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase()
}

fn remove_tags(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(lt) = rest.find('<') {
        out.push_str(&rest[..lt]);
        let candidate = &rest[lt..];

        if !opens_tag(candidate) {
            out.push('<');
            rest = &candidate[1..];
            continue;
        }

        if let Some(comment) = candidate.strip_prefix("<!--") {
            rest = match comment.find("-->") {
                Some(end) => &comment[end + 3..],
                None => "",
            };
            continue;
        }

        // A `<` that is never closed, or is followed by another `<` first,
        // was text like `a <b`.
        let gt = match candidate[1..].find(|c| c == '<' || c == '>') {
            Some(end) if candidate.as_bytes()[end + 1] == b'>' => end + 1,
            _ => {
                out.push('<');
                rest = &candidate[1..];
                continue;
            }
        };

        let inner = &candidate[1..gt];
        let name = tag_name(inner);
        rest = &candidate[gt + 1..];

        if !inner.starts_with('/') && !inner.ends_with('/') && SKIPPED_TAGS.contains(&name.as_str())
        {
            let close = format!("</{}", name);
            rest = match find_ascii_case_insensitive(rest, &close) {
                Some(start) => match rest[start..].find('>') {
                    Some(end) => &rest[start + end + 1..],
                    None => "",
                },
                None => "",
            };
            out.push(' ');
            continue;
        }

        if BLOCK_TAGS.contains(&name.as_str()) {
            out.push(' ');
        }
    }

    out.push_str(rest);
    out
}

fn find_ascii_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    let hay = haystack.as_bytes();
    let needle = needle.as_bytes();
    if needle.len() > hay.len() {
        return None;
    }
    (0..=hay.len() - needle.len()).find(|&i| hay[i..i + needle.len()].eq_ignore_ascii_case(needle))
}
