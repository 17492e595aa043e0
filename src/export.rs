use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::model::FeedItem;

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M UTC";

/// Render items as a Markdown digest, in the order given.
pub fn to_markdown(items: &[&FeedItem], title: &str, now: DateTime<Utc>) -> String {
    let mut out = String::new();

    // Writing into a String cannot fail.
    let _ = writeln!(out, "# {} ({})", title, now.format(DATE_FORMAT));
    out.push('\n');

    if items.is_empty() {
        out.push_str("_No items._\n");
        return out;
    }

    for (n, item) in items.iter().enumerate() {
        let _ = writeln!(out, "## {}. {}", n + 1, single_line(&item.title));
        out.push('\n');
        let _ = writeln!(out, "- Date: {}", item.published_at.format(DATE_FORMAT));
        let _ = writeln!(out, "- Source: {} ({})", item.source_name, item.source_type);
        if let Some(author) = &item.author {
            let _ = writeln!(out, "- Author: {}", author);
        }
        if !item.url.is_empty() {
            let _ = writeln!(out, "- Link: <{}>", item.url);
        }

        if !item.summary.is_empty() {
            out.push('\n');
            for line in item.summary.lines() {
                let _ = writeln!(out, "> {}", line);
            }
        }
        out.push('\n');
    }

    out
}

fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
