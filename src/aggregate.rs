use std::collections::HashSet;

use crate::model::FeedItem;

/// Merge item lists into one sequence: first occurrence of each id wins,
/// newest first, ties kept in the order they were supplied.
pub fn aggregate<I>(batches: I) -> Vec<FeedItem>
where
    I: IntoIterator<Item = Vec<FeedItem>>,
{
    let mut seen = HashSet::new();
    let mut merged = Vec::new();

    for batch in batches {
        for item in batch {
            if seen.insert(item.id.clone()) {
                merged.push(item);
            }
        }
    }

    // Stable: ties keep insertion order.
    merged.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    merged
}
