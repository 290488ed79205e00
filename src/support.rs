//! Normalize-and-dedupe helpers for set-valued rule fields.
//!
//! Every accumulating setter funnels through these: append the new items to
//! whatever was set before, drop empty entries, and deduplicate preserving
//! first-seen order. Merging the same items twice is a no-op, so repeated
//! setter calls stay stable.
//!
//! Equality is by value for strings, by pattern text for regexes, and by
//! `Arc` identity for callables.

use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;

/// Merge string-valued items into a previously accumulated list.
pub(crate) fn merge_distinct(previous: Vec<String>, items: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut merged = previous;
    merged.extend(items);

    let mut seen = HashSet::new();
    merged.retain(|item| !item.is_empty() && seen.insert(item.clone()));
    merged
}

/// Merge compiled regexes, deduplicating on the pattern text.
pub(crate) fn merge_regexes(previous: Vec<Regex>, items: impl IntoIterator<Item = Regex>) -> Vec<Regex> {
    let mut merged = previous;
    merged.extend(items);

    let mut seen = HashSet::new();
    merged.retain(|regex| !regex.as_str().is_empty() && seen.insert(regex.as_str().to_string()));
    merged
}

/// Merge shared callables, deduplicating on pointer identity.
pub(crate) fn merge_arcs<T: ?Sized>(previous: Vec<Arc<T>>, items: impl IntoIterator<Item = Arc<T>>) -> Vec<Arc<T>> {
    let mut merged = previous;
    for item in items {
        if !merged.iter().any(|existing| Arc::ptr_eq(existing, &item)) {
            merged.push(item);
        }
    }
    merged
}
