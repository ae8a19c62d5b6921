//! Combine the strategies' records into one set keyed by canonical URL.

use crate::models::ListingRecord;
use std::collections::HashSet;

/// Merge in fixed precedence: network, then structured, then DOM.
///
/// The first record for a canonical URL is kept whole; later duplicates are
/// dropped. Fields are never combined across sources.
pub fn merge(
    network: Vec<ListingRecord>,
    structured: Vec<ListingRecord>,
    dom: Vec<ListingRecord>,
) -> Vec<ListingRecord> {
    let mut seen = HashSet::new();
    let mut merged = Vec::with_capacity(network.len() + structured.len() + dom.len());

    for record in network.into_iter().chain(structured).chain(dom) {
        if record.canonical_url.is_empty() {
            continue;
        }
        if seen.insert(record.canonical_url.clone()) {
            merged.push(record);
        }
    }

    merged
}
