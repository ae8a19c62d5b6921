//! Listing extraction strategies.
//!
//! All three strategies produce `ListingRecord`s tagged with their `Source`.
//! The JSON-based ones share the recognizer in this module.

pub mod dom;
pub mod network;
pub mod structured;

use crate::classifier::{is_url_key, UrlClassifier};
use crate::models::{ListingRecord, Source};
use crate::normalize::{is_sold_marker, localize_decimal, parse_price};
use serde_json::{Map, Value};
use std::collections::HashSet;

pub use dom::{extract_dom, DomOptions};
pub use network::{extract_network, CapturedResponse, NetworkCollector};
pub use structured::{embedded_blobs, extract_structured};

const TITLE_KEYS: &[&str] = &["title", "subject", "name", "headline"];
const PRICE_KEY: &str = "price";
const SHIPPING_KEY: &str = "ship";
const SOLD_KEY: &str = "sold";
const STATUS_KEY: &str = "status";
const FLAG_KEYS: &[&str] = &["available", "enabled", "value", "active"];

/// How deep the walker descends into a single JSON document
const MAX_WALK_DEPTH: usize = 64;

/// How deep field lookups descend below a candidate mapping
const MAX_FIELD_DEPTH: usize = 4;

/// Build a record from already-extracted fields.
///
/// Returns `None` when the URL cannot be canonicalized.
pub(crate) fn build_record(
    classifier: &UrlClassifier,
    raw_url: &str,
    title: String,
    price_text: String,
    has_shipping: bool,
    sold_flag: bool,
    source: Source,
) -> Option<ListingRecord> {
    let canonical_url = classifier.canonicalize(raw_url)?;
    let is_sold = sold_flag || is_sold_marker(&title) || is_sold_marker(&price_text);

    Some(ListingRecord {
        canonical_url,
        raw_url: raw_url.to_string(),
        price_value: parse_price(&price_text),
        title,
        price_text,
        has_shipping,
        is_sold,
        source,
    })
}

/// Walk a JSON document and collect every listing-shaped mapping.
///
/// A mapping qualifies when a url-like key resolves to a listing URL and a
/// title-like key holds non-empty text. Anything else is skipped.
pub fn recognize_listings(
    value: &Value,
    classifier: &UrlClassifier,
    source: Source,
) -> Vec<ListingRecord> {
    let mut records = Vec::new();
    walk(value, classifier, source, 0, &mut records);
    dedup_first_seen(records)
}

fn walk(
    value: &Value,
    classifier: &UrlClassifier,
    source: Source,
    depth: usize,
    out: &mut Vec<ListingRecord>,
) {
    if depth > MAX_WALK_DEPTH {
        return;
    }

    match value {
        Value::Object(map) => {
            if let Some(record) = listing_from_map(map, classifier, source) {
                out.push(record);
            }
            for child in map.values() {
                walk(child, classifier, source, depth + 1, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                walk(item, classifier, source, depth + 1, out);
            }
        }
        _ => {}
    }
}

fn listing_from_map(
    map: &Map<String, Value>,
    classifier: &UrlClassifier,
    source: Source,
) -> Option<ListingRecord> {
    let raw_url = map
        .iter()
        .filter(|(key, _)| is_url_key(key))
        .find_map(|(_, value)| classifier.resolve(value))?;

    let title = map.iter().find_map(|(key, value)| {
        let key = key.to_lowercase();
        if !TITLE_KEYS.contains(&key.as_str()) {
            return None;
        }
        first_text(value, 0).filter(|t| !t.is_empty())
    })?;

    let price_text = find_field(map, PRICE_KEY, 0)
        .and_then(|value| price_text(value))
        .unwrap_or_default();

    let has_shipping = find_field(map, SHIPPING_KEY, 0).is_some_and(truthy);
    let sold_flag = find_field(map, SOLD_KEY, 0).is_some_and(truthy)
        || find_field(map, STATUS_KEY, 0)
            .and_then(|value| first_text(value, 0))
            .is_some_and(|status| is_sold_marker(&status));

    build_record(
        classifier,
        &raw_url,
        title,
        price_text,
        has_shipping,
        sold_flag,
        source,
    )
}

/// First value whose key contains `fragment`. The mapping's own keys are
/// checked first, then nested mappings depth-first in key order.
fn find_field<'a>(map: &'a Map<String, Value>, fragment: &str, depth: usize) -> Option<&'a Value> {
    if depth > MAX_FIELD_DEPTH {
        return None;
    }

    let direct = map
        .iter()
        .find(|(key, _)| key.to_lowercase().contains(fragment))
        .map(|(_, value)| value);
    if direct.is_some() {
        return direct;
    }

    map.values().find_map(|value| match value {
        Value::Object(inner) => find_field(inner, fragment, depth + 1),
        _ => None,
    })
}

/// Price text out of a price-ish field: prefer a scalar that parses as a
/// number, otherwise the first scalar found. Dot-decimal strings such as
/// linked-data `"40.00"` are rewritten to decimal-comma first.
fn price_text(value: &Value) -> Option<String> {
    let mut scalars = Vec::new();
    collect_text(value, 0, &mut scalars);
    let scalars: Vec<String> = scalars.iter().map(|s| localize_decimal(s)).collect();
    scalars
        .iter()
        .find(|s| parse_price(s).is_some())
        .or_else(|| scalars.first())
        .cloned()
}

fn first_text(value: &Value, depth: usize) -> Option<String> {
    let mut scalars = Vec::new();
    collect_text(value, depth, &mut scalars);
    scalars.into_iter().next()
}

fn collect_text(value: &Value, depth: usize, out: &mut Vec<String>) {
    if depth > MAX_FIELD_DEPTH {
        return;
    }
    match value {
        Value::String(s) => {
            let s = s.trim();
            if !s.is_empty() {
                out.push(s.to_string());
            }
        }
        // JSON numbers use a decimal point; render them the way page text does
        Value::Number(n) => out.push(n.to_string().replace('.', ",")),
        Value::Array(items) => items.iter().for_each(|v| collect_text(v, depth + 1, out)),
        Value::Object(map) => map.values().for_each(|v| collect_text(v, depth + 1, out)),
        _ => {}
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => {
            let s = s.trim().to_lowercase();
            !s.is_empty() && !matches!(s.as_str(), "false" | "no" | "0" | "none" | "null")
        }
        Value::Array(items) => items.iter().any(truthy),
        Value::Object(map) => match map.iter().find(|(key, _)| is_flag_key(key)) {
            Some((_, flag)) => truthy(flag),
            None => map.values().any(truthy),
        },
        Value::Null => false,
    }
}

/// Keys that hold the on/off answer inside a flag object such as
/// `{"available": false, "cost": "6,90 €"}`
fn is_flag_key(key: &str) -> bool {
    let camel_is = key
        .strip_prefix("is")
        .is_some_and(|rest| rest.starts_with(|c: char| c.is_ascii_uppercase()));
    let key = key.to_lowercase();
    camel_is || key.starts_with("is_") || FLAG_KEYS.contains(&key.as_str())
}

/// Keep the first record per canonical URL, preserving order
pub(crate) fn dedup_first_seen(records: Vec<ListingRecord>) -> Vec<ListingRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|r| seen.insert(r.canonical_url.clone()))
        .collect()
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::classifier::UrlClassifier;

    pub fn classifier() -> UrlClassifier {
        UrlClassifier::new(
            "https://www.subito.it",
            &["https://www.subito.it".to_string()],
            &[".htm".to_string()],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::classifier;
    use super::*;
    use serde_json::json;

    #[test]
    fn recognizes_flat_listing_objects() {
        let doc = json!({
            "items": [
                {
                    "subject": "PSP 1000 console",
                    "urls": { "default": "https://www.subito.it/videogiochi/psp-1.htm?from=list" },
                    "price": "49 €",
                    "shippable": true
                }
            ]
        });

        let records = recognize_listings(&doc, &classifier(), Source::Structured);
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.title, "PSP 1000 console");
        assert_eq!(r.canonical_url, "https://www.subito.it/videogiochi/psp-1.htm");
        assert_eq!(r.price_value, Some(49.0));
        assert!(r.has_shipping);
        assert!(!r.is_sold);
        assert_eq!(r.source, Source::Structured);
    }

    #[test]
    fn reads_nested_price_and_sold_status() {
        let doc = json!({
            "ad": {
                "title": "PSP Street",
                "link": "/videogiochi/psp-street-2.htm",
                "features": { "/price": { "values": [{ "key": "35", "value": "35 €" }] } },
                "status": "VENDUTO"
            }
        });

        let records = recognize_listings(&doc, &classifier(), Source::Network);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].price_value, Some(35.0));
        assert!(records[0].is_sold);
        assert!(!records[0].has_shipping);
    }

    #[test]
    fn skips_objects_without_title_or_listing_url() {
        let doc = json!([
            { "url": "https://www.subito.it/videogiochi/psp-3.htm" },
            { "title": "Category page", "url": "https://www.subito.it/annunci-italia/" },
            { "title": "", "url": "https://www.subito.it/videogiochi/psp-4.htm" },
            "stray string",
            42
        ]);

        assert!(recognize_listings(&doc, &classifier(), Source::Structured).is_empty());
    }

    #[test]
    fn numeric_prices_keep_their_decimals() {
        let doc = json!({ "title": "PSP", "url": "/videogiochi/psp-7.htm", "price": 1234.5 });
        let records = recognize_listings(&doc, &classifier(), Source::Network);
        assert_eq!(records[0].price_text, "1234,5");
        assert_eq!(records[0].price_value, Some(1234.5));
    }

    #[test]
    fn dot_decimal_price_strings_are_not_read_as_thousands() {
        let doc = json!({
            "name": "PSP 1000",
            "url": "/videogiochi/psp-8.htm",
            "offers": { "@type": "Offer", "price": "40.00", "priceCurrency": "EUR" }
        });
        let records = recognize_listings(&doc, &classifier(), Source::Structured);
        assert_eq!(records[0].price_text, "40,00");
        assert_eq!(records[0].price_value, Some(40.0));
    }

    #[test]
    fn shipping_object_follows_its_availability_flag() {
        let doc = json!({
            "subject": "PSP",
            "url": "/videogiochi/psp-1.htm",
            "shipping": { "available": false, "cost": "6,90 €" }
        });
        let records = recognize_listings(&doc, &classifier(), Source::Network);
        assert_eq!(records.len(), 1);
        assert!(!records[0].has_shipping);
    }

    #[test]
    fn marker_in_query_string_is_not_a_listing() {
        let doc = json!({
            "title": "Cerca PSP",
            "url": "https://www.subito.it/annunci-italia/vendita/usato/?from=home.htm"
        });
        assert!(recognize_listings(&doc, &classifier(), Source::Structured).is_empty());
    }

    #[test]
    fn missing_price_is_empty_text() {
        let doc = json!({ "name": "PSP", "url": "/videogiochi/psp-5.htm" });
        let records = recognize_listings(&doc, &classifier(), Source::Structured);
        assert_eq!(records[0].price_text, "");
        assert_eq!(records[0].price_value, None);
    }

    #[test]
    fn first_seen_wins_within_a_document() {
        let doc = json!([
            { "title": "first", "url": "/videogiochi/psp-6.htm?a=1" },
            { "title": "second", "url": "/videogiochi/psp-6.htm?a=2" }
        ]);
        let records = recognize_listings(&doc, &classifier(), Source::Structured);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "first");
    }

    #[test]
    fn truthiness_of_loose_flags() {
        assert!(truthy(&json!(true)));
        assert!(truthy(&json!("yes")));
        assert!(truthy(&json!({ "enabled": 1 })));
        assert!(!truthy(&json!("false")));
        assert!(!truthy(&json!(0)));
        assert!(!truthy(&json!(null)));
        assert!(!truthy(&json!({ "available": false, "cost": "6,90 €" })));
        assert!(truthy(&json!({ "isAvailable": true, "cost": null })));
        assert!(!truthy(&json!({ "is_enabled": "no", "label": "Spedizione" })));
    }
}
