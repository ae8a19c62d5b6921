use super::recognize_listings;
use crate::classifier::UrlClassifier;
use crate::models::{ListingRecord, Source};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// One HTTP response observed while the page loaded
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedResponse {
    pub url: String,
    pub content_type: String,
    pub body: String,
}

impl CapturedResponse {
    pub fn is_json(&self) -> bool {
        self.content_type.to_lowercase().contains("json")
    }
}

/// Buffer that a capture hook appends to while a single page loads.
///
/// Cloning shares the buffer, so the hook and the extraction pass can each
/// hold one. A fresh collector is created for every search.
#[derive(Debug, Clone, Default)]
pub struct NetworkCollector {
    responses: Arc<Mutex<Vec<CapturedResponse>>>,
    min_body_bytes: usize,
}

impl NetworkCollector {
    pub fn new(min_body_bytes: usize) -> Self {
        Self {
            responses: Arc::default(),
            min_body_bytes,
        }
    }

    /// Whether a response with this content type is worth fetching at all
    pub fn wants(&self, content_type: &str) -> bool {
        content_type.to_lowercase().contains("json")
    }

    pub fn record(&self, response: CapturedResponse) {
        if !response.is_json() || response.body.len() < self.min_body_bytes {
            return;
        }
        match self.responses.lock() {
            Ok(mut responses) => responses.push(response),
            Err(poisoned) => poisoned.into_inner().push(response),
        }
    }

    /// Take everything captured so far
    pub fn drain(&self) -> Vec<CapturedResponse> {
        match self.responses.lock() {
            Ok(mut responses) => std::mem::take(&mut *responses),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

/// Network-capture strategy: recognize listings in intercepted JSON bodies.
///
/// Non-JSON and undersized responses are ignored; a body that fails to
/// decode is skipped without affecting the rest.
pub fn extract_network(
    responses: &[CapturedResponse],
    classifier: &UrlClassifier,
    min_body_bytes: usize,
) -> Vec<ListingRecord> {
    let mut records = Vec::new();

    for response in responses {
        if !response.is_json() || response.body.len() < min_body_bytes {
            continue;
        }

        match serde_json::from_str::<serde_json::Value>(&response.body) {
            Ok(value) => {
                let found = recognize_listings(&value, classifier, Source::Network);
                if !found.is_empty() {
                    debug!("{} listings in response from {}", found.len(), response.url);
                }
                records.extend(found);
            }
            Err(e) => debug!("Undecodable JSON from {}: {}", response.url, e),
        }
    }

    super::dedup_first_seen(records)
}
