use serde::{Deserialize, Serialize};

/// Which extraction path produced a listing
///
/// Declaration order is merge precedence: earlier variants win.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Network,
    Structured,
    Dom,
}

/// One observed classified-ad listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListingRecord {
    /// Absolute, query/fragment-stripped identity key
    pub canonical_url: String,
    /// URL as it appeared on the page or in a payload
    pub raw_url: String,
    pub title: String,
    /// Free-form price text, e.g. "49,00 €" or "N/D"
    pub price_text: String,
    pub price_value: Option<f64>,
    pub has_shipping: bool,
    pub is_sold: bool,
    /// Provenance, only consulted by the merger
    pub source: Source,
}

impl ListingRecord {
    pub fn summary(&self) -> ListingSummary {
        ListingSummary {
            title: self.title.clone(),
            price_text: self.price_text.clone(),
            canonical_url: self.canonical_url.clone(),
        }
    }
}

/// What the notifier needs to know about a new match
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListingSummary {
    pub title: String,
    pub price_text: String,
    pub canonical_url: String,
}
