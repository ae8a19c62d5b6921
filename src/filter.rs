//! Match engine: decides which merged listings are new and worth reporting.

use crate::config::{SearchConfig, UnknownPricePolicy};
use crate::history::HistorySet;
use crate::models::ListingRecord;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Why a listing was not reported, in evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    NoShipping,
    Sold,
    ExcludedKeyword,
    MissingKeyword,
    OverBudget,
    UnknownPrice,
    AlreadySeen,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Rejection::NoShipping => "no shipping",
            Rejection::Sold => "sold",
            Rejection::ExcludedKeyword => "excluded keyword",
            Rejection::MissingKeyword => "missing keyword",
            Rejection::OverBudget => "over budget",
            Rejection::UnknownPrice => "unknown price",
            Rejection::AlreadySeen => "already seen",
        };
        f.write_str(label)
    }
}

/// Result of one filter pass
#[derive(Debug, Clone, Default)]
pub struct FilterOutcome {
    pub matches: Vec<ListingRecord>,
    pub rejected: BTreeMap<Rejection, usize>,
}

/// Keyword lists lowercased once per search
struct Keywords {
    include: Vec<String>,
    exclude: Vec<String>,
}

impl Keywords {
    fn new(config: &SearchConfig) -> Self {
        let normalize = |words: &[String]| -> Vec<String> {
            words
                .iter()
                .map(|w| w.trim().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect()
        };
        Self {
            include: normalize(&config.include_keywords),
            exclude: normalize(&config.exclude_keywords),
        }
    }
}

/// Evaluate one record; the first failing rule wins.
pub fn check(
    record: &ListingRecord,
    config: &SearchConfig,
    history: &HistorySet,
) -> Result<(), Rejection> {
    check_with(record, config, &Keywords::new(config), history)
}

fn check_with(
    record: &ListingRecord,
    config: &SearchConfig,
    keywords: &Keywords,
    history: &HistorySet,
) -> Result<(), Rejection> {
    if config.require_shipping && !record.has_shipping {
        return Err(Rejection::NoShipping);
    }

    if record.is_sold {
        return Err(Rejection::Sold);
    }

    let title = record.title.to_lowercase();
    if keywords.exclude.iter().any(|kw| title.contains(kw.as_str())) {
        return Err(Rejection::ExcludedKeyword);
    }
    if !keywords.include.is_empty() && !keywords.include.iter().any(|kw| title.contains(kw.as_str())) {
        return Err(Rejection::MissingKeyword);
    }

    match record.price_value {
        Some(price) if price > config.price_ceiling => return Err(Rejection::OverBudget),
        None if config.unknown_price == UnknownPricePolicy::Reject => {
            return Err(Rejection::UnknownPrice)
        }
        _ => {}
    }

    if history.contains(&record.canonical_url) {
        return Err(Rejection::AlreadySeen);
    }

    Ok(())
}

/// Keep the records that pass every rule, counting rejections per rule
pub fn filter(records: &[ListingRecord], config: &SearchConfig, history: &HistorySet) -> FilterOutcome {
    let keywords = Keywords::new(config);
    let mut outcome = FilterOutcome::default();

    for record in records {
        match check_with(record, config, &keywords, history) {
            Ok(()) => outcome.matches.push(record.clone()),
            Err(reason) => *outcome.rejected.entry(reason).or_default() += 1,
        }
    }

    outcome
}
