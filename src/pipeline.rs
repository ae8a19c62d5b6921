//! Per-search orchestration: history → page → extraction → merge → filter →
//! history update, with failures isolated to the search that caused them.

use crate::classifier::UrlClassifier;
use crate::config::{BrowserConfig, HistoryMode, SearchConfig, SiteConfig};
use crate::extract::{self, DomOptions};
use crate::filter::{self, Rejection};
use crate::history;
use crate::merge::merge;
use crate::models::{ListingRecord, ListingSummary};
use crate::scrapers::{LivePage, PageSource};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, error, info, info_span, warn};

/// Steps of a single search. A failure is reported as a `SearchFailure`
/// carrying the step that was being attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Idle,
    HistoryLoaded,
    PageAcquired,
    Extracted,
    Merged,
    Filtered,
    HistoryUpdated,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::Idle => "idle",
            Stage::HistoryLoaded => "history loaded",
            Stage::PageAcquired => "page acquired",
            Stage::Extracted => "extracted",
            Stage::Merged => "merged",
            Stage::Filtered => "filtered",
            Stage::HistoryUpdated => "history updated",
            Stage::Done => "done",
        };
        f.write_str(label)
    }
}

/// A search that could not complete. `stage` is the step that was being
/// attempted.
#[derive(Debug, Clone, Serialize)]
pub struct SearchFailure {
    pub search: String,
    pub stage: Stage,
    pub reason: String,
}

/// New matches for one search
#[derive(Debug, Clone, Serialize)]
pub struct SearchMatches {
    pub search: String,
    pub listings: Vec<ListingSummary>,
}

/// Diagnostic counts for one completed search
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchStats {
    pub search: String,
    pub network: usize,
    pub structured: usize,
    pub dom: usize,
    pub merged: usize,
    pub matched: usize,
    pub rejected: BTreeMap<Rejection, usize>,
}

/// Everything one search produced
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub matches: Vec<ListingRecord>,
    pub stats: SearchStats,
    /// Set when the updated history could not be written
    pub save_error: Option<String>,
}

/// Aggregated result of a whole run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Only searches with at least one new match
    pub matches: Vec<SearchMatches>,
    pub failures: Vec<SearchFailure>,
    pub save_warnings: Vec<String>,
    pub stats: Vec<SearchStats>,
}

impl RunReport {
    pub fn new_match_count(&self) -> usize {
        self.matches.iter().map(|m| m.listings.len()).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.save_warnings.is_empty()
    }
}

/// Runs configured searches one after another against a page source
pub struct Pipeline<'a, S: PageSource> {
    source: &'a S,
    classifier: UrlClassifier,
    dom_options: DomOptions,
    min_json_body_bytes: usize,
}

impl<'a, S: PageSource> Pipeline<'a, S> {
    pub fn new(source: &'a S, site: &SiteConfig, browser: &BrowserConfig) -> Self {
        Self {
            source,
            classifier: site.classifier(),
            dom_options: browser.dom_options(),
            min_json_body_bytes: browser.min_json_body_bytes,
        }
    }

    /// Process every search; a failing search never stops the batch
    pub fn run(&self, searches: &[SearchConfig]) -> RunReport {
        let started_at = Utc::now();
        let mut matches = Vec::new();
        let mut failures = Vec::new();
        let mut save_warnings = Vec::new();
        let mut stats = Vec::new();

        for search in searches {
            let span = info_span!("search", search = %search.name);
            let _enter = span.enter();

            match self.run_search(search) {
                Ok(outcome) => {
                    if let Some(err) = outcome.save_error {
                        save_warnings.push(format!("{}: {}", search.name, err));
                    }
                    if !outcome.matches.is_empty() {
                        matches.push(SearchMatches {
                            search: search.name.clone(),
                            listings: outcome.matches.iter().map(ListingRecord::summary).collect(),
                        });
                    }
                    stats.push(outcome.stats);
                }
                Err(failure) => {
                    error!("Search failed at {}: {}", failure.stage, failure.reason);
                    failures.push(failure);
                }
            }
        }

        let report = RunReport {
            started_at,
            finished_at: Utc::now(),
            matches,
            failures,
            save_warnings,
            stats,
        };
        info!(
            "Run finished: {} new matches, {} failed searches",
            report.new_match_count(),
            report.failures.len()
        );
        report
    }

    /// Process one search from history load to history save
    pub fn run_search(&self, search: &SearchConfig) -> Result<SearchOutcome, SearchFailure> {
        let fail = |stage: Stage, reason: String| SearchFailure {
            search: search.name.clone(),
            stage,
            reason,
        };

        let mut stage = Stage::Idle;
        info!("Starting search via {} ({})", self.source.source_name(), stage);

        let known = history::load(&search.history_path);
        stage = Stage::HistoryLoaded;
        info!("{} URLs in history ({})", known.len(), stage);

        let page = self
            .source
            .acquire(search)
            .map_err(|e| fail(Stage::PageAcquired, format!("{:#}", e)))?;
        stage = Stage::PageAcquired;
        info!("Page ready ({})", stage);

        let (network, structured, dom) = self.extract_all(&page);
        if network.is_empty() && structured.is_empty() && dom.is_empty() {
            return Err(fail(
                Stage::Extracted,
                "no listings found by any extraction strategy".to_string(),
            ));
        }
        stage = Stage::Extracted;

        let mut stats = SearchStats {
            search: search.name.clone(),
            network: network.len(),
            structured: structured.len(),
            dom: dom.len(),
            ..SearchStats::default()
        };
        info!(
            "Extracted {} network, {} structured, {} dom records ({})",
            stats.network, stats.structured, stats.dom, stage
        );

        let merged = merge(network, structured, dom);
        stage = Stage::Merged;
        stats.merged = merged.len();
        debug!("{} distinct listings ({})", stats.merged, stage);

        let outcome = filter::filter(&merged, search, &known);
        stage = Stage::Filtered;
        stats.matched = outcome.matches.len();
        stats.rejected = outcome.rejected;
        info!("{} of {} listings are new matches ({})", stats.matched, stats.merged, stage);

        let mut updated = known;
        match search.history_mode {
            HistoryMode::AllObserved => {
                updated.extend(merged.iter().map(|r| r.canonical_url.clone()));
            }
            HistoryMode::NotifiedOnly => {
                updated.extend(outcome.matches.iter().map(|r| r.canonical_url.clone()));
            }
        }

        let save_error = match history::save(&search.history_path, &updated) {
            Ok(()) => None,
            Err(e) => {
                warn!("History not saved, matches may repeat next run: {:#}", e);
                Some(format!("{:#}", e))
            }
        };
        stage = Stage::HistoryUpdated;
        info!("History holds {} URLs ({})", updated.len(), stage);

        stage = Stage::Done;
        info!("Search {}", stage);

        Ok(SearchOutcome {
            matches: outcome.matches,
            stats,
            save_error,
        })
    }

    /// Run the three strategies in turn against the same page.
    ///
    /// Returns (network, structured, dom). A strategy that cannot read the
    /// page contributes nothing.
    fn extract_all(
        &self,
        page: &S::Page,
    ) -> (Vec<ListingRecord>, Vec<ListingRecord>, Vec<ListingRecord>) {
        let structured = match page.content() {
            Ok(html) => {
                let blobs = extract::embedded_blobs(&html);
                extract::extract_structured(&blobs, &self.classifier)
            }
            Err(e) => {
                warn!("Could not snapshot page for embedded data: {:#}", e);
                Vec::new()
            }
        };

        let dom = extract::extract_dom(page, &self.classifier, &self.dom_options);

        // Drained last so responses triggered by scrolling are included
        let responses = page.captured_responses();
        let network =
            extract::extract_network(&responses, &self.classifier, self.min_json_body_bytes);

        (network, structured, dom)
    }
}
