use crate::config::SearchConfig;
use crate::extract::CapturedResponse;
use anyhow::Result;

/// A rendered page the extractor can read and scroll.
///
/// Implementations own any waiting: each call either returns within its own
/// timeout or fails.
pub trait LivePage {
    /// Current rendered HTML
    fn content(&self) -> Result<String>;

    /// Trigger loading of further lazy content
    fn scroll(&self) -> Result<()>;

    /// JSON responses observed since navigation began. Each call returns
    /// only what arrived since the previous one.
    fn captured_responses(&self) -> Vec<CapturedResponse>;
}

/// Hands the pipeline a loaded page for a search.
///
/// This allows swapping the real browser for an in-memory fake in tests.
pub trait PageSource {
    type Page: LivePage;

    /// Navigate to the search endpoint and wait for listing content
    fn acquire(&self, search: &SearchConfig) -> Result<Self::Page>;

    /// Name used in logs
    fn source_name(&self) -> &'static str;
}
