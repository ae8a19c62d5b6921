//! Classified-ads watcher: scrape configured searches, keep what is new and
//! matching, remember what was already seen.

pub mod classifier;
pub mod config;
pub mod extract;
pub mod filter;
pub mod history;
pub mod merge;
pub mod models;
pub mod normalize;
pub mod notify;
pub mod pipeline;
pub mod scrapers;

pub use config::{Config, SearchConfig};
pub use models::{ListingRecord, Source};
pub use pipeline::{Pipeline, RunReport};
