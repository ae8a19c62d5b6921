//! Run configuration: site rules, browser behavior and the searches to watch.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::classifier::UrlClassifier;
use crate::extract::DomOptions;

/// Top-level configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub searches: Vec<SearchConfig>,
}

/// Rules describing what a listing URL looks like on the target site
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Base for resolving relative links
    pub base_url: String,
    /// Absolute URL prefixes considered part of the site
    pub trusted_hosts: Vec<String>,
    /// Path fragments that only appear in listing detail URLs
    pub listing_path_markers: Vec<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.subito.it".to_string(),
            trusted_hosts: vec![
                "https://www.subito.it".to_string(),
                "http://www.subito.it".to_string(),
            ],
            listing_path_markers: vec![".htm".to_string()],
        }
    }
}

impl SiteConfig {
    pub fn classifier(&self) -> UrlClassifier {
        UrlClassifier::new(&self.base_url, &self.trusted_hosts, &self.listing_path_markers)
    }
}

/// Headless browser behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    /// CSS selector whose presence means listing cards have rendered
    pub content_selector: String,
    pub content_timeout_secs: u64,
    /// Text of the cookie-consent button to click, if shown
    pub consent_button_text: String,
    pub consent_timeout_secs: u64,
    pub scroll_pause_ms: u64,
    pub scroll_step_px: u32,
    pub max_scroll_rounds: usize,
    pub target_cards: usize,
    /// Captured JSON bodies shorter than this are ignored
    pub min_json_body_bytes: usize,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1920,
            window_height: 1080,
            content_selector: r#"div[class*="SmallCard-module_card__"]"#.to_string(),
            content_timeout_secs: 30,
            consent_button_text: "Accetta".to_string(),
            consent_timeout_secs: 10,
            scroll_pause_ms: 2000,
            scroll_step_px: 1000,
            max_scroll_rounds: 8,
            target_cards: 40,
            min_json_body_bytes: 200,
        }
    }
}

impl BrowserConfig {
    pub fn content_timeout(&self) -> Duration {
        Duration::from_secs(self.content_timeout_secs)
    }

    pub fn consent_timeout(&self) -> Duration {
        Duration::from_secs(self.consent_timeout_secs)
    }

    pub fn scroll_pause(&self) -> Duration {
        Duration::from_millis(self.scroll_pause_ms)
    }

    pub fn dom_options(&self) -> DomOptions {
        DomOptions {
            target_cards: self.target_cards,
            max_rounds: self.max_scroll_rounds,
        }
    }
}

/// How a listing with an unparseable price is treated by the ceiling rule
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UnknownPricePolicy {
    #[default]
    Pass,
    Reject,
}

/// Which canonical URLs are added to history after a successful pass
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HistoryMode {
    /// Every listing seen on the page, matching or not
    #[default]
    AllObserved,
    /// Only listings that were reported as new matches
    NotifiedOnly,
}

/// One monitored search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub name: String,
    /// Search results page to load
    pub url: String,
    pub price_ceiling: f64,
    #[serde(default)]
    pub include_keywords: Vec<String>,
    #[serde(default)]
    pub exclude_keywords: Vec<String>,
    #[serde(default)]
    pub require_shipping: bool,
    pub history_path: PathBuf,
    #[serde(default)]
    pub unknown_price: UnknownPricePolicy,
    #[serde(default)]
    pub history_mode: HistoryMode,
}

impl Config {
    /// Load configuration from a TOML file and validate it
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        let config = Self::from_toml(&content)
            .with_context(|| format!("Invalid config file '{}'", path.display()))?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Report every problem at once instead of stopping at the first
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        if url::Url::parse(&self.site.base_url).is_err() {
            errors.push(format!("site.base_url '{}' is not a valid URL", self.site.base_url));
        }
        if self.site.trusted_hosts.is_empty() {
            errors.push("site.trusted_hosts must not be empty".to_string());
        }
        if self.site.listing_path_markers.iter().all(|m| m.trim().is_empty()) {
            errors.push("site.listing_path_markers must contain a non-empty marker".to_string());
        }

        if self.browser.max_scroll_rounds == 0 {
            errors.push("browser.max_scroll_rounds must be positive".to_string());
        }
        if self.browser.content_timeout_secs == 0 {
            errors.push("browser.content_timeout_secs must be positive".to_string());
        }

        if self.searches.is_empty() {
            errors.push("at least one [[searches]] entry is required".to_string());
        }

        let mut history_paths = std::collections::HashSet::new();
        for (idx, search) in self.searches.iter().enumerate() {
            let label = if search.name.trim().is_empty() {
                format!("searches[{}]", idx)
            } else {
                format!("search '{}'", search.name)
            };

            if search.name.trim().is_empty() {
                errors.push(format!("{}: name must not be empty", label));
            }
            if url::Url::parse(&search.url).is_err() {
                errors.push(format!("{}: url '{}' is not a valid URL", label, search.url));
            }
            if !search.price_ceiling.is_finite() || search.price_ceiling < 0.0 {
                errors.push(format!("{}: price_ceiling must be a non-negative number", label));
            }
            if search.history_path.as_os_str().is_empty() {
                errors.push(format!("{}: history_path must not be empty", label));
            } else if !history_paths.insert(search.history_path.clone()) {
                errors.push(format!(
                    "{}: history_path '{}' is shared with another search",
                    label,
                    search.history_path.display()
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            anyhow::bail!("Configuration errors:\n  - {}", errors.join("\n  - "))
        }
    }
}
