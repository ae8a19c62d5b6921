use super::build_record;
use crate::classifier::UrlClassifier;
use crate::models::{ListingRecord, Source};
use crate::normalize::{has_shipping_marker, is_sold_marker, last_currency_amount};
use crate::scrapers::LivePage;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::{debug, info, warn};

static ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid anchor selector"));
static HEADING: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1, h2, h3, h4, h5, h6").expect("valid heading selector"));
static PRICE: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(
        r#"[class*="price"], [class*="Price"], [data-testid*="price"], [itemprop="price"]"#,
    )
    .expect("valid price selector")
});

/// Scroll loop limits for the DOM strategy
#[derive(Debug, Clone, Copy)]
pub struct DomOptions {
    /// Stop once this many distinct cards were collected
    pub target_cards: usize,
    /// Maximum number of snapshot/scroll rounds
    pub max_rounds: usize,
}

impl Default for DomOptions {
    fn default() -> Self {
        Self {
            target_cards: 40,
            max_rounds: 8,
        }
    }
}

/// DOM strategy: scan rendered anchors, scrolling to pull in lazy-loaded
/// cards until enough were found or the round budget runs out.
///
/// Errors from the page end the loop early and keep what was gathered.
pub fn extract_dom(
    page: &dyn LivePage,
    classifier: &UrlClassifier,
    options: &DomOptions,
) -> Vec<ListingRecord> {
    let mut seen = HashSet::new();
    let mut records = Vec::new();

    for round in 0..options.max_rounds {
        let html = match page.content() {
            Ok(html) => html,
            Err(e) => {
                warn!("DOM snapshot failed in round {}: {:#}", round, e);
                break;
            }
        };

        let before = records.len();
        scan_anchors(&html, classifier, &mut seen, &mut records);
        debug!("Round {}: {} new cards ({} total)", round, records.len() - before, records.len());

        if records.len() >= options.target_cards {
            break;
        }
        if round + 1 < options.max_rounds {
            if let Err(e) = page.scroll() {
                warn!("Scroll failed in round {}: {:#}", round, e);
                break;
            }
        }
    }

    info!("DOM strategy collected {} cards", records.len());
    records
}

/// Scan one HTML snapshot. Cards whose canonical URL is already in `seen`
/// are skipped, so the first sighting wins.
pub fn scan_anchors(
    html: &str,
    classifier: &UrlClassifier,
    seen: &mut HashSet<String>,
    out: &mut Vec<ListingRecord>,
) {
    let document = Html::parse_document(html);

    for anchor in document.select(&ANCHOR) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        if !classifier.is_listing_str(href) {
            continue;
        }
        let Some(canonical) = classifier.canonicalize(href) else {
            continue;
        };
        if seen.contains(&canonical) {
            continue;
        }

        let Some(title) = card_title(&anchor) else {
            debug!("No title for card {}", href);
            continue;
        };

        let visible = visible_text(&anchor);
        let price_text = anchor
            .select(&PRICE)
            .map(|el| visible_text(&el))
            .find(|text| !text.is_empty())
            .or_else(|| last_currency_amount(&visible))
            .unwrap_or_default();

        if let Some(record) = build_record(
            classifier,
            href,
            title,
            price_text,
            has_shipping_marker(&visible),
            is_sold_marker(&visible),
            Source::Dom,
        ) {
            seen.insert(canonical);
            out.push(record);
        }
    }
}

fn card_title(anchor: &ElementRef) -> Option<String> {
    anchor
        .select(&HEADING)
        .map(|heading| visible_text(&heading))
        .find(|text| !text.is_empty())
        .or_else(|| {
            anchor
                .value()
                .attr("aria-label")
                .map(|label| label.replace('\u{a0}', " ").trim().to_string())
                .filter(|label| !label.is_empty())
        })
}

fn visible_text(element: &ElementRef) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
