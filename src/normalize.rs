//! Price and marker parsing for free-form listing text.
//!
//! Prices follow the Italian/European convention: `.` groups thousands and
//! `,` separates decimals, so "1.234,56 €" is 1234.56.

use regex::Regex;
use std::sync::LazyLock;

/// Substrings that mark a listing as sold or no longer available
const SOLD_MARKERS: &[&str] = &[
    "venduto",
    "venduta",
    "venduti",
    "vendute",
    "non disponibile",
    "esaurito",
    "sold out",
];

/// Substrings that indicate remote delivery is offered
const SHIPPING_MARKERS: &[&str] = &[
    "spedizione",
    "spedibile",
    "spedito",
    "consegna a domicilio",
    "shipping",
];

static NUMBER_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d[\d.]*(?:,\d+)?").expect("valid number regex"));

/// A bare amount with a decimal point, as machine-written data carries it
static DOT_DECIMAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\d{1,2}$").expect("valid decimal regex"));

static CURRENCY_AMOUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\d[\d.]*(?:,\d+)?\s?€)|(?:€\s?\d[\d.]*(?:,\d+)?)")
        .expect("valid currency regex")
});

/// Parse localized price text into a number.
///
/// Returns `None` for empty text or text without digits. Never panics on
/// malformed input.
pub fn parse_price(text: &str) -> Option<f64> {
    let run = NUMBER_RUN.find(text)?.as_str();
    let normalized: String = run
        .chars()
        .filter(|c| *c != '.')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    normalized.parse::<f64>().ok()
}

/// Rewrite a bare dot-decimal amount such as "40.00" into page notation
/// ("40,00") so `parse_price` reads it correctly. Anything else is returned
/// unchanged, including thousands-grouped text like "1.234".
pub fn localize_decimal(text: &str) -> String {
    let trimmed = text.trim();
    if DOT_DECIMAL.is_match(trimmed) {
        trimmed.replace('.', ",")
    } else {
        text.to_string()
    }
}

/// Case-insensitive check for any "sold" synonym
pub fn is_sold_marker(text: &str) -> bool {
    contains_any(text, SOLD_MARKERS)
}

pub fn has_shipping_marker(text: &str) -> bool {
    contains_any(text, SHIPPING_MARKERS)
}

/// Last currency-shaped substring in `text`, e.g. "49,00 €" out of a card's
/// full visible text
pub fn last_currency_amount(text: &str) -> Option<String> {
    CURRENCY_AMOUNT
        .find_iter(text)
        .last()
        .map(|m| m.as_str().trim().to_string())
}

fn contains_any(text: &str, vocabulary: &[&str]) -> bool {
    let lower = text.to_lowercase();
    vocabulary.iter().any(|marker| lower.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_european_prices() {
        assert_eq!(parse_price("49,00 €"), Some(49.0));
        assert_eq!(parse_price("1.234,56 €"), Some(1234.56));
        assert_eq!(parse_price("€ 120"), Some(120.0));
        assert_eq!(parse_price("Prezzo: 15 € trattabili"), Some(15.0));
    }

    #[test]
    fn dot_decimal_amounts_are_localized() {
        assert_eq!(localize_decimal("40.00"), "40,00");
        assert_eq!(localize_decimal(" 7.5 "), "7,5");
        assert_eq!(parse_price(&localize_decimal("80.00")), Some(80.0));
        assert_eq!(localize_decimal("1.234"), "1.234");
        assert_eq!(localize_decimal("1.234,56 €"), "1.234,56 €");
        assert_eq!(localize_decimal("49 €"), "49 €");
    }

    #[test]
    fn unparseable_prices_are_absent() {
        assert_eq!(parse_price("N/D"), None);
        assert_eq!(parse_price(""), None);
        assert_eq!(parse_price("   "), None);
        assert_eq!(parse_price("gratis"), None);
    }

    #[test]
    fn takes_first_numeric_run() {
        assert_eq!(parse_price("30 € invece di 45 €"), Some(30.0));
    }

    #[test]
    fn detects_sold_markers() {
        assert!(is_sold_marker("Venduto"));
        assert!(is_sold_marker("49 € - VENDUTA"));
        assert!(is_sold_marker("Non disponibile"));
        assert!(!is_sold_marker("Disponibile"));
        assert!(!is_sold_marker("PSP 1000 console"));
        assert!(!is_sold_marker("Soldatini per PSP"));
        assert!(is_sold_marker("Sold out"));
    }

    #[test]
    fn detects_shipping_vocabulary() {
        assert!(has_shipping_marker("PSP 49 € Spedizione disponibile"));
        assert!(!has_shipping_marker("Solo ritiro a mano"));
    }

    #[test]
    fn finds_last_currency_amount() {
        assert_eq!(
            last_currency_amount("PSP 1000 - 3 giochi 10 € 49,00 €").as_deref(),
            Some("49,00 €")
        );
        assert_eq!(last_currency_amount("€ 35 Roma").as_deref(), Some("€ 35"));
        assert_eq!(last_currency_amount("nessun prezzo"), None);
    }
}
