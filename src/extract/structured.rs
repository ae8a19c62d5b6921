use super::recognize_listings;
use crate::classifier::UrlClassifier;
use crate::models::{ListingRecord, Source};
use scraper::{Html, Selector};
use std::sync::LazyLock;
use tracing::debug;

static EMBEDDED_DATA: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"script#__NEXT_DATA__, script[type="application/ld+json"]"#)
        .expect("valid embedded data selector")
});

/// Raw text of the page-bootstrap and linked-data scripts in `html`
pub fn embedded_blobs(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    document
        .select(&EMBEDDED_DATA)
        .map(|script| script.text().collect::<String>())
        .filter(|text| !text.trim().is_empty())
        .collect()
}

/// Structured-data strategy: recognize listings inside embedded JSON blobs.
///
/// Blobs that fail to parse are skipped.
pub fn extract_structured(blobs: &[String], classifier: &UrlClassifier) -> Vec<ListingRecord> {
    let mut records = Vec::new();

    for (idx, blob) in blobs.iter().enumerate() {
        match serde_json::from_str::<serde_json::Value>(blob) {
            Ok(value) => {
                let found = recognize_listings(&value, classifier, Source::Structured);
                debug!("Embedded blob {} yielded {} listings", idx, found.len());
                records.extend(found);
            }
            Err(e) => debug!("Skipping embedded blob {}: {}", idx, e),
        }
    }

    super::dedup_first_seen(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::test_support::classifier;

    const PAGE: &str = r#"
        <html><head>
        <script id="__NEXT_DATA__" type="application/json">
          {"props":{"pageProps":{"items":[
            {"subject":"PSP 1000 console","urls":{"default":"https://www.subito.it/videogiochi/psp-1.htm"},
             "features":{"/price":{"values":[{"key":"49","value":"49 €"}]}},"shippable":true}
          ]}}}
        </script>
        <script type="application/ld+json">
          {"@type":"ItemList","itemListElement":[
            {"@type":"ListItem","item":{"name":"PSP Go","url":"https://www.subito.it/videogiochi/psp-go-2.htm",
             "offers":{"price":"80.00"}}}
          ]}
        </script>
        <script type="text/javascript">var x = 1;</script>
        </head><body></body></html>
    "#;

    #[test]
    fn finds_bootstrap_and_linked_data_scripts() {
        let blobs = embedded_blobs(PAGE);
        assert_eq!(blobs.len(), 2);
    }

    #[test]
    fn extracts_from_all_blobs() {
        let records = extract_structured(&embedded_blobs(PAGE), &classifier());
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.source == Source::Structured));

        let psp = records.iter().find(|r| r.title == "PSP 1000 console").unwrap();
        assert_eq!(psp.price_value, Some(49.0));
        assert!(psp.has_shipping);

        let go = records.iter().find(|r| r.title == "PSP Go").unwrap();
        assert_eq!(go.price_value, Some(80.0));
    }

    #[test]
    fn malformed_blob_does_not_hide_good_ones() {
        let blobs = vec![
            "{ not json".to_string(),
            r#"{"title":"PSP","url":"/videogiochi/psp-3.htm"}"#.to_string(),
        ];
        let records = extract_structured(&blobs, &classifier());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].canonical_url, "https://www.subito.it/videogiochi/psp-3.htm");
    }
}
