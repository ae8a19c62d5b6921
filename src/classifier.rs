//! Listing-link recognition and URL canonicalization.

use serde_json::Value;
use url::Url;

/// Object keys that may hold a link, matched as lowercase substrings
const URL_KEY_FRAGMENTS: &[&str] = &["url", "href", "link"];

/// Matched only as a key suffix, so "security" is not a link key
const URI_SUFFIX: &str = "uri";

/// Nesting limit for candidate unwrapping
const MAX_CANDIDATE_DEPTH: usize = 8;

/// Decides which URLs point at listing detail pages
#[derive(Debug, Clone)]
pub struct UrlClassifier {
    base_url: String,
    trusted_hosts: Vec<String>,
    path_markers: Vec<String>,
}

impl UrlClassifier {
    pub fn new(base_url: &str, trusted_hosts: &[String], path_markers: &[String]) -> Self {
        Self {
            base_url: base_url.to_string(),
            trusted_hosts: trusted_hosts.iter().map(|h| h.to_lowercase()).collect(),
            path_markers: path_markers.to_vec(),
        }
    }

    /// Test a plain string candidate
    pub fn is_listing_str(&self, candidate: &str) -> bool {
        let candidate = candidate.trim();
        if candidate.is_empty() {
            return false;
        }

        // Markers only count in the path; canonicalization drops the rest
        let path_end = candidate.find(['?', '#']).unwrap_or(candidate.len());
        let path = &candidate[..path_end];
        let has_marker = self.path_markers.iter().any(|m| path.contains(m.as_str()));
        if !has_marker {
            return false;
        }

        let lower = candidate.to_lowercase();
        let trusted = self.trusted_hosts.iter().any(|host| {
            lower
                .strip_prefix(host.trim_end_matches('/'))
                .is_some_and(|rest| rest.starts_with('/'))
        });
        if trusted {
            return true;
        }

        // Root-relative, but not protocol-relative
        candidate.starts_with('/') && !candidate.starts_with("//")
    }

    /// Test an untyped candidate: a string, a mapping with url-like keys, or a
    /// list of candidates.
    pub fn is_listing_url(&self, candidate: &Value) -> bool {
        self.resolve(candidate).is_some()
    }

    /// Unwrap `candidate` down to the first string that is a listing URL.
    ///
    /// Mappings are searched through their url-like keys first, then through
    /// every other value; lists are searched in order.
    pub fn resolve(&self, candidate: &Value) -> Option<String> {
        self.resolve_at(candidate, 0)
    }

    fn resolve_at(&self, candidate: &Value, depth: usize) -> Option<String> {
        if depth > MAX_CANDIDATE_DEPTH {
            return None;
        }

        match candidate {
            Value::String(s) => self.is_listing_str(s).then(|| s.trim().to_string()),
            Value::Array(items) => items.iter().find_map(|item| self.resolve_at(item, depth + 1)),
            Value::Object(map) => {
                let (url_like, other): (Vec<_>, Vec<_>) =
                    map.iter().partition(|(key, _)| is_url_key(key));
                url_like
                    .into_iter()
                    .chain(other)
                    .find_map(|(_, value)| self.resolve_at(value, depth + 1))
            }
            _ => None,
        }
    }

    /// Canonicalize against this classifier's base URL
    pub fn canonicalize(&self, url: &str) -> Option<String> {
        canonicalize(url, &self.base_url)
    }
}

pub fn is_url_key(key: &str) -> bool {
    let key = key.to_lowercase();
    key.ends_with(URI_SUFFIX) || URL_KEY_FRAGMENTS.iter().any(|fragment| key.contains(fragment))
}

/// Resolve `url` against `base` and strip query string and fragment.
///
/// Returns `None` when the result is not a valid http(s) URL.
pub fn canonicalize(url: &str, base: &str) -> Option<String> {
    let url = url.trim();
    if url.is_empty() {
        return None;
    }

    let base = Url::parse(base).ok()?;
    let mut resolved = base.join(url).ok()?;
    if !matches!(resolved.scheme(), "http" | "https") {
        return None;
    }

    resolved.set_query(None);
    resolved.set_fragment(None);
    Some(resolved.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const BASE: &str = "https://www.subito.it";

    fn classifier() -> UrlClassifier {
        UrlClassifier::new(
            BASE,
            &["https://www.subito.it".to_string()],
            &[".htm".to_string()],
        )
    }

    #[test]
    fn accepts_trusted_absolute_listing_urls() {
        let c = classifier();
        assert!(c.is_listing_str("https://www.subito.it/videogiochi/psp-1000-roma-123.htm"));
        assert!(c.is_listing_str("HTTPS://WWW.SUBITO.IT/videogiochi/psp-123.htm"));
        assert!(!c.is_listing_str("https://www.subito.it/annunci-italia/vendita/usato/?q=psp"));
        assert!(!c.is_listing_str("https://evil.example/videogiochi/psp-123.htm"));
        assert!(!c.is_listing_str("https://www.subito.it.evil.example/psp-123.htm"));
    }

    #[test]
    fn accepts_root_relative_paths() {
        let c = classifier();
        assert!(c.is_listing_str("/videogiochi/psp-123.htm"));
        assert!(!c.is_listing_str("//cdn.example/psp-123.htm"));
        assert!(!c.is_listing_str("videogiochi/psp-123.htm"));
        assert!(!c.is_listing_str(""));
    }

    #[test]
    fn marker_must_be_in_the_path() {
        let c = classifier();
        assert!(!c.is_listing_str("https://www.subito.it/annunci-italia/vendita/usato/?from=home.htm"));
        assert!(!c.is_listing_str("/annunci-italia/vendita/usato/#home.htm"));
        assert!(c.is_listing_str("/videogiochi/psp-123.htm?from=home.htm"));

        let canonical = c.canonicalize("/videogiochi/psp-123.htm?from=x").unwrap();
        assert!(c.is_listing_str(&canonical));
    }

    #[test]
    fn url_keys_by_fragment_and_suffix() {
        assert!(is_url_key("imageUrl"));
        assert!(is_url_key("canonicalUri"));
        assert!(is_url_key("permalink"));
        assert!(!is_url_key("security"));
        assert!(!is_url_key("subject"));
    }

    #[test]
    fn unwraps_nested_candidates() {
        let c = classifier();
        let nested = json!({
            "urls": { "default": "https://www.subito.it/videogiochi/psp-123.htm" }
        });
        assert_eq!(
            c.resolve(&nested).as_deref(),
            Some("https://www.subito.it/videogiochi/psp-123.htm")
        );

        let list = json!(["not a url", { "href": "/videogiochi/psp-9.htm" }]);
        assert_eq!(c.resolve(&list).as_deref(), Some("/videogiochi/psp-9.htm"));
    }

    #[test]
    fn rejects_non_string_candidates() {
        let c = classifier();
        assert!(!c.is_listing_url(&json!(42)));
        assert!(!c.is_listing_url(&json!(null)));
        assert!(!c.is_listing_url(&json!(true)));
        assert!(!c.is_listing_url(&json!({})));
        assert!(!c.is_listing_url(&json!([])));
    }

    #[test]
    fn canonicalize_strips_query_and_fragment() {
        let a = canonicalize("https://www.subito.it/videogiochi/psp-123.htm?utm_source=x#top", BASE);
        let b = canonicalize("/videogiochi/psp-123.htm?ref=search", BASE);
        assert_eq!(a.as_deref(), Some("https://www.subito.it/videogiochi/psp-123.htm"));
        assert_eq!(a, b);
    }

    #[test]
    fn canonicalize_is_idempotent() {
        let urls = [
            "/videogiochi/psp-123.htm?x=1",
            "https://WWW.Subito.it/videogiochi/psp-123.htm#frag",
            "https://www.subito.it",
            "https://www.subito.it/a/../b/psp.htm",
        ];
        for raw in urls {
            let once = canonicalize(raw, BASE).expect("canonical");
            let twice = canonicalize(&once, BASE).expect("canonical");
            assert_eq!(once, twice, "not idempotent for {raw}");
        }
    }

    #[test]
    fn canonicalize_rejects_garbage() {
        assert_eq!(canonicalize("", BASE), None);
        assert_eq!(canonicalize("mailto:someone@example.com", BASE), None);
        assert_eq!(canonicalize("/x.htm", "not a base"), None);
    }
}
