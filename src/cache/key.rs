//! Deterministic cache keys derived from request identity.

use sha2::{Digest, Sha256};
use url::form_urlencoded;

/// Identifier of a stored response.
///
/// Built from the endpoint path, the query parameters and the region.
/// Parameters are merged from the path's own query string and the explicit
/// list, then ordered by name (stable for repeated names), and the region is
/// lower-cased, so logically identical requests always map to the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for a request.
    pub fn derive(path: &str, params: &[(String, String)], region: Option<&str>) -> Self {
        Self::from_canonical(&canonical_form(path, params, region))
    }

    /// Hash an already canonical request string.
    pub fn from_canonical(canonical: &str) -> Self {
        let digest = Sha256::digest(canonical.as_bytes());
        Self(format!("{:x}", digest))
    }

    /// The key as a hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The canonical request string hashed into a [`CacheKey`].
///
/// Format: `<region>|<path>?<sorted, url-encoded params>`.
pub fn canonical_form(path: &str, params: &[(String, String)], region: Option<&str>) -> String {
    let (path, embedded) = match path.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (path, None),
    };

    let mut pairs: Vec<(String, String)> = embedded
        .map(|query| form_urlencoded::parse(query.as_bytes()).into_owned().collect())
        .unwrap_or_default();
    pairs.extend(params.iter().cloned());
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs.iter())
        .finish();

    let region = region.map(str::to_ascii_lowercase).unwrap_or_default();
    format!("{}|{}?{}", region, path, query)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parameter_order_does_not_matter() {
        let a = CacheKey::derive("/m/ids", &params(&[("start", "0"), ("count", "5")]), None);
        let b = CacheKey::derive("/m/ids", &params(&[("count", "5"), ("start", "0")]), None);
        assert_eq!(a, b);
    }

    #[test]
    fn test_embedded_query_matches_explicit_params() {
        let embedded = CacheKey::derive("/m/ids?count=5&start=0", &[], Some("europe"));
        let explicit = CacheKey::derive(
            "/m/ids",
            &params(&[("start", "0"), ("count", "5")]),
            Some("europe"),
        );
        assert_eq!(embedded, explicit);
    }

    #[test]
    fn test_region_casing_is_canonical() {
        let upper = CacheKey::derive("/a", &[], Some("EUW1"));
        let lower = CacheKey::derive("/a", &[], Some("euw1"));
        assert_eq!(upper, lower);
        assert_ne!(upper, CacheKey::derive("/a", &[], Some("na1")));
        assert_ne!(upper, CacheKey::derive("/a", &[], None));
    }

    #[test]
    fn test_distinct_values_differ() {
        let a = CacheKey::derive("/a", &params(&[("count", "5")]), None);
        let b = CacheKey::derive("/a", &params(&[("count", "6")]), None);
        assert_ne!(a, b);
    }

    #[test]
    fn test_repeated_names_keep_relative_order() {
        let form = canonical_form("/a", &params(&[("b", "1"), ("a", "2"), ("b", "0")]), None);
        assert_eq!(form, "|/a?a=2&b=1&b=0");
    }

    #[test]
    fn test_key_is_hex_sha256() {
        let key = CacheKey::derive("/a", &[], None);
        assert_eq!(key.as_str().len(), 64);
        assert!(key.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }
}
