use crate::url::domain::normalize_domain;
use sha2::{Digest, Sha256};
use url::Url;

/// Query parameters that never change page content
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "mc_eid",
];

/// Normalizes a URL for cache lookups
///
/// # Normalization Steps
///
/// 1. Normalize the host into its domain form (lower-case, no `www.`)
/// 2. Remove the trailing slash from non-root paths
/// 3. Remove the fragment
/// 4. Remove tracking query parameters and sort the rest
///
/// The scheme and port are kept: `http` and `https` variants may serve
/// different content.
///
/// # Examples
///
/// ```
/// use quillscout::url::normalize_url;
/// use url::Url;
///
/// let url = Url::parse("https://WWW.Example.com/post/?b=2&a=1&utm_source=x#top").unwrap();
/// assert_eq!(normalize_url(&url).as_str(), "https://example.com/post?a=1&b=2");
/// ```
pub fn normalize_url(url: &Url) -> Url {
    let mut normalized = url.clone();

    if let Some(host) = url.host_str() {
        let domain = normalize_domain(host);
        if domain != host && normalized.set_host(Some(&domain)).is_err() {
            tracing::trace!("Keeping original host for {}", url);
        }
    }

    let path = normalized.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        normalized.set_path(path.trim_end_matches('/'));
    }

    normalized.set_fragment(None);

    if normalized.query().is_some() {
        let mut params: Vec<(String, String)> = normalized
            .query_pairs()
            .filter(|(key, _)| !TRACKING_PARAMS.contains(&key.as_ref()))
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        params.sort();

        if params.is_empty() {
            normalized.set_query(None);
        } else {
            normalized
                .query_pairs_mut()
                .clear()
                .extend_pairs(params.iter());
        }
    }

    normalized
}

/// Computes the cache key of a URL: hex SHA-256 of its normalized form
pub fn cache_key(url: &Url) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_url(url).as_str().as_bytes());
    hex::encode(hasher.finalize())
}
