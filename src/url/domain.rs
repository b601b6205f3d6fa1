use crate::{UrlError, UrlResult};
use url::Url;

/// Normalizes a host name into a domain key
///
/// Lower-cases the host, drops a trailing dot and strips a leading `www.`.
/// Profiles, the performance ledger and the attempt monitor are all keyed
/// by this value.
///
/// # Examples
///
/// ```
/// use quillscout::url::normalize_domain;
///
/// assert_eq!(normalize_domain("WWW.Example.COM"), "example.com");
/// assert_eq!(normalize_domain("blog.example.com"), "blog.example.com");
/// ```
pub fn normalize_domain(host: &str) -> String {
    let lowered = host.trim().trim_end_matches('.').to_lowercase();
    match lowered.strip_prefix("www.") {
        Some(rest) if !rest.is_empty() => rest.to_string(),
        _ => lowered,
    }
}

/// Extracts the normalized domain from a URL
///
/// # Returns
///
/// * `Some(String)` - The normalized domain
/// * `None` - If the URL has no host
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str()
        .map(normalize_domain)
        .filter(|domain| !domain.is_empty())
}

/// Parses and validates a caller-supplied crawl target
///
/// Only `http` and `https` URLs with a host are accepted. Anything else is an
/// input error that the orchestrator reports without retrying.
///
/// # Arguments
///
/// * `input` - The raw URL string
///
/// # Returns
///
/// * `Ok(Url)` - The parsed target
/// * `Err(UrlError)` - The input is malformed, has an unsupported scheme, or no host
pub fn parse_target(input: &str) -> UrlResult<Url> {
    let url = Url::parse(input.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    if extract_domain(&url).is_none() {
        return Err(UrlError::MissingDomain);
    }

    Ok(url)
}
