//! URL handling for crawl targets
//!
//! - Validating caller-supplied target URLs
//! - Normalizing hosts into the domain keys used by profiles and telemetry
//! - Normalizing URLs into stable cache keys

mod domain;
mod normalize;

pub use domain::{extract_domain, normalize_domain, parse_target};
pub use normalize::{cache_key, normalize_url};
