//! Fetcher variants
//!
//! Each fetcher turns a URL into raw markup or fails with a [`FetchError`]:
//! - [`LightweightFetcher`]: plain HTTP GET with browser-like headers, retries
//!   and a global concurrency bound
//! - [`RenderingFetcher`]: a disposable headless browser session per fetch
//! - [`AdvancedRenderingFetcher`]: rendering plus anti-automation-detection
//!   measures and a short-lived in-session page cache
//! - [`HybridFetcher`]: lightweight first, rendering when the markup looks
//!   script-built
//!
//! Browser sessions run on their own tasks, bounded by a [`SessionPool`], so
//! they never stall the tasks that drive lightweight fetches.

mod advanced;
mod browser;
mod error;
mod hybrid;
mod lightweight;
mod rendering;

pub use advanced::AdvancedRenderingFetcher;
pub use browser::{find_chrome_executable, BrowserSession, LaunchOptions, SessionPool};
pub use error::{ErrorCategory, FetchError};
pub use hybrid::{needs_js_rendering, HybridFetcher};
pub use lightweight::LightweightFetcher;
pub use rendering::RenderingFetcher;

use crate::profile::{SiteProfile, Strategy};
use async_trait::async_trait;
use std::time::Duration;
use url::Url;

/// Raw markup returned by a fetcher
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects or client-side navigation
    pub url: Url,
    /// `Content-Type` reported by the server, if any
    pub content_type: Option<String>,
    pub body: String,
    /// Produced by a browser session rather than a plain GET
    pub rendered: bool,
}

impl FetchedPage {
    /// Whether the body should be read as a JSON document
    pub fn is_json(&self) -> bool {
        self.content_type.as_deref().is_some_and(is_json_content_type)
    }
}

/// A strategy's way of turning a URL into markup
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// The strategy this fetcher implements
    fn strategy(&self) -> Strategy;

    /// Fetches `url` following the site profile's timing and selectors
    async fn fetch(&self, url: &Url, profile: &SiteProfile) -> Result<FetchedPage, FetchError>;

    /// Hard upper bound the orchestrator puts on one `fetch` call
    fn time_budget(&self, profile: &SiteProfile) -> Duration {
        profile.timeout()
    }
}

/// Content types the extractor can read: text, HTML, XHTML and JSON
///
/// A missing content type is treated as HTML.
pub fn is_supported_content_type(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    mime.is_empty()
        || mime.starts_with("text/")
        || mime == "application/xhtml+xml"
        || is_json_content_type(&mime)
}

pub fn is_json_content_type(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime == "application/json" || mime.ends_with("+json") || mime == "text/json"
}
