use crate::fetcher::{FetchError, FetchedPage, Fetcher};
use crate::profile::{SiteProfile, Strategy};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Markers of pages whose content is built client-side
const SPA_HINTS: &[&str] = &[
    "window.__NEXT_DATA__",
    "id=\"__NEXT_DATA__\"",
    "window.__NUXT__",
    "ng-app",
    "ng-controller",
    "<div id=\"root\"></div>",
    "<div id=\"app\"></div>",
    "data-reactroot",
];

/// Bodies shorter than this that show a loading placeholder are treated as shells
const PLACEHOLDER_MAX_LEN: usize = 5000;

/// Guesses whether a plain GET returned a page shell that needs a browser
///
/// # Arguments
///
/// * `page` - The lightweight fetch result
/// * `min_text_ratio` - Visible text to markup ratio under which the page counts as a shell
pub fn needs_js_rendering(page: &FetchedPage, min_text_ratio: f64) -> bool {
    if page.is_json() {
        return false;
    }

    let body = &page.body;
    if body.trim().is_empty() {
        return true;
    }

    if estimate_text_ratio(body) < min_text_ratio {
        return true;
    }

    if SPA_HINTS.iter().any(|hint| body.contains(hint)) {
        return true;
    }

    body.len() < PLACEHOLDER_MAX_LEN
        && (body.contains("Loading...")
            || body.contains("Please wait")
            || body.contains("Enable JavaScript")
            || body.contains("enable JavaScript"))
}

/// Ratio of non-whitespace characters outside tags to total markup length
fn estimate_text_ratio(html: &str) -> f64 {
    if html.is_empty() {
        return 0.0;
    }

    let mut in_tag = false;
    let mut text_chars = 0usize;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag && !c.is_whitespace() => text_chars += 1,
            _ => {}
        }
    }

    text_chars as f64 / html.len() as f64
}

/// Lightweight first, escalating to a browser when the result looks script-built
///
/// A failed lightweight fetch also escalates, except for unsupported content,
/// which a browser would not fix either.
pub struct HybridFetcher {
    lightweight: Arc<dyn Fetcher>,
    renderer: Arc<dyn Fetcher>,
    min_text_ratio: f64,
}

impl HybridFetcher {
    pub fn new(lightweight: Arc<dyn Fetcher>, renderer: Arc<dyn Fetcher>, min_text_ratio: f64) -> Self {
        Self {
            lightweight,
            renderer,
            min_text_ratio,
        }
    }
}

#[async_trait]
impl Fetcher for HybridFetcher {
    fn strategy(&self) -> Strategy {
        Strategy::Hybrid
    }

    async fn fetch(&self, url: &Url, profile: &SiteProfile) -> Result<FetchedPage, FetchError> {
        match self.lightweight.fetch(url, profile).await {
            Ok(page) if !needs_js_rendering(&page, self.min_text_ratio) => {
                tracing::debug!("Hybrid fetch of {} served without a browser", url);
                return Ok(page);
            }
            Ok(_) => tracing::debug!("Hybrid fetch of {} looks script-built, rendering", url),
            Err(e @ FetchError::UnsupportedContent(_)) => return Err(e),
            Err(e) => tracing::debug!("Hybrid lightweight fetch of {} failed ({}), rendering", url, e),
        }

        self.renderer.fetch(url, profile).await
    }

    fn time_budget(&self, profile: &SiteProfile) -> Duration {
        self.lightweight.time_budget(profile) + self.renderer.time_budget(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticFetcher {
        strategy: Strategy,
        result: fn(&Url) -> Result<FetchedPage, FetchError>,
        calls: AtomicUsize,
    }

    impl StaticFetcher {
        fn new(strategy: Strategy, result: fn(&Url) -> Result<FetchedPage, FetchError>) -> Arc<Self> {
            Arc::new(Self {
                strategy,
                result,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Fetcher for StaticFetcher {
        fn strategy(&self) -> Strategy {
            self.strategy
        }

        async fn fetch(&self, url: &Url, _profile: &SiteProfile) -> Result<FetchedPage, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.result)(url)
        }
    }

    fn html(url: &Url, body: &str) -> FetchedPage {
        FetchedPage {
            url: url.clone(),
            content_type: Some("text/html".to_string()),
            body: body.to_string(),
            rendered: false,
        }
    }

    fn article_page(url: &Url) -> Result<FetchedPage, FetchError> {
        Ok(html(
            url,
            &format!("<html><body><article><p>{}</p></article></body></html>", "word ".repeat(200)),
        ))
    }

    fn spa_shell(url: &Url) -> Result<FetchedPage, FetchError> {
        Ok(html(
            url,
            r#"<html><head><script id="__NEXT_DATA__" type="application/json">{}</script></head><body><div id="root"></div></body></html>"#,
        ))
    }

    fn rendered_page(url: &Url) -> Result<FetchedPage, FetchError> {
        let mut page = html(url, "<html><body><p>rendered</p></body></html>");
        page.rendered = true;
        Ok(page)
    }

    fn pdf(_url: &Url) -> Result<FetchedPage, FetchError> {
        Err(FetchError::UnsupportedContent("application/pdf".to_string()))
    }

    fn server_error(url: &Url) -> Result<FetchedPage, FetchError> {
        Err(FetchError::Status {
            url: url.to_string(),
            status: 502,
        })
    }

    #[test]
    fn test_needs_js_rendering_heuristic() {
        let url = Url::parse("https://example.com").unwrap();
        assert!(needs_js_rendering(&spa_shell(&url).unwrap(), 0.05));
        assert!(!needs_js_rendering(&article_page(&url).unwrap(), 0.05));
        assert!(needs_js_rendering(&html(&url, "<div>Loading...</div>"), 0.0));
        assert!(needs_js_rendering(&html(&url, "   "), 0.05));

        let mut json = html(&url, "{}");
        json.content_type = Some("application/json".to_string());
        assert!(!needs_js_rendering(&json, 0.05));
    }

    #[tokio::test]
    async fn test_static_page_skips_browser() {
        let light = StaticFetcher::new(Strategy::Lightweight, article_page);
        let render = StaticFetcher::new(Strategy::Rendering, rendered_page);
        let hybrid = HybridFetcher::new(light.clone(), render.clone(), 0.05);

        let url = Url::parse("https://example.com/post").unwrap();
        let page = hybrid.fetch(&url, &SiteProfile::generic()).await.unwrap();

        assert!(!page.rendered);
        assert_eq!(render.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_spa_shell_escalates_to_browser() {
        let light = StaticFetcher::new(Strategy::Lightweight, spa_shell);
        let render = StaticFetcher::new(Strategy::Rendering, rendered_page);
        let hybrid = HybridFetcher::new(light, render.clone(), 0.05);

        let url = Url::parse("https://example.com/app").unwrap();
        let page = hybrid.fetch(&url, &SiteProfile::generic()).await.unwrap();

        assert!(page.rendered);
        assert_eq!(render.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_lightweight_failure_escalates() {
        let light = StaticFetcher::new(Strategy::Lightweight, server_error);
        let render = StaticFetcher::new(Strategy::Rendering, rendered_page);
        let hybrid = HybridFetcher::new(light, render.clone(), 0.05);

        let url = Url::parse("https://example.com/flaky").unwrap();
        assert!(hybrid.fetch(&url, &SiteProfile::generic()).await.is_ok());
        assert_eq!(render.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unsupported_content_does_not_escalate() {
        let light = StaticFetcher::new(Strategy::Lightweight, pdf);
        let render = StaticFetcher::new(Strategy::Rendering, rendered_page);
        let hybrid = HybridFetcher::new(light, render.clone(), 0.05);

        let url = Url::parse("https://example.com/doc.pdf").unwrap();
        let error = hybrid.fetch(&url, &SiteProfile::generic()).await.unwrap_err();

        assert!(matches!(error, FetchError::UnsupportedContent(_)));
        assert_eq!(render.calls.load(Ordering::SeqCst), 0);
    }
}
