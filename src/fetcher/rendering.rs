use crate::config::RenderingConfig;
use crate::fetcher::browser::{find_chrome_executable, BrowserSession, LaunchOptions, SessionPool};
use crate::fetcher::{FetchError, FetchedPage, Fetcher};
use crate::profile::{ScrollBehavior, SiteProfile, Strategy};
use async_trait::async_trait;
use chromiumoxide::error::CdpError;
use chromiumoxide::Page;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// Time allowed for Chrome to start, on top of the profile timeout
pub(crate) const LAUNCH_GRACE: Duration = Duration::from_secs(20);

const POLL_INTERVAL: Duration = Duration::from_millis(250);

pub(crate) fn cdp_error(error: CdpError) -> FetchError {
    match error {
        CdpError::Timeout => FetchError::Timeout(Duration::ZERO),
        other => FetchError::RenderingEnvironment(other.to_string()),
    }
}

/// Page-level changes applied before navigation
#[derive(Debug, Clone, Default)]
pub(crate) struct PageSetup {
    /// Script evaluated in every new document before page scripts run
    pub init_script: Option<String>,
    /// Emulated viewport size
    pub viewport: Option<(u32, u32)>,
}

/// Drives one page through navigation, readiness, overlays and scrolling
///
/// # Steps
///
/// 1. Open a blank page and apply the [`PageSetup`]
/// 2. Navigate to the target
/// 3. Wait for `document.readyState == "complete"`
/// 4. Probe the content-ready selectors in order, each for a short window
/// 5. Sleep the profile's settle delay
/// 6. Dismiss cookie banners and modals (Escape as a fallback)
/// 7. Scroll according to the profile's scroll behavior
/// 8. Read the rendered markup
pub(crate) async fn render_page(
    session: &BrowserSession,
    url: &Url,
    profile: &SiteProfile,
    config: &RenderingConfig,
    setup: &PageSetup,
) -> Result<FetchedPage, FetchError> {
    let page = session
        .browser()
        .new_page("about:blank")
        .await
        .map_err(cdp_error)?;

    if let Some((width, height)) = setup.viewport {
        let metrics =
            chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams::builder()
                .width(width)
                .height(height)
                .device_scale_factor(1.0)
                .mobile(false)
                .build()
                .map_err(FetchError::RenderingEnvironment)?;
        page.execute(metrics).await.map_err(cdp_error)?;
    }

    if let Some(script) = &setup.init_script {
        page.execute(
            chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams::new(
                script.clone(),
            ),
        )
        .await
        .map_err(cdp_error)?;
    }

    page.goto(url.as_str())
        .await
        .map_err(|e| FetchError::Navigation(e.to_string()))?;

    wait_until_ready(&page, Duration::from_secs(config.ready_timeout_secs)).await;

    let wait_selectors = if profile.wait_selectors.is_empty() {
        &config.wait_selectors
    } else {
        &profile.wait_selectors
    };
    match wait_for_content(&page, wait_selectors, Duration::from_millis(config.selector_probe_ms))
        .await
    {
        Some(selector) => tracing::debug!("Content ready on {} ({})", url, selector),
        None => tracing::debug!("No content-ready selector matched on {}", url),
    }

    let settle = profile.wait_time();
    if !settle.is_zero() {
        tokio::time::sleep(settle).await;
    }

    dismiss_overlays(&page, config).await;
    scroll(&page, profile.scroll_behavior, profile.max_scrolls).await;

    let body = page.content().await.map_err(cdp_error)?;
    let final_url = page
        .url()
        .await
        .ok()
        .flatten()
        .and_then(|u| Url::parse(&u).ok())
        .unwrap_or_else(|| url.clone());

    if let Err(e) = page.close().await {
        tracing::trace!("Page close failed: {}", e);
    }

    Ok(FetchedPage {
        url: final_url,
        content_type: Some("text/html".to_string()),
        body,
        rendered: true,
    })
}

async fn wait_until_ready(page: &Page, timeout: Duration) {
    let started = Instant::now();
    while started.elapsed() < timeout {
        let state = page
            .evaluate("document.readyState")
            .await
            .ok()
            .and_then(|result| result.into_value::<String>().ok());

        if state.as_deref() == Some("complete") {
            return;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
    tracing::debug!("Document not complete after {:?}, continuing", timeout);
}

/// Returns the first selector that appears, probing each for `probe`
async fn wait_for_content(page: &Page, selectors: &[String], probe: Duration) -> Option<String> {
    for selector in selectors {
        let started = Instant::now();
        loop {
            if page.find_element(selector.as_str()).await.is_ok() {
                return Some(selector.clone());
            }
            if started.elapsed() >= probe {
                break;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
    None
}

async fn dismiss_overlays(page: &Page, config: &RenderingConfig) {
    for selector in &config.cookie_selectors {
        if let Ok(element) = page.find_element(selector.as_str()).await {
            if element.click().await.is_ok() {
                tracing::debug!("Accepted cookie banner via {}", selector);
                break;
            }
        }
    }

    let mut modal_open = false;
    for selector in &config.modal_selectors {
        if page.find_element(selector.as_str()).await.is_err() {
            continue;
        }
        modal_open = true;

        let close_button = format!(
            "{0} .close, {0} [aria-label*='Close'], {0} [aria-label*='close'], {0} button[class*='close']",
            selector
        );
        if let Ok(button) = page.find_element(close_button).await {
            if button.click().await.is_ok() {
                tracing::debug!("Closed modal via {}", selector);
                modal_open = false;
            }
        }
    }

    if modal_open {
        if let Ok(body) = page.find_element("body").await {
            if let Err(e) = body.press_key("Escape").await {
                tracing::trace!("Escape key dispatch failed: {}", e);
            }
        }
    }
}

async fn scroll(page: &Page, behavior: ScrollBehavior, max_scrolls: u32) {
    let steps: Vec<(&str, Duration)> = match behavior {
        ScrollBehavior::Aggressive => (0..max_scrolls)
            .flat_map(|_| {
                [
                    (
                        "window.scrollTo(0, document.body.scrollHeight)",
                        Duration::from_millis(1000),
                    ),
                    ("window.scrollTo(0, 0)", Duration::from_millis(500)),
                ]
            })
            .collect(),
        ScrollBehavior::Smooth => (0..max_scrolls)
            .map(|_| ("window.scrollBy(0, 500)", Duration::from_millis(500)))
            .collect(),
        ScrollBehavior::Minimal => vec![(
            "window.scrollTo(0, document.body.scrollHeight / 2)",
            Duration::from_millis(1000),
        )],
    };

    for (script, pause) in steps {
        if let Err(e) = page.evaluate(script).await {
            tracing::trace!("Scroll step failed: {}", e);
            return;
        }
        tokio::time::sleep(pause).await;
    }
}

/// Renders pages in a disposable headless browser session
pub struct RenderingFetcher {
    pool: SessionPool,
    config: Arc<RenderingConfig>,
    executable: Option<PathBuf>,
}

impl RenderingFetcher {
    /// Creates a fetcher sharing `pool` with the other browser-backed fetchers
    pub fn new(config: &RenderingConfig, pool: SessionPool) -> Self {
        let executable = find_chrome_executable(config.chrome_executable.as_deref());
        if executable.is_none() {
            tracing::warn!("No Chrome or Chromium executable found; rendering strategies will fail");
        }

        Self {
            pool,
            config: Arc::new(config.clone()),
            executable,
        }
    }

    pub(crate) fn launch_options(&self) -> Result<LaunchOptions, FetchError> {
        let executable = self.executable.clone().ok_or_else(|| {
            FetchError::RenderingEnvironment("no Chrome or Chromium executable found".to_string())
        })?;

        Ok(LaunchOptions {
            executable,
            headless: self.config.headless,
            window: (1920, 1080),
            user_agent: None,
            stealth: false,
            request_timeout: Duration::from_secs(30),
        })
    }

    /// Launches a session, renders `url` and closes the session
    pub(crate) async fn render(
        &self,
        url: &Url,
        profile: &SiteProfile,
        options: LaunchOptions,
        setup: PageSetup,
    ) -> Result<FetchedPage, FetchError> {
        let config = Arc::clone(&self.config);
        let url = url.clone();
        let profile = profile.clone();

        self.pool
            .run(profile.timeout() + LAUNCH_GRACE, move || async move {
                let mut session = BrowserSession::launch(&options).await?;
                let result = render_page(&session, &url, &profile, &config, &setup).await;
                session.close().await;
                result
            })
            .await
    }
}

#[async_trait]
impl Fetcher for RenderingFetcher {
    fn strategy(&self) -> Strategy {
        Strategy::Rendering
    }

    async fn fetch(&self, url: &Url, profile: &SiteProfile) -> Result<FetchedPage, FetchError> {
        let options = self.launch_options()?;
        self.render(url, profile, options, PageSetup::default()).await
    }

    fn time_budget(&self, profile: &SiteProfile) -> Duration {
        profile.timeout() + LAUNCH_GRACE + Duration::from_secs(5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetcher_without_browser() -> RenderingFetcher {
        RenderingFetcher {
            pool: SessionPool::new(1),
            config: Arc::new(RenderingConfig::default()),
            executable: None,
        }
    }

    #[tokio::test]
    async fn test_missing_browser_is_rendering_environment_error() {
        let fetcher = fetcher_without_browser();
        let url = Url::parse("https://example.com/").unwrap();
        let error = fetcher
            .fetch(&url, &SiteProfile::generic())
            .await
            .unwrap_err();

        assert!(matches!(error, FetchError::RenderingEnvironment(_)));
        assert_eq!(fetcher.pool.available(), 1);
    }

    #[test]
    fn test_time_budget_exceeds_session_deadline() {
        let fetcher = fetcher_without_browser();
        let profile = SiteProfile::generic();
        assert!(fetcher.time_budget(&profile) > profile.timeout() + LAUNCH_GRACE);
    }
}
