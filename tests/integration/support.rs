//! Shared fixtures for the integration tests

use async_trait::async_trait;
use quillscout::config::Config;
use quillscout::fetcher::{FetchError, FetchedPage, Fetcher};
use quillscout::profile::{SiteProfile, Strategy};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Configuration tuned for tests: no pauses, fast retries, no jitter
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.crawler.strategy_delay_ms = 0;
    config.lightweight.retries = 2;
    config.lightweight.backoff_base_ms = 10;
    config.lightweight.jitter_min_ms = 0;
    config.lightweight.jitter_max_ms = 0;
    config
}

/// Roughly `sentences * 60` characters of prose
pub fn prose(sentences: usize) -> String {
    "The quick brown fox jumps over the lazy dog near the river. ".repeat(sentences)
}

pub fn article_html(title: &str, body: &str) -> String {
    format!(
        "<html><head><title>{title}</title></head><body>\
         <nav><a href=\"/\">Home</a> <a href=\"/about\">About</a></nav>\
         <article><h1>{title}</h1><p>{body}</p><p>Advertisement</p></article>\
         <footer>Copyright 2024 Example Media</footer>\
         </body></html>"
    )
}

/// What a scripted fetcher does on every call
#[derive(Debug, Clone)]
pub enum Script {
    Html(String),
    ServerError,
    BrowserUnavailable,
}

/// A fetcher that replays a fixed outcome and counts its calls
pub struct ScriptedFetcher {
    strategy: Strategy,
    script: Script,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new(strategy: Strategy, script: Script) -> Arc<Self> {
        Self::with_delay(strategy, script, Duration::ZERO)
    }

    /// Like [`ScriptedFetcher::new`], holding every call open for `delay`
    pub fn with_delay(strategy: Strategy, script: Script, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            strategy,
            script,
            delay,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Most calls that were in progress at the same time
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    fn strategy(&self) -> Strategy {
        self.strategy
    }

    async fn fetch(&self, url: &Url, _profile: &SiteProfile) -> Result<FetchedPage, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(current, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match &self.script {
            Script::Html(body) => Ok(FetchedPage {
                url: url.clone(),
                content_type: Some("text/html; charset=utf-8".to_string()),
                body: body.clone(),
                rendered: self.strategy.uses_browser(),
            }),
            Script::ServerError => Err(FetchError::Status {
                url: url.to_string(),
                status: 503,
            }),
            Script::BrowserUnavailable => Err(FetchError::RenderingEnvironment(
                "chrome executable not found".to_string(),
            )),
        }
    }
}
