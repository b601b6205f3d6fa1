use crate::config::LightweightConfig;
use crate::fetcher::{is_supported_content_type, FetchError, FetchedPage, Fetcher};
use crate::profile::{SiteProfile, Strategy};
use async_trait::async_trait;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE};
use reqwest::{redirect::Policy, Client};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use url::Url;

/// Builds an HTTP client that presents itself like a desktop browser
///
/// # Arguments
///
/// * `config` - The lightweight fetch configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &LightweightConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .default_headers(browser_headers(config))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .redirect(Policy::limited(config.max_redirects))
        .gzip(true)
        .brotli(true)
        .build()
}

fn browser_headers(config: &LightweightConfig) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
        ),
    );
    if let Ok(value) = HeaderValue::from_str(&config.accept_language) {
        headers.insert(ACCEPT_LANGUAGE, value);
    }

    for (name, value) in [
        ("dnt", "1"),
        ("upgrade-insecure-requests", "1"),
        ("sec-fetch-dest", "document"),
        ("sec-fetch-mode", "navigate"),
        ("sec-fetch-site", "none"),
        ("sec-fetch-user", "?1"),
        ("cache-control", "max-age=0"),
    ] {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }

    headers
}

/// Plain HTTP fetcher with retries, backoff and a global concurrency bound
pub struct LightweightFetcher {
    client: Client,
    permits: Arc<Semaphore>,
    config: LightweightConfig,
}

impl LightweightFetcher {
    /// Creates a fetcher with its own semaphore of `max-concurrent` permits
    pub fn new(config: &LightweightConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
            permits: Arc::new(Semaphore::new(config.max_concurrent)),
            config: config.clone(),
        })
    }

    /// Number of fetches that could start right now without waiting
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// Backoff before retry number `attempt` (zero-based): `base * 2^attempt`
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(
            self.config
                .backoff_base_ms
                .saturating_mul(1u64 << attempt.min(16)),
        )
    }

    fn jitter(&self) -> Duration {
        let (min, max) = (self.config.jitter_min_ms, self.config.jitter_max_ms);
        if max == 0 || min >= max {
            return Duration::from_millis(min);
        }
        Duration::from_millis(rand::rng().random_range(min..=max))
    }

    /// One GET, holding a permit for its duration
    async fn fetch_once(&self, url: &Url, timeout: Duration) -> Result<FetchedPage, FetchError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| FetchError::Connection("lightweight fetcher shut down".to_string()))?;

        let delay = self.jitter();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let response = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify_request_error(e, timeout))?;

        let status = response.status();
        let final_url = response.url().clone();

        if !status.is_success() {
            return Err(FetchError::Status {
                url: final_url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());

        if let Some(ct) = &content_type {
            if !is_supported_content_type(ct) {
                return Err(FetchError::UnsupportedContent(ct.clone()));
            }
        }

        let body = response
            .text()
            .await
            .map_err(|e| classify_request_error(e, timeout))?;

        Ok(FetchedPage {
            url: final_url,
            content_type,
            body,
            rendered: false,
        })
    }
}

fn classify_request_error(error: reqwest::Error, timeout: Duration) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout(timeout)
    } else {
        FetchError::from(error)
    }
}

#[async_trait]
impl Fetcher for LightweightFetcher {
    fn strategy(&self) -> Strategy {
        Strategy::Lightweight
    }

    /// Fetches a URL, retrying transient failures
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | Timeout, connection error | Retry with backoff |
    /// | HTTP 5xx, HTTP 429 | Retry with backoff |
    /// | Other HTTP 4xx | Fail immediately |
    /// | Unsupported content type | Fail immediately |
    async fn fetch(&self, url: &Url, profile: &SiteProfile) -> Result<FetchedPage, FetchError> {
        let timeout = profile.timeout();
        let mut attempt = 0;

        loop {
            match self.fetch_once(url, timeout).await {
                Ok(page) => return Ok(page),
                Err(e) if e.is_retryable() && attempt < self.config.retries => {
                    let delay = self.backoff(attempt);
                    tracing::debug!(
                        "Lightweight fetch of {} failed ({}), retrying in {:?}",
                        url,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn time_budget(&self, profile: &SiteProfile) -> Duration {
        let attempts = self.config.retries + 1;
        let per_attempt = profile.timeout() + Duration::from_millis(self.config.jitter_max_ms);
        let backoff: Duration = (0..self.config.retries).map(|n| self.backoff(n)).sum();
        per_attempt * attempts + backoff + Duration::from_secs(1)
    }
}
