use crate::cache::ContentCache;
use crate::clock::Clock;
use crate::config::CrawlerConfig;
use crate::crawler::{ExtractionResult, OrchestratorBuilder};
use crate::extract::{ContentExtractor, Extraction};
use crate::fetcher::{AdvancedRenderingFetcher, ErrorCategory, FetchError, Fetcher};
use crate::monitor::{CrawlAttempt, CrawlMonitor, MonitorSnapshot};
use crate::profile::{SiteProfile, SiteProfileRegistry, Strategy};
use crate::strategy::{CrawlingStats, PerformanceLedger, StrategySelector};
use crate::url::{extract_domain, parse_target};
use crate::Config;
use futures::stream::{self, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// Adaptive multi-strategy crawler
///
/// Cheap to share behind an `Arc`; concurrent `crawl` calls only contend on
/// the short critical sections of the ledger, monitor and cache.
pub struct Orchestrator {
    pub(crate) config: CrawlerConfig,
    pub(crate) min_attempts: u64,
    pub(crate) registry: Arc<SiteProfileRegistry>,
    pub(crate) selector: StrategySelector,
    pub(crate) fetchers: HashMap<Strategy, Arc<dyn Fetcher>>,
    pub(crate) extractor: ContentExtractor,
    pub(crate) ledger: Arc<PerformanceLedger>,
    pub(crate) monitor: Arc<CrawlMonitor>,
    pub(crate) cache: Arc<ContentCache>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) advanced: Option<Arc<AdvancedRenderingFetcher>>,
}

/// A successful attempt
struct Harvest {
    extraction: Extraction,
    elapsed: Duration,
}

impl Orchestrator {
    /// Starts building an orchestrator from configuration
    pub fn builder(config: Config) -> OrchestratorBuilder {
        OrchestratorBuilder::new(config)
    }

    /// Builds an orchestrator with the real fetcher for every strategy
    ///
    /// # Returns
    ///
    /// * `Ok(Orchestrator)` - Ready to crawl
    /// * `Err(CrawlError)` - Invalid extraction patterns or HTTP client setup failure
    pub fn from_config(config: Config) -> crate::Result<Self> {
        OrchestratorBuilder::new(config).with_default_fetchers()?.build()
    }

    /// Extracts the main text of a URL
    ///
    /// Failure of every strategy is a normal outcome and yields `None`.
    pub async fn crawl(&self, url: &str) -> Option<String> {
        self.crawl_detailed(url).await.into_text()
    }

    /// Like [`crawl`](Self::crawl), reporting which strategy and extraction
    /// path produced the text and how long it took
    pub async fn crawl_detailed(&self, url: &str) -> ExtractionResult {
        self.run(url, None).await
    }

    /// Crawls a list of URLs concurrently
    ///
    /// At most `batch-concurrency` crawls run at once. Each URL still tries
    /// its strategies sequentially.
    ///
    /// # Returns
    ///
    /// Each URL paired with its extracted text, in input order
    pub async fn crawl_batch<I, S>(&self, urls: I) -> Vec<(String, Option<String>)>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let urls: Vec<String> = urls.into_iter().map(Into::into).collect();
        tracing::info!(
            "Crawling batch of {} URLs ({} at a time)",
            urls.len(),
            self.config.batch_concurrency
        );

        stream::iter(urls)
            .map(|url| async move {
                let text = self.crawl(&url).await;
                (url, text)
            })
            .buffered(self.config.batch_concurrency.max(1))
            .collect()
            .await
    }

    /// Crawls with one strategy only, bypassing adaptive selection
    ///
    /// The attempt is still cached and recorded like any other.
    pub async fn crawl_with_strategy(&self, url: &str, strategy: Strategy) -> ExtractionResult {
        self.run(url, Some(strategy)).await
    }

    async fn run(&self, raw_url: &str, forced: Option<Strategy>) -> ExtractionResult {
        let started = Instant::now();

        let url = match parse_target(raw_url) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("Rejected URL '{}': {}", raw_url, e);
                return ExtractionResult::failed(
                    raw_url,
                    Some(ErrorCategory::InvalidInput),
                    0,
                    started.elapsed(),
                );
            }
        };

        if let Some(text) = self.cache.get(&url) {
            tracing::info!("Cache hit for {}", url);
            return ExtractionResult {
                url: url.to_string(),
                text,
                strategy: None,
                path: None,
                response_time: started.elapsed(),
                success: true,
                attempts: 0,
                from_cache: true,
                error: None,
            };
        }

        let Some(domain) = extract_domain(&url) else {
            return ExtractionResult::failed(
                url.as_str(),
                Some(ErrorCategory::InvalidInput),
                0,
                started.elapsed(),
            );
        };
        let profile = self.registry.resolve(&domain);
        let candidates = match forced {
            Some(strategy) => vec![strategy],
            None => self.selector.select_for_profile(&domain, profile),
        };
        let rounds = profile.rounds();

        tracing::info!(
            "Crawling {} ({} candidate strategies, {} rounds)",
            url,
            candidates.len(),
            rounds
        );

        let mut abandoned: HashSet<Strategy> = HashSet::new();
        let mut attempts = 0usize;
        let mut last_error = None;

        'rounds: for round in 1..=rounds {
            for &strategy in &candidates {
                if abandoned.contains(&strategy) {
                    continue;
                }
                let Some(fetcher) = self.fetchers.get(&strategy) else {
                    tracing::debug!("No fetcher registered for {}, skipping", strategy);
                    continue;
                };

                if attempts > 0 && self.config.strategy_delay_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(self.config.strategy_delay_ms)).await;
                }
                attempts += 1;

                match self.attempt(&url, &domain, profile, fetcher.as_ref()).await {
                    Ok(harvest) => {
                        let text = harvest.extraction.text;
                        tracing::info!(
                            "Crawled {} with {} via {} path ({} chars, {:.2}s)",
                            url,
                            strategy,
                            harvest.extraction.path,
                            text.chars().count(),
                            harvest.elapsed.as_secs_f64()
                        );
                        self.cache.put(&url, text.clone());
                        return ExtractionResult {
                            url: url.to_string(),
                            text,
                            strategy: Some(strategy),
                            path: Some(harvest.extraction.path),
                            response_time: started.elapsed(),
                            success: true,
                            attempts,
                            from_cache: false,
                            error: None,
                        };
                    }
                    Err(e) => {
                        let category = e.category();
                        tracing::warn!(
                            "Strategy {} failed for {} (round {}/{}): {}",
                            strategy,
                            url,
                            round,
                            rounds,
                            e
                        );
                        last_error = Some(category);

                        if category.is_terminal() {
                            break 'rounds;
                        }
                        if category == ErrorCategory::RenderingEnvironment {
                            abandoned.insert(strategy);
                        }
                    }
                }
            }
        }

        tracing::error!("All strategies failed for {} after {} attempts", url, attempts);
        ExtractionResult::failed(url.as_str(), last_error, attempts, started.elapsed())
    }

    /// One fetch-and-extract attempt, recorded in the ledger and monitor
    /// whatever its outcome
    async fn attempt(
        &self,
        url: &Url,
        domain: &str,
        profile: &SiteProfile,
        fetcher: &dyn Fetcher,
    ) -> Result<Harvest, FetchError> {
        let strategy = fetcher.strategy();
        let started = Instant::now();
        let budget = fetcher.time_budget(profile);

        let outcome = match tokio::time::timeout(budget, fetcher.fetch(url, profile)).await {
            Ok(fetched) => fetched.and_then(|page| self.extract(&page, profile)),
            Err(_) => Err(FetchError::Timeout(budget)),
        };
        let elapsed = started.elapsed();

        let now = self.clock.now();
        match &outcome {
            Ok(extraction) => {
                let length = extraction.text.chars().count();
                self.ledger.record(domain, strategy, true, elapsed, length);
                self.monitor.record(CrawlAttempt::succeeded(
                    url.as_str(),
                    domain,
                    strategy,
                    length,
                    elapsed,
                    now,
                ));
            }
            Err(e) => {
                self.ledger.record(domain, strategy, false, elapsed, 0);
                self.monitor.record(CrawlAttempt::failed(
                    url.as_str(),
                    domain,
                    strategy,
                    e.category(),
                    elapsed,
                    now,
                ));
            }
        }

        outcome.map(|extraction| Harvest { extraction, elapsed })
    }

    fn extract(&self, page: &crate::fetcher::FetchedPage, profile: &SiteProfile) -> Result<Extraction, FetchError> {
        let extraction = self
            .extractor
            .extract_page(page, Some(profile))
            .ok_or(FetchError::ExtractionMiss)?;

        let length = extraction.text.chars().count();
        if length < self.config.min_content_length {
            tracing::debug!(
                "Extracted only {} chars from {}, below {}",
                length,
                page.url,
                self.config.min_content_length
            );
            return Err(FetchError::ExtractionMiss);
        }
        Ok(extraction)
    }

    pub fn ledger(&self) -> &Arc<PerformanceLedger> {
        &self.ledger
    }

    pub fn monitor(&self) -> &Arc<CrawlMonitor> {
        &self.monitor
    }

    pub fn cache(&self) -> &Arc<ContentCache> {
        &self.cache
    }

    pub fn registry(&self) -> &Arc<SiteProfileRegistry> {
        &self.registry
    }

    pub fn selector(&self) -> &StrategySelector {
        &self.selector
    }

    /// Strategies with a registered fetcher
    pub fn strategies(&self) -> Vec<Strategy> {
        let mut strategies: Vec<Strategy> = self.fetchers.keys().copied().collect();
        strategies.sort();
        strategies
    }

    /// Per-domain ledger export
    pub fn crawling_stats(&self) -> CrawlingStats {
        self.ledger.crawling_stats(self.min_attempts)
    }

    /// Monitor export for dashboards
    pub fn snapshot(&self) -> MonitorSnapshot {
        self.monitor.snapshot()
    }

    /// Drops per-session state held by the fetchers
    pub fn shutdown(&self) {
        if let Some(advanced) = &self.advanced {
            tracing::debug!("Clearing {} cached rendered pages", advanced.cached_pages());
            advanced.clear();
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("strategies", &self.strategies())
            .field("profiles", &self.registry.len())
            .field("cache", &self.cache)
            .finish()
    }
}
