use crate::cache::ContentCache;
use crate::clock::{Clock, SystemClock};
use crate::crawler::Orchestrator;
use crate::extract::ContentExtractor;
use crate::fetcher::{
    AdvancedRenderingFetcher, Fetcher, HybridFetcher, LightweightFetcher, RenderingFetcher, SessionPool,
};
use crate::monitor::CrawlMonitor;
use crate::profile::{SiteProfileRegistry, Strategy};
use crate::strategy::{PerformanceLedger, StrategySelector};
use crate::{Config, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Assembles an [`Orchestrator`]
///
/// Every shared component can be injected, so tests and long-running
/// callers can hold their own handles to the ledger, monitor, cache and
/// clock. Anything not injected is created from the configuration.
pub struct OrchestratorBuilder {
    config: Config,
    fetchers: HashMap<Strategy, Arc<dyn Fetcher>>,
    advanced: Option<Arc<AdvancedRenderingFetcher>>,
    clock: Option<Arc<dyn Clock>>,
    ledger: Option<Arc<PerformanceLedger>>,
    monitor: Option<Arc<CrawlMonitor>>,
    cache: Option<Arc<ContentCache>>,
    registry: Option<Arc<SiteProfileRegistry>>,
}

impl OrchestratorBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            fetchers: HashMap::new(),
            advanced: None,
            clock: None,
            ledger: None,
            monitor: None,
            cache: None,
            registry: None,
        }
    }

    /// Registers a fetcher under the strategy it reports, replacing any
    /// fetcher already registered for it
    pub fn fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetchers.insert(fetcher.strategy(), fetcher);
        self
    }

    /// Registers the real fetchers for every strategy without one
    ///
    /// Browser strategies share one session pool. The hybrid strategy
    /// composes the lightweight and rendering fetchers, injected or not.
    ///
    /// # Returns
    ///
    /// * `Ok(OrchestratorBuilder)` - Fetchers registered
    /// * `Err(CrawlError)` - The HTTP client could not be built
    pub fn with_default_fetchers(mut self) -> Result<Self> {
        let pool = SessionPool::from_config(&self.config.rendering);

        if !self.fetchers.contains_key(&Strategy::Lightweight) {
            let fetcher = LightweightFetcher::new(&self.config.lightweight)?;
            self.fetchers.insert(Strategy::Lightweight, Arc::new(fetcher));
        }
        if !self.fetchers.contains_key(&Strategy::Rendering) {
            let fetcher = RenderingFetcher::new(&self.config.rendering, pool.clone());
            self.fetchers.insert(Strategy::Rendering, Arc::new(fetcher));
        }
        if !self.fetchers.contains_key(&Strategy::AdvancedRendering) {
            let fetcher = Arc::new(AdvancedRenderingFetcher::new(&self.config.rendering, pool));
            self.advanced = Some(fetcher.clone());
            self.fetchers.insert(Strategy::AdvancedRendering, fetcher);
        }
        if !self.fetchers.contains_key(&Strategy::Hybrid) {
            if let (Some(lightweight), Some(renderer)) = (
                self.fetchers.get(&Strategy::Lightweight).cloned(),
                self.fetchers.get(&Strategy::Rendering).cloned(),
            ) {
                let fetcher = HybridFetcher::new(
                    lightweight,
                    renderer,
                    self.config.rendering.hybrid_min_text_ratio,
                );
                self.fetchers.insert(Strategy::Hybrid, Arc::new(fetcher));
            }
        }

        Ok(self)
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn ledger(mut self, ledger: Arc<PerformanceLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn monitor(mut self, monitor: Arc<CrawlMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn cache(mut self, cache: Arc<ContentCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn registry(mut self, registry: Arc<SiteProfileRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Builds the orchestrator
    ///
    /// # Returns
    ///
    /// * `Ok(Orchestrator)` - Ready to crawl
    /// * `Err(CrawlError)` - A boilerplate pattern or noise selector does not compile
    pub fn build(self) -> Result<Orchestrator> {
        let config = self.config;
        let extractor = ContentExtractor::new(&config.extraction)?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let ledger = self.ledger.unwrap_or_default();
        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(SiteProfileRegistry::from_config(&config)));
        let monitor = self
            .monitor
            .unwrap_or_else(|| Arc::new(CrawlMonitor::new(config.monitor.clone(), clock.clone())));
        let cache = self.cache.unwrap_or_else(|| {
            Arc::new(ContentCache::new(
                config.crawler.cache_capacity,
                Duration::from_secs(config.crawler.cache_ttl_secs),
                clock.clone(),
            ))
        });

        if self.fetchers.is_empty() {
            tracing::warn!("Orchestrator built without fetchers; every crawl will fail");
        }

        let selector = StrategySelector::new(ledger.clone(), registry.clone(), config.selection.clone());

        Ok(Orchestrator {
            min_attempts: config.selection.min_attempts,
            config: config.crawler,
            registry,
            selector,
            fetchers: self.fetchers,
            extractor,
            ledger,
            monitor,
            cache,
            clock,
            advanced: self.advanced,
        })
    }
}
