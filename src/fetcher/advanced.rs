use crate::config::RenderingConfig;
use crate::fetcher::browser::SessionPool;
use crate::fetcher::rendering::{PageSetup, RenderingFetcher, LAUNCH_GRACE};
use crate::fetcher::{FetchError, FetchedPage, Fetcher};
use crate::profile::{SiteProfile, Strategy};
use crate::url::cache_key;
use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use rand::seq::IndexedRandom;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};
use url::Url;

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
];

const VIEWPORTS: &[(u32, u32)] = &[(1920, 1080), (1536, 864), (1440, 900), (1366, 768)];

/// Hides the usual automation fingerprints before any page script runs
const STEALTH_SCRIPT: &str = r#"
Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3, 4, 5] });
Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en', 'ko'] });
window.chrome = window.chrome || { runtime: {} };
const originalQuery = window.navigator.permissions && window.navigator.permissions.query;
if (originalQuery) {
    window.navigator.permissions.query = (parameters) =>
        parameters.name === 'notifications'
            ? Promise.resolve({ state: Notification.permission })
            : originalQuery(parameters);
}
"#;

struct SessionCacheEntry {
    page: FetchedPage,
    stored_at: Instant,
}

/// Rendering with anti-automation-detection measures
///
/// Each session gets a randomized user agent and viewport, launches without
/// the automation flags, and hides `navigator.webdriver` and friends. Pages
/// rendered within the last few minutes are served from a small in-session
/// cache instead of navigating again.
pub struct AdvancedRenderingFetcher {
    renderer: RenderingFetcher,
    cache: Mutex<LruCache<String, SessionCacheEntry>>,
    cache_ttl: Duration,
}

impl AdvancedRenderingFetcher {
    pub fn new(config: &RenderingConfig, pool: SessionPool) -> Self {
        let capacity = NonZeroUsize::new(config.session_cache_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            renderer: RenderingFetcher::new(config, pool),
            cache: Mutex::new(LruCache::new(capacity)),
            cache_ttl: Duration::from_secs(config.session_cache_ttl_secs),
        }
    }

    /// Drops every cached page
    pub fn clear(&self) {
        self.cache.lock().clear();
    }

    pub fn cached_pages(&self) -> usize {
        self.cache.lock().len()
    }

    fn cached(&self, key: &str) -> Option<FetchedPage> {
        let mut cache = self.cache.lock();
        match cache.get(key) {
            Some(entry) if entry.stored_at.elapsed() < self.cache_ttl => Some(entry.page.clone()),
            Some(_) => {
                cache.pop(key);
                None
            }
            None => None,
        }
    }

    fn store(&self, key: String, page: &FetchedPage) {
        self.cache.lock().put(
            key,
            SessionCacheEntry {
                page: page.clone(),
                stored_at: Instant::now(),
            },
        );
    }
}

fn random_fingerprint() -> (String, (u32, u32)) {
    let mut rng = rand::rng();
    let user_agent = USER_AGENTS.choose(&mut rng).copied().unwrap_or(USER_AGENTS[0]);
    let viewport = VIEWPORTS.choose(&mut rng).copied().unwrap_or(VIEWPORTS[0]);
    (user_agent.to_string(), viewport)
}

#[async_trait]
impl Fetcher for AdvancedRenderingFetcher {
    fn strategy(&self) -> Strategy {
        Strategy::AdvancedRendering
    }

    async fn fetch(&self, url: &Url, profile: &SiteProfile) -> Result<FetchedPage, FetchError> {
        let key = cache_key(url);
        if let Some(page) = self.cached(&key) {
            tracing::debug!("In-session cache hit for {}", url);
            return Ok(page);
        }

        let (user_agent, viewport) = random_fingerprint();
        let mut options = self.renderer.launch_options()?;
        options.user_agent = Some(user_agent);
        options.window = viewport;
        options.stealth = true;

        let setup = PageSetup {
            init_script: Some(STEALTH_SCRIPT.to_string()),
            viewport: Some(viewport),
        };

        let page = self.renderer.render(url, profile, options, setup).await?;
        self.store(key, &page);
        Ok(page)
    }

    fn time_budget(&self, profile: &SiteProfile) -> Duration {
        profile.timeout() + LAUNCH_GRACE + Duration::from_secs(5)
    }
}
