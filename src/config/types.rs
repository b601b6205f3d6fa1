use crate::profile::SiteProfile;
use serde::Deserialize;

/// Main configuration structure for Quillscout
///
/// Every section is optional; `Config::default()` is a working setup with
/// no site profiles.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub lightweight: LightweightConfig,
    #[serde(default)]
    pub rendering: RenderingConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub selection: SelectionConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default, rename = "default-profile")]
    pub default_profile: SiteProfile,
    #[serde(default, rename = "site")]
    pub sites: Vec<SiteProfile>,
}

/// Orchestrator and cache behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Extracted text shorter than this is not a successful crawl
    #[serde(rename = "min-content-length")]
    pub min_content_length: usize,

    /// Pause between consecutive strategy attempts (milliseconds)
    #[serde(rename = "strategy-delay-ms")]
    pub strategy_delay_ms: u64,

    /// Lifetime of a cached extraction (seconds)
    #[serde(rename = "cache-ttl-secs")]
    pub cache_ttl_secs: u64,

    /// Maximum number of cached extractions
    #[serde(rename = "cache-capacity")]
    pub cache_capacity: usize,

    /// URLs crawled at once by a batch crawl
    #[serde(rename = "batch-concurrency")]
    pub batch_concurrency: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            min_content_length: 30,
            strategy_delay_ms: 1000,
            cache_ttl_secs: 3600,
            cache_capacity: 100,
            batch_concurrency: 5,
        }
    }
}

/// Plain HTTP fetching
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LightweightConfig {
    /// Global bound on concurrent lightweight fetches
    #[serde(rename = "max-concurrent")]
    pub max_concurrent: usize,

    /// Retries after the first attempt for transient failures
    pub retries: u32,

    /// Backoff before retry `n` is `backoff-base-ms * 2^n`
    #[serde(rename = "backoff-base-ms")]
    pub backoff_base_ms: u64,

    /// Random delay before each request is drawn from this range (milliseconds)
    #[serde(rename = "jitter-min-ms")]
    pub jitter_min_ms: u64,
    #[serde(rename = "jitter-max-ms")]
    pub jitter_max_ms: u64,

    #[serde(rename = "user-agent")]
    pub user_agent: String,

    #[serde(rename = "accept-language")]
    pub accept_language: String,

    #[serde(rename = "connect-timeout-secs")]
    pub connect_timeout_secs: u64,

    #[serde(rename = "max-redirects")]
    pub max_redirects: usize,
}

impl Default for LightweightConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 5,
            retries: 2,
            backoff_base_ms: 500,
            jitter_min_ms: 500,
            jitter_max_ms: 2000,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36"
                .to_string(),
            accept_language: "en-US,en;q=0.9,ko;q=0.8".to_string(),
            connect_timeout_secs: 10,
            max_redirects: 10,
        }
    }
}

/// Headless browser sessions
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RenderingConfig {
    /// Size of the browser session pool
    #[serde(rename = "max-sessions")]
    pub max_sessions: usize,

    /// Chrome/Chromium binary; searched on PATH and common locations when unset
    #[serde(rename = "chrome-executable")]
    pub chrome_executable: Option<String>,

    pub headless: bool,

    /// Upper bound on waiting for `document.readyState == "complete"` (seconds)
    #[serde(rename = "ready-timeout-secs")]
    pub ready_timeout_secs: u64,

    /// How long each content-ready selector is probed (milliseconds)
    #[serde(rename = "selector-probe-ms")]
    pub selector_probe_ms: u64,

    /// Content-ready selectors used when a profile has none
    #[serde(rename = "wait-selectors")]
    pub wait_selectors: Vec<String>,

    #[serde(rename = "modal-selectors")]
    pub modal_selectors: Vec<String>,

    #[serde(rename = "cookie-selectors")]
    pub cookie_selectors: Vec<String>,

    /// Lifetime of the advanced strategy's in-session page cache (seconds)
    #[serde(rename = "session-cache-ttl-secs")]
    pub session_cache_ttl_secs: u64,

    #[serde(rename = "session-cache-capacity")]
    pub session_cache_capacity: usize,

    /// Text-to-markup ratio under which the hybrid strategy renders the page
    #[serde(rename = "hybrid-min-text-ratio")]
    pub hybrid_min_text_ratio: f64,
}

impl Default for RenderingConfig {
    fn default() -> Self {
        Self {
            max_sessions: 2,
            chrome_executable: None,
            headless: true,
            ready_timeout_secs: 10,
            selector_probe_ms: 5000,
            wait_selectors: strings(&["article", ".content", ".post", ".entry"]),
            modal_selectors: strings(&[".modal", ".popup", ".overlay", "[role='dialog']"]),
            cookie_selectors: strings(&[
                "[data-testid='cookie-accept']",
                ".cookie-accept",
                ".privacy-accept",
                "[aria-label*='Accept']",
            ]),
            session_cache_ttl_secs: 300,
            session_cache_capacity: 50,
            hybrid_min_text_ratio: 0.05,
        }
    }
}

/// Content extraction thresholds and block-scoring weights
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Floor for the profile-directed and heuristic paths (characters)
    #[serde(rename = "min-primary-chars")]
    pub min_primary_chars: usize,

    /// Floor for the whole-document fallback and structured paths (characters)
    #[serde(rename = "min-fallback-chars")]
    pub min_fallback_chars: usize,

    /// Lines shorter than this are dropped, headings excepted (characters)
    #[serde(rename = "min-line-chars")]
    pub min_line_chars: usize,

    /// Blocks shorter than this are not scored (characters)
    #[serde(rename = "min-block-chars")]
    pub min_block_chars: usize,

    /// Number of top-scoring blocks reassembled by the heuristic path
    #[serde(rename = "top-k")]
    pub top_k: usize,

    pub weights: ScoringWeights,

    /// Case-insensitive line patterns removed from every extraction
    #[serde(rename = "boilerplate-patterns")]
    pub boilerplate_patterns: Vec<String>,

    /// Subtrees removed before heuristic scoring
    #[serde(rename = "noise-selectors")]
    pub noise_selectors: Vec<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_primary_chars: 200,
            min_fallback_chars: 100,
            min_line_chars: 10,
            min_block_chars: 50,
            top_k: 10,
            weights: ScoringWeights::default(),
            boilerplate_patterns: strings(&[
                r"^advertisement\b",
                r"^ad$",
                r"^sponsored\b",
                r"^click here\b",
                r"^read more\b",
                r"^continue reading\b",
                r"^share this\b",
                r"^follow us\b",
                r"^subscribe\b",
                r"^sign up for\b",
                r"^related( articles| posts| stories)?\b",
                r"^recommended for you\b",
                r"^loading\.\.\.",
                r"^please wait\b",
                r"^enable javascript\b",
                r"^javascript (is )?required\b",
                r"^cookie policy\b",
                r"^privacy policy\b",
                r"^terms of service\b",
                r"^disclaimer\b",
            ]),
            noise_selectors: strings(&[
                "script",
                "style",
                "noscript",
                "iframe",
                "embed",
                "nav",
                "header",
                "footer",
                "aside",
                "form",
                ".advertisement",
                ".ads",
                ".ad",
                ".banner",
                ".sidebar",
                ".navigation",
                ".menu",
                ".breadcrumb",
                ".comments",
                ".comment",
                ".social-share",
                ".share",
                ".related",
                ".recommended",
                ".suggested",
                ".newsletter",
                ".subscribe",
                ".signup",
                ".cookie",
                ".privacy",
                ".loading",
                ".spinner",
                ".overlay",
                ".modal",
            ]),
        }
    }
}

/// Weights of the heuristic block score
///
/// `composite = length * length_score + density * density_score
///            + link * link_penalty + position * position_weight`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub length: f64,
    pub density: f64,
    pub link: f64,
    pub position: f64,

    /// Character count at which the length score saturates
    #[serde(rename = "length-saturation")]
    pub length_saturation: f64,

    /// Multiplier applied to the links-per-word ratio
    #[serde(rename = "link-penalty-factor")]
    pub link_penalty_factor: f64,

    /// Position weight outside the middle band of the document
    #[serde(rename = "edge-position-weight")]
    pub edge_position_weight: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            length: 0.3,
            density: 0.3,
            link: 0.2,
            position: 0.2,
            length_saturation: 1000.0,
            link_penalty_factor: 10.0,
            edge_position_weight: 0.5,
        }
    }
}

/// Strategy ranking from ledger statistics
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Attempts a (domain, strategy) pair needs before it can be ranked
    #[serde(rename = "min-attempts")]
    pub min_attempts: u64,

    #[serde(rename = "success-weight")]
    pub success_weight: f64,

    #[serde(rename = "speed-weight")]
    pub speed_weight: f64,

    /// Response time (seconds) at which the speed score halves
    #[serde(rename = "response-time-scale")]
    pub response_time_scale: f64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            min_attempts: 3,
            success_weight: 0.7,
            speed_weight: 0.3,
            response_time_scale: 10.0,
        }
    }
}

/// Attempt history, trend and problem-site classification
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    #[serde(rename = "history-capacity")]
    pub history_capacity: usize,

    #[serde(rename = "trend-capacity")]
    pub trend_capacity: usize,

    /// Number of trailing attempts each trend point covers
    #[serde(rename = "trend-window")]
    pub trend_window: usize,

    #[serde(rename = "retention-days")]
    pub retention_days: i64,

    /// Interval of the background maintenance task (seconds)
    #[serde(rename = "maintenance-interval-secs")]
    pub maintenance_interval_secs: u64,

    /// Attempts a domain needs before it can be classified as a problem site
    #[serde(rename = "problem-min-attempts")]
    pub problem_min_attempts: u64,

    /// Success rate under which a domain is a problem site
    #[serde(rename = "problem-success-rate")]
    pub problem_success_rate: f64,

    /// A domain with this many failures is a problem site under the soft rate
    #[serde(rename = "problem-min-failures")]
    pub problem_min_failures: u64,

    #[serde(rename = "problem-soft-success-rate")]
    pub problem_soft_success_rate: f64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            history_capacity: 1000,
            trend_capacity: 50,
            trend_window: 10,
            retention_days: 30,
            maintenance_interval_secs: 3600,
            problem_min_attempts: 3,
            problem_success_rate: 0.5,
            problem_min_failures: 3,
            problem_soft_success_rate: 0.7,
        }
    }
}

/// Telemetry persistence and reports
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Path to the SQLite telemetry database
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Path to the markdown telemetry report
    #[serde(rename = "report-path")]
    pub report_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database_path: "quillscout.db".to_string(),
            report_path: "crawl-report.md".to_string(),
        }
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}
