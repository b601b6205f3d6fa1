//! Quillscout: an adaptive multi-strategy content crawler
//!
//! Given an arbitrary URL, this crate extracts the main body text of the page
//! despite inconsistent markup, anti-bot defenses and JavaScript-rendered
//! content. It learns per domain which fetch strategy works best, caches
//! extracted text, and keeps telemetry that classifies problem domains.
//!
//! The entry point is [`crawler::Orchestrator`], which composes the site
//! profile registry, the fetcher variants, the content extractor, the
//! performance ledger, the attempt monitor and the content cache.

pub mod cache;
pub mod clock;
pub mod config;
pub mod crawler;
pub mod extract;
pub mod fetcher;
pub mod monitor;
pub mod output;
pub mod profile;
pub mod storage;
pub mod strategy;
pub mod url;

use thiserror::Error;

/// Main error type for Quillscout operations
///
/// Per-attempt fetch failures are not represented here: they are
/// [`fetcher::FetchError`] values that the orchestrator records and absorbs.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Background task failed: {0}")]
    Task(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid domain: {0}")]
    InvalidDomain(String),

    #[error("Invalid boilerplate pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Invalid CSS selector '{0}'")]
    InvalidSelector(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

/// Result type alias for Quillscout operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{ExtractionResult, Orchestrator, OrchestratorBuilder};
pub use profile::{SiteProfile, SiteProfileRegistry, Strategy};
pub use url::{cache_key, normalize_domain, normalize_url, parse_target};
