//! Crawl orchestration
//!
//! The [`Orchestrator`] composes everything else into `crawl(url)`:
//!
//! 1. Validate the URL; a malformed URL fails immediately
//! 2. Serve from the cache when possible
//! 3. Resolve the site profile and ask the selector for candidate strategies
//! 4. For each round (the profile's retry count), try each candidate in
//!    order: fetch, extract, record the attempt in the ledger and monitor
//! 5. On the first success cache the text and stop; otherwise return nothing
//!
//! Strategies are tried strictly one after another, never in parallel.

mod builder;
mod orchestrator;

pub use builder::OrchestratorBuilder;
pub use orchestrator::Orchestrator;

use crate::extract::ExtractionPath;
use crate::fetcher::ErrorCategory;
use crate::profile::Strategy;
use std::time::Duration;

/// Outcome of one `crawl` call
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionResult {
    pub url: String,
    /// Extracted text; empty on failure
    pub text: String,
    /// Strategy that produced the text, if any
    pub strategy: Option<Strategy>,
    /// Extraction path that produced the text, if any
    pub path: Option<ExtractionPath>,
    /// Wall time of the whole call
    pub response_time: Duration,
    pub success: bool,
    /// Fetch attempts made (0 for a cache hit or a rejected URL)
    pub attempts: usize,
    pub from_cache: bool,
    /// Category of the last failure when unsuccessful
    pub error: Option<ErrorCategory>,
}

impl ExtractionResult {
    fn failed(url: &str, error: Option<ErrorCategory>, attempts: usize, response_time: Duration) -> Self {
        Self {
            url: url.to_string(),
            text: String::new(),
            strategy: None,
            path: None,
            response_time,
            success: false,
            attempts,
            from_cache: false,
            error,
        }
    }

    /// The text, if the crawl succeeded
    pub fn into_text(self) -> Option<String> {
        self.success.then_some(self.text)
    }

    /// Extracted length in characters
    pub fn content_length(&self) -> usize {
        self.text.chars().count()
    }
}
