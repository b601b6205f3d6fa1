//! Crawl attempt monitoring
//!
//! The [`CrawlMonitor`] keeps a bounded, time-ordered history of individual
//! attempts alongside cumulative per-domain counters. From those it derives
//! success rates, the most common errors per domain, a rolling success-rate
//! trend and the list of problem sites. A [`MaintenanceTask`] periodically
//! prunes old data and persists telemetry.

mod maintenance;
mod tracker;

pub use maintenance::{run_maintenance, MaintenanceHandle, MaintenanceReport, MaintenanceTask, SharedStore};
pub use tracker::CrawlMonitor;

use crate::fetcher::ErrorCategory;
use crate::profile::Strategy;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// One fetch-and-extract attempt of one strategy on one URL
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrawlAttempt {
    /// Monotonic sequence number, assigned when the monitor records the attempt
    pub seq: u64,
    pub url: String,
    pub domain: String,
    pub strategy: Strategy,
    pub success: bool,
    /// Extracted characters, 0 on failure
    pub content_length: usize,
    /// Normalized failure category; `None` on success
    pub error: Option<ErrorCategory>,
    /// Wall time of the attempt in seconds
    pub response_time: f64,
    pub timestamp: DateTime<Utc>,
}

impl CrawlAttempt {
    /// A successful attempt
    pub fn succeeded(
        url: impl Into<String>,
        domain: impl Into<String>,
        strategy: Strategy,
        content_length: usize,
        response_time: Duration,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            seq: 0,
            url: url.into(),
            domain: domain.into(),
            strategy,
            success: true,
            content_length,
            error: None,
            response_time: response_time.as_secs_f64(),
            timestamp,
        }
    }

    /// A failed attempt
    pub fn failed(
        url: impl Into<String>,
        domain: impl Into<String>,
        strategy: Strategy,
        error: ErrorCategory,
        response_time: Duration,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            seq: 0,
            url: url.into(),
            domain: domain.into(),
            strategy,
            success: false,
            content_length: 0,
            error: Some(error),
            response_time: response_time.as_secs_f64(),
            timestamp,
        }
    }
}

/// Cumulative counters for one domain
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteStats {
    pub domain: String,
    pub total_attempts: u64,
    pub successful_attempts: u64,
    pub failed_attempts: u64,
    /// Mean extracted length over successful attempts
    pub avg_content_length: f64,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
    /// Failure counts per category, most common first
    pub errors: Vec<(ErrorCategory, u64)>,
}

impl SiteStats {
    pub fn success_rate(&self) -> f64 {
        if self.total_attempts == 0 {
            return 0.0;
        }
        self.successful_attempts as f64 / self.total_attempts as f64
    }

    pub fn top_errors(&self, n: usize) -> Vec<(ErrorCategory, u64)> {
        self.errors.iter().take(n).copied().collect()
    }

    /// Most recent attempt of either outcome
    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.last_success.max(self.last_failure)
    }
}

/// A domain whose success rate warrants operator attention
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProblemSite {
    pub domain: String,
    pub success_rate: f64,
    pub total_attempts: u64,
    pub failed_attempts: u64,
    pub last_failure: Option<DateTime<Utc>>,
    /// Up to three most common failure categories
    pub common_errors: Vec<(ErrorCategory, u64)>,
}

/// Success rate of the trailing attempt window, taken after an attempt
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub timestamp: DateTime<Utc>,
    pub success_rate: f64,
    /// Attempts the rate was computed over (less than the window early on)
    pub window: usize,
}

/// Whole-monitor export for dashboards
#[derive(Debug, Clone, Serialize)]
pub struct MonitorSnapshot {
    pub generated_at: DateTime<Utc>,
    pub total_attempts: u64,
    pub successful_attempts: u64,
    pub failed_attempts: u64,
    pub success_rate: f64,
    pub sites: Vec<SiteStats>,
    pub problem_sites: Vec<ProblemSite>,
    pub recent_attempts: Vec<CrawlAttempt>,
    pub trend: Vec<TrendPoint>,
}

impl MonitorSnapshot {
    /// Serializes the snapshot as pretty-printed JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
