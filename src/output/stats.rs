//! Statistics from persisted telemetry
//!
//! This module provides functionality for extracting and displaying
//! telemetry statistics from the storage layer.

use crate::fetcher::ErrorCategory;
use crate::monitor::CrawlAttempt;
use crate::output::OutputResult;
use crate::storage::TelemetryStore;
use crate::strategy::{CrawlingStats, PerformanceLedger};

/// Failed attempts listed by `print_statistics`
const RECENT_FAILURES: usize = 10;

/// Telemetry statistics summary
#[derive(Debug, Clone)]
pub struct TelemetryStatistics {
    /// Attempts currently stored (within the retention window)
    pub total_attempts: u64,

    pub successful_attempts: u64,

    /// Failure counts per category, most common first
    pub error_summary: Vec<(ErrorCategory, u64)>,

    /// Strategy performance per domain
    pub performance: CrawlingStats,

    /// Most recent failed attempts, newest first
    pub recent_failures: Vec<CrawlAttempt>,
}

impl TelemetryStatistics {
    pub fn success_rate(&self) -> f64 {
        if self.total_attempts == 0 {
            return 0.0;
        }
        self.successful_attempts as f64 / self.total_attempts as f64
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `store` - The telemetry store to query
/// * `min_attempts` - Attempts a strategy needs before it is named best for a domain
///
/// # Returns
///
/// * `Ok(TelemetryStatistics)` - Successfully loaded statistics
/// * `Err(OutputError)` - Failed to query statistics
pub fn load_statistics(store: &dyn TelemetryStore, min_attempts: u64) -> OutputResult<TelemetryStatistics> {
    let total_attempts = store.count_attempts()?;
    let successful_attempts = store.count_successful_attempts()?;
    let error_summary = store.error_summary()?;

    let ledger = PerformanceLedger::new();
    ledger.load(store.load_performance()?);

    let recent_failures = store
        .recent_attempts(1000)?
        .into_iter()
        .filter(|attempt| !attempt.success)
        .take(RECENT_FAILURES)
        .collect();

    Ok(TelemetryStatistics {
        total_attempts,
        successful_attempts,
        error_summary,
        performance: ledger.crawling_stats(min_attempts),
        recent_failures,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &TelemetryStatistics) {
    println!("=== Crawl Telemetry ===\n");

    println!("Stored Attempts:");
    println!("  Total attempts: {}", stats.total_attempts);
    println!("  Successful: {}", stats.successful_attempts);
    println!(
        "  Failed: {}",
        stats.total_attempts.saturating_sub(stats.successful_attempts)
    );
    println!("  Success rate: {:.1}%", stats.success_rate() * 100.0);
    println!();

    if !stats.error_summary.is_empty() {
        println!("Error Summary:");
        for (category, count) in &stats.error_summary {
            println!("  {}: {}", category, count);
        }
        println!();
    }

    print_crawling_stats(&stats.performance);

    if !stats.recent_failures.is_empty() {
        println!("Recent Failures:");
        for attempt in &stats.recent_failures {
            println!(
                "  {} [{}] {} ({})",
                attempt.timestamp.format("%Y-%m-%d %H:%M:%S"),
                attempt.strategy,
                attempt.url,
                attempt
                    .error
                    .map(|e| e.as_str())
                    .unwrap_or("unknown")
            );
        }
    }
}

/// Prints per-domain strategy performance
pub fn print_crawling_stats(stats: &CrawlingStats) {
    println!("Strategy Performance ({} domains):", stats.total_domains);
    println!(
        "  Ledger attempts: {} ({:.1}% successful, avg {:.2}s, avg {:.0} chars)",
        stats.overall.total_attempts,
        stats.overall.success_rate * 100.0,
        stats.overall.avg_response_time,
        stats.overall.avg_content_length
    );

    for domain in &stats.domains {
        println!(
            "  {} - {} attempts, {:.1}% successful, best: {}",
            domain.domain,
            domain.total_attempts,
            domain.success_rate * 100.0,
            domain
                .best_strategy
                .map(|s| s.as_str())
                .unwrap_or("undetermined")
        );
        for record in &domain.strategies {
            println!(
                "    {:<20} {:>4} attempts  {:>5.1}%  {:>6.2}s",
                record.strategy.as_str(),
                record.total_attempts,
                record.success_rate() * 100.0,
                record.avg_response_time()
            );
        }
    }
    println!();
}
