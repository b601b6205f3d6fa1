//! Markdown report generation
//!
//! This module generates a human-readable crawl report: overall statistics,
//! problem sites with their most common errors, per-domain strategy
//! performance and the recent success-rate trend.

use crate::fetcher::ErrorCategory;
use crate::monitor::MonitorSnapshot;
use crate::output::OutputResult;
use crate::strategy::CrawlingStats;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Problem sites listed in the report
const MAX_PROBLEM_SITES: usize = 10;

/// Trend points listed in the report
const MAX_TREND_POINTS: usize = 20;

/// Generates a markdown report and writes it to disk
///
/// # Arguments
///
/// * `snapshot` - Monitor state to report on
/// * `performance` - Strategy performance per domain, if available
/// * `output_path` - Path where the markdown file should be written
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote the report
/// * `Err(OutputError)` - Failed to write the report
pub fn generate_markdown_report(
    snapshot: &MonitorSnapshot,
    performance: Option<&CrawlingStats>,
    output_path: &Path,
) -> OutputResult<()> {
    let markdown = format_markdown_report(snapshot, performance);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a monitor snapshot as markdown
///
/// # Arguments
///
/// * `snapshot` - Monitor state to report on
/// * `performance` - Strategy performance per domain, if available
///
/// # Returns
///
/// A formatted markdown string
pub fn format_markdown_report(snapshot: &MonitorSnapshot, performance: Option<&CrawlingStats>) -> String {
    let mut md = String::new();

    md.push_str("# Quillscout Crawl Report\n\n");
    md.push_str(&format!(
        "Generated: {}\n\n",
        snapshot.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    // Overall statistics
    md.push_str("## Overall Statistics\n\n");
    md.push_str(&format!("- **Total Attempts**: {}\n", snapshot.total_attempts));
    md.push_str(&format!("- **Successful**: {}\n", snapshot.successful_attempts));
    md.push_str(&format!("- **Failed**: {}\n", snapshot.failed_attempts));
    md.push_str(&format!(
        "- **Success Rate**: {:.2}%\n",
        snapshot.success_rate * 100.0
    ));
    md.push_str(&format!("- **Domains**: {}\n\n", snapshot.sites.len()));

    // Problem sites
    md.push_str("## Problem Sites\n\n");
    if snapshot.problem_sites.is_empty() {
        md.push_str("No problem sites detected.\n\n");
    } else {
        md.push_str("| Domain | Success Rate | Attempts | Failures | Common Errors |\n");
        md.push_str("|--------|--------------|----------|----------|---------------|\n");

        for site in snapshot.problem_sites.iter().take(MAX_PROBLEM_SITES) {
            md.push_str(&format!(
                "| {} | {:.1}% | {} | {} | {} |\n",
                site.domain,
                site.success_rate * 100.0,
                site.total_attempts,
                site.failed_attempts,
                format_errors(&site.common_errors)
            ));
        }
        if snapshot.problem_sites.len() > MAX_PROBLEM_SITES {
            md.push_str(&format!(
                "\n... and {} more\n",
                snapshot.problem_sites.len() - MAX_PROBLEM_SITES
            ));
        }
        md.push('\n');
    }

    // Strategy performance
    if let Some(stats) = performance {
        if !stats.domains.is_empty() {
            md.push_str("## Strategy Performance\n\n");
            md.push_str("| Domain | Strategy | Attempts | Success Rate | Avg Time (s) | Avg Length |\n");
            md.push_str("|--------|----------|----------|--------------|--------------|------------|\n");

            for domain in &stats.domains {
                for record in &domain.strategies {
                    let marker = if domain.best_strategy == Some(record.strategy) {
                        " (best)"
                    } else {
                        ""
                    };
                    md.push_str(&format!(
                        "| {} | {}{} | {} | {:.1}% | {:.2} | {:.0} |\n",
                        domain.domain,
                        record.strategy,
                        marker,
                        record.total_attempts,
                        record.success_rate() * 100.0,
                        record.avg_response_time(),
                        record.avg_content_length()
                    ));
                }
            }
            md.push('\n');
        }
    }

    // Trend
    if !snapshot.trend.is_empty() {
        md.push_str("## Success Rate Trend\n\n");
        md.push_str("| Time | Success Rate | Window |\n");
        md.push_str("|------|--------------|--------|\n");

        let skip = snapshot.trend.len().saturating_sub(MAX_TREND_POINTS);
        for point in snapshot.trend.iter().skip(skip) {
            md.push_str(&format!(
                "| {} | {:.1}% | {} |\n",
                point.timestamp.format("%H:%M:%S"),
                point.success_rate * 100.0,
                point.window
            ));
        }
        md.push('\n');
    }

    md
}

fn format_errors(errors: &[(ErrorCategory, u64)]) -> String {
    if errors.is_empty() {
        return "-".to_string();
    }
    errors
        .iter()
        .map(|(category, count)| format!("{} ({})", category, count))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::{ProblemSite, TrendPoint};
    use crate::profile::Strategy;
    use crate::strategy::PerformanceLedger;
    use chrono::{TimeZone, Utc};
    use std::time::Duration;

    fn create_test_snapshot() -> MonitorSnapshot {
        MonitorSnapshot {
            generated_at: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
            total_attempts: 40,
            successful_attempts: 30,
            failed_attempts: 10,
            success_rate: 0.75,
            sites: Vec::new(),
            problem_sites: Vec::new(),
            recent_attempts: Vec::new(),
            trend: Vec::new(),
        }
    }

    fn problem_site(domain: &str, failed: u64) -> ProblemSite {
        ProblemSite {
            domain: domain.to_string(),
            success_rate: 0.2,
            total_attempts: failed + 2,
            failed_attempts: failed,
            last_failure: None,
            common_errors: vec![(ErrorCategory::Timeout, failed)],
        }
    }

    #[test]
    fn test_format_markdown_report() {
        let markdown = format_markdown_report(&create_test_snapshot(), None);

        assert!(markdown.contains("# Quillscout Crawl Report"));
        assert!(markdown.contains("Overall Statistics"));
        assert!(markdown.contains("**Total Attempts**: 40"));
        assert!(markdown.contains("75.00%"));
        assert!(markdown.contains("No problem sites detected."));
        assert!(!markdown.contains("Strategy Performance"));
    }

    #[test]
    fn test_markdown_lists_top_problem_sites() {
        let mut snapshot = create_test_snapshot();
        snapshot.problem_sites = (0..12)
            .map(|i| problem_site(&format!("site{:02}.com", i), 20 - i))
            .collect();

        let markdown = format_markdown_report(&snapshot, None);

        assert!(markdown.contains("| site00.com | 20.0% | 22 | 20 | timeout (20) |"));
        assert!(markdown.contains("site09.com"));
        assert!(!markdown.contains("site10.com"));
        assert!(markdown.contains("... and 2 more"));
    }

    #[test]
    fn test_markdown_with_strategy_performance() {
        let ledger = PerformanceLedger::new();
        for _ in 0..3 {
            ledger.record("a.com", Strategy::Lightweight, true, Duration::from_secs(2), 1000);
        }
        ledger.record("a.com", Strategy::Rendering, false, Duration::from_secs(8), 0);

        let stats = ledger.crawling_stats(3);
        let markdown = format_markdown_report(&create_test_snapshot(), Some(&stats));

        assert!(markdown.contains("Strategy Performance"));
        assert!(markdown.contains("| a.com | lightweight (best) | 3 | 100.0% | 2.00 | 1000 |"));
        assert!(markdown.contains("| a.com | rendering | 1 | 0.0% | 8.00 | 0 |"));
    }

    #[test]
    fn test_markdown_with_trend() {
        let mut snapshot = create_test_snapshot();
        snapshot.trend = vec![TrendPoint {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 11, 30, 0).unwrap(),
            success_rate: 0.5,
            window: 2,
        }];

        let markdown = format_markdown_report(&snapshot, None);

        assert!(markdown.contains("Success Rate Trend"));
        assert!(markdown.contains("| 11:30:00 | 50.0% | 2 |"));
    }

    #[test]
    fn test_generate_markdown_report_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.md");

        generate_markdown_report(&create_test_snapshot(), None, &path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("# Quillscout Crawl Report"));
    }
}
