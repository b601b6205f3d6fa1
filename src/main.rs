//! Quillscout main entry point
//!
//! This is the command-line interface for the Quillscout content crawler:
//! ad-hoc crawls, configuration checks, telemetry statistics and reports.

use anyhow::Context;
use clap::Parser;
use parking_lot::Mutex;
use quillscout::clock::{Clock, SystemClock};
use quillscout::config::{load_config_with_hash, Config};
use quillscout::crawler::{ExtractionResult, Orchestrator};
use quillscout::monitor::{CrawlMonitor, MaintenanceTask, SharedStore};
use quillscout::output::{
    export_snapshot_json, generate_markdown_report, load_statistics, print_crawling_stats,
    print_statistics,
};
use quillscout::profile::Strategy;
use quillscout::storage::{open_store, TelemetryStore};
use quillscout::strategy::PerformanceLedger;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Stored attempts replayed into the monitor when exporting a report
const REPORT_HISTORY_LIMIT: usize = 10_000;

/// Quillscout: an adaptive multi-strategy content crawler
///
/// Quillscout extracts the main text of arbitrary web pages, learning per
/// domain which fetch strategy works best and keeping telemetry about
/// problem sites.
#[derive(Parser, Debug)]
#[command(name = "quillscout")]
#[command(version)]
#[command(about = "An adaptive multi-strategy content crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// URLs to crawl
    #[arg(value_name = "URL", required_unless_present_any = ["dry_run", "stats", "export_report"])]
    urls: Vec<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Use only this strategy (lightweight, rendering, advanced-rendering, hybrid)
    #[arg(long, value_name = "STRATEGY")]
    strategy: Option<Strategy>,

    /// Print the extracted text of each successful crawl
    #[arg(long)]
    print_text: bool,

    /// Write the monitor snapshot as JSON after crawling
    #[arg(long, value_name = "PATH")]
    snapshot: Option<PathBuf>,

    /// Do not persist telemetry to the database
    #[arg(long)]
    no_persist: bool,

    /// Validate config and show the site profiles without crawling
    #[arg(long, conflicts_with_all = ["stats", "export_report"])]
    dry_run: bool,

    /// Show statistics from the telemetry database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export_report"])]
    stats: bool,

    /// Generate the markdown report from the telemetry database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    export_report: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.export_report {
        handle_export_report(&config)?;
    } else {
        handle_crawl(config, &cli).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("quillscout=info,warn"),
            1 => EnvFilter::new("quillscout=debug,info"),
            2 => EnvFilter::new("quillscout=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config) {
    println!("=== Quillscout Dry Run ===\n");

    println!("Crawler:");
    println!("  Min content length: {}", config.crawler.min_content_length);
    println!("  Strategy delay: {}ms", config.crawler.strategy_delay_ms);
    println!("  Batch concurrency: {}", config.crawler.batch_concurrency);
    println!(
        "  Cache: {} entries, {}s TTL",
        config.crawler.cache_capacity, config.crawler.cache_ttl_secs
    );

    println!("\nFetching:");
    println!(
        "  Lightweight: {} concurrent, {} retries",
        config.lightweight.max_concurrent, config.lightweight.retries
    );
    println!(
        "  Rendering: {} browser sessions, headless: {}",
        config.rendering.max_sessions, config.rendering.headless
    );

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Report: {}", config.output.report_path);

    println!(
        "\nDefault Profile: {} (fallbacks: {})",
        config.default_profile.recommended,
        join_strategies(&config.default_profile.fallbacks)
    );

    println!("\nSite Profiles ({}):", config.sites.len());
    for site in &config.sites {
        println!(
            "  - {} ({}, fallbacks: {}, timeout {}s, {} retries)",
            site.domain,
            site.recommended,
            join_strategies(&site.fallbacks),
            site.timeout_secs,
            site.retry_count
        );
        if !site.content_selectors.is_empty() {
            println!("    content: {}", site.content_selectors.join(", "));
        }
    }

    println!("\n✓ Configuration is valid");
}

fn join_strategies(strategies: &[Strategy]) -> String {
    if strategies.is_empty() {
        return "none".to_string();
    }
    strategies
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let store = open_store(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&store, config.selection.min_attempts)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --export-report mode: rebuilds the monitor from stored
/// attempts and writes the markdown report
fn handle_export_report(config: &Config) -> anyhow::Result<()> {
    println!("=== Exporting Crawl Report ===\n");
    println!("Database: {}", config.output.database_path);
    println!("Output: {}", config.output.report_path);
    println!();

    let store = open_store(Path::new(&config.output.database_path))?;

    tracing::info!("Loading telemetry from database...");
    let ledger = PerformanceLedger::new();
    ledger.load(store.load_performance()?);

    let monitor = CrawlMonitor::new(config.monitor.clone(), Arc::new(SystemClock));
    let mut attempts = store.recent_attempts(REPORT_HISTORY_LIMIT)?;
    attempts.reverse();
    for attempt in attempts {
        monitor.record(attempt);
    }

    tracing::info!("Generating markdown report...");
    let performance = ledger.crawling_stats(config.selection.min_attempts);
    generate_markdown_report(
        &monitor.snapshot(),
        Some(&performance),
        Path::new(&config.output.report_path),
    )?;

    println!("✓ Report exported to: {}", config.output.report_path);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, cli: &Cli) -> anyhow::Result<()> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let ledger = Arc::new(PerformanceLedger::new());
    let monitor = Arc::new(CrawlMonitor::new(config.monitor.clone(), clock.clone()));

    let store: Option<SharedStore> = if cli.no_persist {
        None
    } else {
        let store = open_store(Path::new(&config.output.database_path))?;
        let records = store.load_performance()?;
        tracing::info!("Warm-starting strategy ledger with {} records", records.len());
        ledger.load(records);
        Some(Arc::new(Mutex::new(store)))
    };

    let orchestrator = Orchestrator::builder(config.clone())
        .clock(clock.clone())
        .ledger(ledger.clone())
        .monitor(monitor.clone())
        .with_default_fetchers()?
        .build()?;

    let mut maintenance = MaintenanceTask::new(monitor.clone(), ledger.clone(), clock, &config.monitor);
    if let Some(store) = store {
        maintenance = maintenance.with_store(store);
    }
    let maintenance = maintenance.start();

    let mut succeeded = 0usize;
    for url in &cli.urls {
        let result = match cli.strategy {
            Some(strategy) => orchestrator.crawl_with_strategy(url, strategy).await,
            None => orchestrator.crawl_detailed(url).await,
        };
        if result.success {
            succeeded += 1;
        }
        print_result(&result, cli.print_text);
    }

    let report = maintenance.stop().await;
    tracing::info!(
        "Persisted {} attempts and {} ledger records",
        report.persisted_attempts,
        report.persisted_records
    );
    orchestrator.shutdown();

    println!("\n{} of {} URLs crawled successfully\n", succeeded, cli.urls.len());
    print_crawling_stats(&orchestrator.crawling_stats());

    if let Some(path) = &cli.snapshot {
        export_snapshot_json(&orchestrator.snapshot(), path)?;
        println!("✓ Snapshot written to: {}", path.display());
    }

    Ok(())
}

fn print_result(result: &ExtractionResult, print_text: bool) {
    if result.success {
        let source = if result.from_cache {
            "cache".to_string()
        } else {
            format!(
                "{} via {}",
                result.strategy.map(|s| s.as_str()).unwrap_or("unknown"),
                result.path.map(|p| p.as_str()).unwrap_or("unknown")
            )
        };
        println!(
            "✓ {} ({} chars, {}, {:.2}s)",
            result.url,
            result.content_length(),
            source,
            result.response_time.as_secs_f64()
        );
        if print_text {
            println!("\n{}\n", result.text);
        }
    } else {
        println!(
            "✗ {} ({} attempts, last error: {})",
            result.url,
            result.attempts,
            result.error.map(|e| e.as_str()).unwrap_or("none")
        );
    }
}
