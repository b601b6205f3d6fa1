//! Telemetry tests: problem sites, persistence, warm starts and reports

use crate::support::{article_html, prose, test_config, Script, ScriptedFetcher};
use parking_lot::Mutex;
use quillscout::clock::{Clock, ManualClock};
use quillscout::config::load_config;
use quillscout::crawler::Orchestrator;
use quillscout::extract::ExtractionPath;
use quillscout::monitor::{CrawlMonitor, MaintenanceTask, SharedStore};
use quillscout::output::{generate_markdown_report, load_statistics};
use quillscout::profile::Strategy;
use quillscout::storage::{open_store, TelemetryStore};
use quillscout::strategy::PerformanceLedger;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tempfile::{tempdir, NamedTempFile};

#[tokio::test]
async fn test_problem_site_stays_flagged_as_failures_accumulate() {
    let lightweight = ScriptedFetcher::new(Strategy::Lightweight, Script::ServerError);
    let orchestrator = Orchestrator::builder(test_config())
        .fetcher(lightweight)
        .build()
        .unwrap();
    let monitor = orchestrator.monitor().clone();

    let mut flagged = false;
    for page in 0..6 {
        let result = orchestrator
            .crawl_detailed(&format!("https://flaky.example.com/{}", page))
            .await;
        assert!(!result.success);

        let now_flagged = monitor.is_problem_site("flaky.example.com");
        assert!(!flagged || now_flagged, "problem site was unflagged after page {}", page);
        flagged = now_flagged;
    }

    assert!(flagged);
    let problems = monitor.problem_sites();
    assert_eq!(problems.len(), 1);
    assert_eq!(problems[0].domain, "flaky.example.com");
    assert_eq!(problems[0].failed_attempts, 12);
}

#[tokio::test]
async fn test_healthy_site_is_not_a_problem() {
    let lightweight = ScriptedFetcher::new(
        Strategy::Lightweight,
        Script::Html(article_html("Healthy", &prose(6))),
    );
    let orchestrator = Orchestrator::builder(test_config())
        .fetcher(lightweight)
        .build()
        .unwrap();

    for page in 0..5 {
        orchestrator
            .crawl_detailed(&format!("https://healthy.example.com/{}", page))
            .await;
    }

    assert!(!orchestrator.monitor().is_problem_site("healthy.example.com"));
    assert!(orchestrator.monitor().problem_sites().is_empty());
    assert_eq!(orchestrator.monitor().domain_success_rate("healthy.example.com"), Some(1.0));
}

#[tokio::test]
async fn test_telemetry_persists_and_warm_starts_the_ledger() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("telemetry.db");

    let mut config = test_config();
    config.output.database_path = db_path.display().to_string();

    let clock: Arc<dyn Clock> = Arc::new(ManualClock::default());
    let ledger = Arc::new(PerformanceLedger::new());
    let monitor = Arc::new(CrawlMonitor::new(config.monitor.clone(), clock.clone()));
    let store: SharedStore = Arc::new(Mutex::new(open_store(&db_path).unwrap()));

    let orchestrator = Orchestrator::builder(config.clone())
        .fetcher(ScriptedFetcher::new(Strategy::Lightweight, Script::ServerError))
        .fetcher(ScriptedFetcher::new(
            Strategy::Rendering,
            Script::Html(article_html("Rendered", &prose(6))),
        ))
        .clock(clock.clone())
        .ledger(ledger.clone())
        .monitor(monitor.clone())
        .build()
        .unwrap();

    let maintenance = MaintenanceTask::new(monitor, ledger, clock, &config.monitor)
        .with_store(store)
        .with_interval(Duration::from_secs(3600))
        .start();

    for page in ["a", "b", "c"] {
        assert!(orchestrator
            .crawl_detailed(&format!("https://app.example.com/{}", page))
            .await
            .success);
    }

    let report = maintenance.stop().await;
    assert_eq!(report.persisted_attempts, 6);
    assert_eq!(report.persisted_records, 2);

    let reopened = open_store(&db_path).unwrap();
    let stats = load_statistics(&reopened, config.selection.min_attempts).unwrap();
    assert_eq!(stats.total_attempts, 6);
    assert_eq!(stats.successful_attempts, 3);
    assert_eq!(stats.performance.domains[0].best_strategy, Some(Strategy::Rendering));

    let warm = Arc::new(PerformanceLedger::new());
    warm.load(reopened.load_performance().unwrap());
    let restarted = Orchestrator::builder(config)
        .fetcher(ScriptedFetcher::new(Strategy::Lightweight, Script::ServerError))
        .ledger(warm)
        .build()
        .unwrap();

    assert_eq!(
        restarted.selector().select("app.example.com")[0],
        Strategy::Rendering
    );
}

#[tokio::test]
async fn test_site_profile_from_config_file() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[crawler]
strategy-delay-ms = 0

[[site]]
domain = "www.Magazine.example"
strategy = "rendering"
fallbacks = ["lightweight"]
retry-count = 1
content-selectors = [".story-body"]
exclude-selectors = [".pullquote"]
"#
    )
    .unwrap();
    file.flush().unwrap();

    let config = load_config(file.path()).unwrap();
    let markup = format!(
        "<html><body><div class=\"story-body\"><h2>Cover Story</h2><p>{}</p>\
         <blockquote class=\"pullquote\">A quote repeated for emphasis</blockquote></div>\
         <div class=\"teaser\">{}</div></body></html>",
        prose(5),
        prose(8)
    );
    let lightweight = ScriptedFetcher::new(Strategy::Lightweight, Script::ServerError);
    let renderer = ScriptedFetcher::new(Strategy::Rendering, Script::Html(markup));
    let orchestrator = Orchestrator::builder(config)
        .fetcher(lightweight.clone())
        .fetcher(renderer.clone())
        .build()
        .unwrap();

    assert!(orchestrator.registry().contains("magazine.example"));

    let result = orchestrator
        .crawl_detailed("https://www.magazine.example/2024/cover")
        .await;

    assert!(result.success);
    assert_eq!(result.strategy, Some(Strategy::Rendering));
    assert_eq!(result.path, Some(ExtractionPath::Profile));
    assert!(result.text.starts_with("Cover Story"));
    assert!(!result.text.contains("A quote repeated"));
    assert_eq!(lightweight.calls(), 0);
}

#[tokio::test]
async fn test_report_lists_problem_sites() {
    let lightweight = ScriptedFetcher::new(Strategy::Lightweight, Script::ServerError);
    let orchestrator = Orchestrator::builder(test_config())
        .fetcher(lightweight)
        .build()
        .unwrap();

    for page in 0..3 {
        orchestrator
            .crawl_detailed(&format!("https://down.example.com/{}", page))
            .await;
    }

    let dir = tempdir().unwrap();
    let report_path = dir.path().join("report.md");
    generate_markdown_report(
        &orchestrator.snapshot(),
        Some(&orchestrator.crawling_stats()),
        &report_path,
    )
    .unwrap();

    let report = std::fs::read_to_string(&report_path).unwrap();
    assert!(report.contains("## Problem Sites"));
    assert!(report.contains("| down.example.com | 0.0% | 6 | 6 | server_error (6) |"));
    assert!(report.contains("## Strategy Performance"));
}

#[test]
fn test_example_config_loads() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("config.example.toml");
    let config = load_config(&path).expect("example config should be valid");

    assert_eq!(config.sites.len(), 13);
    let orchestrator = Orchestrator::builder(config).build().unwrap();
    let profile = orchestrator.registry().resolve("www.facebook.com");
    assert_eq!(profile.recommended, Strategy::AdvancedRendering);
    assert!(profile.anti_bot);
    assert_eq!(
        orchestrator.selector().select("facebook.com"),
        vec![Strategy::AdvancedRendering, Strategy::Rendering, Strategy::Lightweight]
    );
}
