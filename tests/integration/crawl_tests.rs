//! End-to-end crawl tests

use crate::support::{article_html, prose, test_config, Script, ScriptedFetcher};
use quillscout::clock::ManualClock;
use quillscout::crawler::Orchestrator;
use quillscout::extract::ExtractionPath;
use quillscout::fetcher::{ErrorCategory, LightweightFetcher};
use quillscout::profile::Strategy;
use quillscout::Config;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// An orchestrator whose only fetcher is the real lightweight one
fn lightweight_only(config: Config) -> Orchestrator {
    let fetcher = LightweightFetcher::new(&config.lightweight).expect("Failed to build HTTP client");
    Orchestrator::builder(config)
        .fetcher(Arc::new(fetcher))
        .build()
        .expect("Failed to build orchestrator")
}

async fn serve_html(server: &MockServer, route: &str, body: String, expected_hits: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/html; charset=utf-8"))
        .expect(expected_hits)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_article_page_is_extracted() {
    let server = MockServer::start().await;
    let body = prose(7);
    serve_html(&server, "/post", article_html("Title", &body), 1).await;

    let orchestrator = lightweight_only(test_config());
    let result = orchestrator
        .crawl_detailed(&format!("{}/post", server.uri()))
        .await;

    assert!(result.success);
    assert_eq!(result.strategy, Some(Strategy::Lightweight));
    assert_eq!(result.attempts, 1);
    assert!(!result.from_cache);
    assert!(result.text.contains("Title"));
    assert!(result.text.contains(body.trim()));
    assert!(!result.text.contains("Advertisement"));
    assert!(!result.text.contains("Copyright"));

    let stats = orchestrator
        .ledger()
        .stats("127.0.0.1", Strategy::Lightweight)
        .expect("Attempt should be recorded");
    assert_eq!(stats.total_attempts, 1);
    assert_eq!(stats.successful_attempts, 1);
}

#[tokio::test]
async fn test_server_errors_exhaust_every_round() {
    let server = MockServer::start().await;
    // Two crawls of 2 rounds, each round a first try plus 2 retries
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .expect(12)
        .mount(&server)
        .await;

    let orchestrator = lightweight_only(test_config());
    let url = format!("{}/broken", server.uri());
    let result = orchestrator.crawl_detailed(&url).await;

    assert!(!result.success);
    assert_eq!(result.attempts, 2);
    assert_eq!(result.error, Some(ErrorCategory::ServerError));
    assert!(orchestrator.crawl(&url).await.is_none());

    let monitor = orchestrator.monitor();
    assert_eq!(monitor.total_attempts(), 4);
    let site = monitor.site_stats("127.0.0.1").expect("Domain should be tracked");
    assert_eq!(site.successful_attempts, 0);
    assert_eq!(site.failed_attempts, 4);
    assert_eq!(monitor.domain_success_rate("127.0.0.1"), Some(0.0));
    assert_eq!(
        monitor.top_errors("127.0.0.1", 3),
        vec![(ErrorCategory::ServerError, 4)]
    );
    assert_eq!(monitor.trend().last().map(|p| p.success_rate), Some(0.0));
}

#[tokio::test]
async fn test_json_document_is_extracted() {
    let server = MockServer::start().await;
    let body = "B".repeat(250);
    let document = serde_json::json!({ "title": "T", "body": body }).to_string();
    Mock::given(method("GET"))
        .and(path("/api/post"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(document, "application/json"))
        .expect(1)
        .mount(&server)
        .await;

    let orchestrator = lightweight_only(test_config());
    let result = orchestrator
        .crawl_detailed(&format!("{}/api/post", server.uri()))
        .await;

    assert!(result.success);
    assert_eq!(result.path, Some(ExtractionPath::Structured));
    assert!(result.text.lines().any(|line| line == "T"));
    assert!(result.text.contains(&body));
}

#[tokio::test]
async fn test_repeat_crawl_is_served_from_cache() {
    let server = MockServer::start().await;
    serve_html(&server, "/cached", article_html("Cached Story", &prose(6)), 1).await;

    let orchestrator = lightweight_only(test_config());
    let url = format!("{}/cached", server.uri());

    let first = orchestrator.crawl_detailed(&url).await;
    let second = orchestrator.crawl_detailed(&url).await;

    assert!(first.success);
    assert!(second.success);
    assert!(second.from_cache);
    assert_eq!(second.attempts, 0);
    assert_eq!(first.text, second.text);
    assert_eq!(orchestrator.monitor().total_attempts(), 1);
}

#[tokio::test]
async fn test_cache_entry_expires_after_ttl() {
    let server = MockServer::start().await;
    serve_html(&server, "/fresh", article_html("Fresh Story", &prose(6)), 2).await;

    let mut config = test_config();
    config.crawler.cache_ttl_secs = 60;
    let clock = Arc::new(ManualClock::default());
    let fetcher = LightweightFetcher::new(&config.lightweight).unwrap();
    let orchestrator = Orchestrator::builder(config)
        .fetcher(Arc::new(fetcher))
        .clock(clock.clone())
        .build()
        .unwrap();
    let url = format!("{}/fresh", server.uri());

    assert!(!orchestrator.crawl_detailed(&url).await.from_cache);

    clock.advance(chrono::Duration::seconds(59));
    assert!(orchestrator.crawl_detailed(&url).await.from_cache);

    clock.advance(chrono::Duration::seconds(1));
    let refetched = orchestrator.crawl_detailed(&url).await;
    assert!(refetched.success);
    assert!(!refetched.from_cache);
}

#[tokio::test]
async fn test_unsupported_content_ends_the_crawl() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/logo.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0x89, 0x50, 0x4e, 0x47], "image/png"))
        .expect(1)
        .mount(&server)
        .await;

    let orchestrator = lightweight_only(test_config());
    let result = orchestrator
        .crawl_detailed(&format!("{}/logo.png", server.uri()))
        .await;

    assert!(!result.success);
    assert_eq!(result.attempts, 1);
    assert_eq!(result.error, Some(ErrorCategory::UnsupportedContent));
}

#[tokio::test]
async fn test_invalid_url_fails_without_fetching() {
    let lightweight = ScriptedFetcher::new(Strategy::Lightweight, Script::Html(article_html("X", &prose(6))));
    let orchestrator = Orchestrator::builder(test_config())
        .fetcher(lightweight.clone())
        .build()
        .unwrap();

    for input in ["not a url", "ftp://example.com/file", ""] {
        let result = orchestrator.crawl_detailed(input).await;
        assert!(!result.success);
        assert_eq!(result.attempts, 0);
        assert_eq!(result.error, Some(ErrorCategory::InvalidInput));
    }
    assert!(orchestrator.crawl("not a url").await.is_none());

    assert_eq!(lightweight.calls(), 0);
    assert_eq!(orchestrator.monitor().total_attempts(), 0);
}

#[tokio::test]
async fn test_consistent_winner_is_promoted() {
    let lightweight = ScriptedFetcher::new(Strategy::Lightweight, Script::ServerError);
    let renderer = ScriptedFetcher::new(
        Strategy::Rendering,
        Script::Html(article_html("Rendered", &prose(6))),
    );
    let orchestrator = Orchestrator::builder(test_config())
        .fetcher(lightweight.clone())
        .fetcher(renderer.clone())
        .build()
        .unwrap();

    assert_eq!(
        orchestrator.selector().select("news.example.com")[0],
        Strategy::Lightweight
    );

    for page in ["a", "b", "c"] {
        let result = orchestrator
            .crawl_detailed(&format!("https://news.example.com/{}", page))
            .await;
        assert!(result.success);
        assert_eq!(result.strategy, Some(Strategy::Rendering));
        assert_eq!(result.attempts, 2);
    }

    assert_eq!(
        orchestrator.selector().select("news.example.com")[0],
        Strategy::Rendering
    );

    let result = orchestrator
        .crawl_detailed("https://news.example.com/d")
        .await;
    assert!(result.success);
    assert_eq!(result.attempts, 1);
    assert_eq!(lightweight.calls(), 3);
    assert_eq!(renderer.calls(), 4);

    let stats = orchestrator.crawling_stats();
    assert_eq!(stats.domains[0].best_strategy, Some(Strategy::Rendering));
}

#[tokio::test]
async fn test_broken_browser_is_abandoned_for_the_crawl() {
    let lightweight = ScriptedFetcher::new(Strategy::Lightweight, Script::ServerError);
    let renderer = ScriptedFetcher::new(Strategy::Rendering, Script::BrowserUnavailable);
    let orchestrator = Orchestrator::builder(test_config())
        .fetcher(lightweight.clone())
        .fetcher(renderer.clone())
        .build()
        .unwrap();

    let result = orchestrator
        .crawl_detailed("https://spa.example.com/app")
        .await;

    assert!(!result.success);
    assert_eq!(result.attempts, 3);
    assert_eq!(lightweight.calls(), 2);
    assert_eq!(renderer.calls(), 1);
    assert_eq!(
        orchestrator.monitor().top_errors("spa.example.com", 3),
        vec![
            (ErrorCategory::ServerError, 2),
            (ErrorCategory::RenderingEnvironment, 1)
        ]
    );
}

#[tokio::test]
async fn test_forced_strategy_bypasses_selection() {
    let server = MockServer::start().await;
    serve_html(&server, "/forced", article_html("Plain", &prose(6)), 0).await;

    let config = test_config();
    let lightweight = LightweightFetcher::new(&config.lightweight).unwrap();
    let renderer = ScriptedFetcher::new(
        Strategy::Rendering,
        Script::Html(article_html("Rendered Headline", &prose(6))),
    );
    let orchestrator = Orchestrator::builder(config)
        .fetcher(Arc::new(lightweight))
        .fetcher(renderer.clone())
        .build()
        .unwrap();

    let result = orchestrator
        .crawl_with_strategy(&format!("{}/forced", server.uri()), Strategy::Rendering)
        .await;

    assert!(result.success);
    assert_eq!(result.strategy, Some(Strategy::Rendering));
    assert!(result.text.contains("Rendered Headline"));
    assert_eq!(renderer.calls(), 1);

    let forced_missing = orchestrator
        .crawl_with_strategy("https://example.com/x", Strategy::Hybrid)
        .await;
    assert!(!forced_missing.success);
    assert_eq!(forced_missing.attempts, 0);
}

#[tokio::test]
async fn test_extraction_is_deterministic_across_orchestrators() {
    let markup = article_html("Deterministic", &prose(8));
    let first = ScriptedFetcher::new(Strategy::Lightweight, Script::Html(markup.clone()));
    let second = ScriptedFetcher::new(Strategy::Lightweight, Script::Html(markup));

    let a = Orchestrator::builder(test_config()).fetcher(first).build().unwrap();
    let b = Orchestrator::builder(test_config()).fetcher(second).build().unwrap();

    let url = "https://example.com/story";
    let left = a.crawl_detailed(url).await;
    let right = b.crawl_detailed(url).await;

    assert!(left.success);
    assert_eq!(left.text, right.text);
    assert_eq!(left.path, right.path);
}

#[tokio::test]
async fn test_batch_crawl_shares_state_across_concurrent_crawls() {
    let fetcher = ScriptedFetcher::with_delay(
        Strategy::Lightweight,
        Script::Html(article_html("Batch Story", &prose(6))),
        Duration::from_millis(50),
    );
    let mut config = test_config();
    config.crawler.batch_concurrency = 4;
    let orchestrator = Orchestrator::builder(config)
        .fetcher(fetcher.clone())
        .build()
        .unwrap();

    let mut urls: Vec<String> = (0..6)
        .map(|i| format!("https://alpha.example.com/post/{}", i))
        .collect();
    urls.push("https://beta.example.com/one".to_string());
    urls.push("not a url".to_string());
    urls.push("https://beta.example.com/two".to_string());

    let results = orchestrator.crawl_batch(urls.clone()).await;

    assert_eq!(results.len(), urls.len());
    for ((url, text), expected) in results.iter().zip(&urls) {
        assert_eq!(url, expected);
        if url == "not a url" {
            assert!(text.is_none());
        } else {
            assert!(text.as_deref().unwrap_or_default().contains("Batch Story"));
        }
    }

    assert_eq!(fetcher.calls(), 8);
    assert!(fetcher.peak_in_flight() > 1);
    assert!(fetcher.peak_in_flight() <= 4);

    let alpha = orchestrator
        .ledger()
        .stats("alpha.example.com", Strategy::Lightweight)
        .unwrap();
    assert_eq!(alpha.total_attempts, 6);
    assert_eq!(alpha.successful_attempts, 6);

    let monitor = orchestrator.monitor();
    assert_eq!(monitor.total_attempts(), 8);
    assert_eq!(monitor.site_stats("beta.example.com").unwrap().successful_attempts, 2);
    assert_eq!(orchestrator.cache().len(), 8);

    let again = orchestrator.crawl_batch(urls[..2].to_vec()).await;
    assert!(again.iter().all(|(_, text)| text.is_some()));
    assert_eq!(fetcher.calls(), 8);
}
