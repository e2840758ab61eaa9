//! Integration tests for the harvester
//!
//! These tests use wiremock to serve a small repository (listing pages plus
//! detail pages) and run the full pipeline against it over HTTP.

use gleaner::config::Config;
use gleaner::crawler::{Coordinator, FetchSession, HttpSessionFactory, SessionFactory, SessionProfile};
use gleaner::output::RunStats;
use gleaner::storage::{read_json, ResumeStore};
use gleaner::{CandidateLink, DetailRecord, FetchError, GleanError, StopSignal};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a fast test configuration pointing at the mock server
fn create_test_config(base_url: &str, outdir: &TempDir) -> Config {
    let mut config = Config::default();
    config.source.base_url = format!("{}/publications", base_url);
    config.source.request_timeout_secs = 5;
    config.crawl.workers = 2;
    config.crawl.delay = 0.0;
    config.crawl.listing_delay = 0.0;
    config.crawl.listing_jitter = 0.0;
    config.crawl.backoff_base_ms = 5;
    config.crawl.backoff_max_ms = 10;
    config.output.directory = outdir.path().to_path_buf();
    config
}

fn listing_html(items: &[(&str, &str)]) -> String {
    let cards: String = items
        .iter()
        .map(|(href, title)| {
            format!(
                r#"<div class="result-container"><h3 class="title"><a href="{}">{}</a></h3></div>"#,
                href, title
            )
        })
        .collect();
    format!("<html><body>{}</body></html>", cards)
}

fn detail_html(title: &str, author: &str, date: &str) -> String {
    format!(
        r#"<html><body>
          <h1>{title}</h1>
          <div class="relations persons"><a href="/en/persons/x"><span>{author}</span></a></div>
          <span class="date">{date}</span>
          <section id="abstract"><div class="textblock">An abstract long enough to count for {title}.</div></section>
        </body></html>"#
    )
}

async fn mount_html(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

async fn mount_listing_page(server: &MockServer, page: u32, body: String) {
    Mock::given(method("GET"))
        .and(path("/publications"))
        .and(query_param("page", page.to_string()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_run_over_http() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let outdir = TempDir::new().unwrap();

    mount_listing_page(
        &mock_server,
        0,
        listing_html(&[("/pub/a", "Paper A"), ("/pub/b/", "Paper B")]),
    )
    .await;
    mount_listing_page(
        &mock_server,
        1,
        listing_html(&[("/pub/c", "Paper C"), ("/pub/a#top", "Paper A again")]),
    )
    .await;
    mount_listing_page(&mock_server, 2, listing_html(&[])).await;

    mount_html(&mock_server, "/pub/a", detail_html("Paper A: Full", "Ada Lovelace", "2021")).await;
    mount_html(&mock_server, "/pub/b", detail_html("Paper B: Full", "Alan Turing", "2022")).await;
    Mock::given(method("GET"))
        .and(path("/pub/c"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let config = create_test_config(&base_url, &outdir);
    let coordinator = Coordinator::new(config.clone(), StopSignal::new()).expect("Failed to create coordinator");
    let summary = coordinator.run().await.expect("Run failed");

    assert_eq!(summary.candidates, 3);
    assert_eq!(summary.records, 3);
    assert_eq!(summary.placeholders, 1);

    let dataset: Vec<DetailRecord> = read_json(&config.output.dataset_path())
        .expect("Failed to read dataset")
        .expect("Dataset missing");
    assert_eq!(dataset.len(), 3);

    let a = &dataset[0];
    assert_eq!(a.link, format!("{}/pub/a", base_url));
    assert_eq!(a.title, "Paper A: Full");
    assert_eq!(a.authors, vec!["Ada Lovelace"]);
    assert_eq!(a.published_date.as_deref(), Some("2021"));

    let c = dataset
        .iter()
        .find(|r| r.link.ends_with("/pub/c"))
        .expect("Paper C missing");
    assert_eq!(c.title, "Paper C");
    assert!(c.authors.is_empty());
    assert!(c.published_date.is_none());
    assert!(c.abstract_text.is_empty());

    let links: Vec<CandidateLink> = read_json(&config.output.links_path())
        .expect("Failed to read candidates")
        .expect("Candidates missing");
    assert_eq!(links.len(), 3);
    assert_eq!(links[0].title, "Paper A again");

    let stats: RunStats = read_json(&config.output.stats_path())
        .expect("Failed to read stats")
        .expect("Stats missing");
    assert_eq!(stats.total_records, 3);
    assert_eq!(stats.performance.error_count, 1);
    assert_eq!(stats.workers, 2);
}

#[tokio::test]
async fn test_resume_skips_listing_over_http() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let outdir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/publications"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0) // The listing must never be requested
        .mount(&mock_server)
        .await;
    mount_html(&mock_server, "/pub/x", detail_html("X", "Grace Hopper", "2019")).await;

    let mut config = create_test_config(&base_url, &outdir);
    config.crawl.resume = true;
    ResumeStore::new(config.output.links_path())
        .save(&[CandidateLink::new("X", format!("{}/pub/x", base_url))])
        .expect("Failed to save candidates");

    let coordinator = Coordinator::new(config, StopSignal::new()).expect("Failed to create coordinator");
    let summary = coordinator.run().await.expect("Run failed");

    assert!(summary.listing_skipped);
    assert_eq!(summary.records, 1);
    assert_eq!(summary.placeholders, 0);

    // Wiremock will automatically verify expect(0) when the mock server drops
}

#[tokio::test]
async fn test_listing_retries_transient_status() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let outdir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/publications"))
        .and(query_param("page", "0"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&mock_server)
        .await;
    mount_listing_page(&mock_server, 0, listing_html(&[("/pub/r", "Retried")])).await;
    mount_listing_page(&mock_server, 1, listing_html(&[])).await;
    mount_html(&mock_server, "/pub/r", detail_html("Retried", "Barbara Liskov", "2020")).await;

    let config = create_test_config(&base_url, &outdir);
    let summary = Coordinator::new(config, StopSignal::new())
        .expect("Failed to create coordinator")
        .run()
        .await
        .expect("Run failed");

    assert_eq!(summary.records, 1);
    assert_eq!(summary.placeholders, 0);
}

#[tokio::test]
async fn test_empty_listing_fails_run() {
    let mock_server = MockServer::start().await;
    let outdir = TempDir::new().unwrap();
    mount_listing_page(&mock_server, 0, listing_html(&[])).await;

    let config = create_test_config(&mock_server.uri(), &outdir);
    let err = Coordinator::new(config.clone(), StopSignal::new())
        .expect("Failed to create coordinator")
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, GleanError::NoCandidates { pages: 1 }));
    assert!(!config.output.dataset_path().exists());
}

#[tokio::test]
async fn test_http_session_classifies_failures() {
    let mock_server = MockServer::start().await;
    let outdir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&mock_server)
        .await;

    let mut config = create_test_config(&mock_server.uri(), &outdir);
    config.source.fast_timeout_secs = 1;
    let factory = HttpSessionFactory::new(config.source.clone()).expect("Failed to create factory");
    let mut session = factory
        .open(SessionProfile::detail(true))
        .await
        .expect("Failed to open session");

    let missing = CandidateLink::new("Missing", format!("{}/missing", mock_server.uri()));
    match session.fetch_detail(&missing).await {
        Err(FetchError::Status { status, .. }) => assert_eq!(status, 404),
        other => panic!("expected a status error, got {:?}", other),
    }

    let slow = CandidateLink::new("Slow", format!("{}/slow", mock_server.uri()));
    let err = session.fetch_detail(&slow).await.unwrap_err();
    assert!(matches!(err, FetchError::Timeout { .. }));
    assert!(err.is_retryable());

    session.close().await.expect("Failed to close session");
}
