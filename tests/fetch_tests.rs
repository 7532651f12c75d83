//! Integration tests for the fetch stage
//!
//! These tests run the fetcher against wiremock servers to check the retry
//! policy, redirect handling and header-driven pacing.

use cctld_crawler::config::CrawlerConfig;
use cctld_crawler::crawler::{
    build_http_client, FetchOutcome, Fetcher, HeaderPacing, NoPacing, PacingPolicy, RetryPolicy,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(tries: u32) -> CrawlerConfig {
    CrawlerConfig {
        seeds: vec![],
        max_concurrent_fetches: 2,
        tries,
        retry_backoff_ms: 10,
        request_timeout_secs: 1,
        honor_rate_limit_headers: false,
    }
}

fn fetcher(config: &CrawlerConfig, pacing: Arc<dyn PacingPolicy>) -> Fetcher {
    Fetcher::new(
        build_http_client(config).expect("Failed to build client"),
        RetryPolicy::from_config(config),
        pacing,
    )
}

fn url(server: &MockServer, route: &str) -> Url {
    Url::parse(&format!("{}{}", server.uri(), route)).expect("Failed to parse mock URL")
}

#[tokio::test]
async fn test_fetch_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html><body><p>Olá</p></body></html>")
                .insert_header("server", "mock"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let outcome = fetcher(&test_config(3), Arc::new(NoPacing))
        .fetch(&url(&server, "/"))
        .await;

    match outcome {
        FetchOutcome::Fetched(result) => {
            assert_eq!(result.status, Some(200));
            assert_eq!(result.attempts, 1);
            assert!(result.is_processable());
            assert!(result.body.unwrap().contains("Olá"));
            assert!(result
                .headers
                .iter()
                .any(|(name, value)| name == "server" && value == "mock"));
        }
        other => panic!("Expected a response, got {:?}", other),
    }
}

#[tokio::test]
async fn test_error_status_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not here"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = fetcher(&test_config(5), Arc::new(NoPacing));

    for route in ["/missing", "/busy"] {
        match fetcher.fetch(&url(&server, route)).await {
            FetchOutcome::Fetched(result) => {
                assert!(result.status.unwrap() >= 400);
                assert_eq!(result.body, None);
                assert_eq!(result.attempts, 1);
                assert!(!result.is_processable());
            }
            other => panic!("Expected a response for {}, got {:?}", route, other),
        }
    }
}

#[tokio::test]
async fn test_connection_failure_exhausts_retries() {
    let unreachable = Url::parse("http://127.0.0.1:1/").unwrap();
    let outcome = fetcher(&test_config(2), Arc::new(NoPacing))
        .fetch(&unreachable)
        .await;

    match outcome {
        FetchOutcome::Exhausted {
            url,
            error,
            attempts,
        } => {
            assert_eq!(url, "http://127.0.0.1:1/");
            assert_eq!(attempts, 2);
            assert!(!error.is_empty());
        }
        other => panic!("Expected exhaustion, got {:?}", other),
    }
}

#[tokio::test]
async fn test_timeout_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(1_500)))
        .expect(2)
        .mount(&server)
        .await;

    let outcome = fetcher(&test_config(2), Arc::new(NoPacing))
        .fetch(&url(&server, "/slow"))
        .await;

    match outcome {
        FetchOutcome::Exhausted { error, attempts, .. } => {
            assert_eq!(attempts, 2);
            assert_eq!(error, "Request timeout");
        }
        other => panic!("Expected exhaustion, got {:?}", other),
    }
}

#[tokio::test]
async fn test_redirect_followed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/new.html"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<body></body>"))
        .mount(&server)
        .await;

    let outcome = fetcher(&test_config(1), Arc::new(NoPacing))
        .fetch(&url(&server, "/old"))
        .await;

    match outcome {
        FetchOutcome::Fetched(result) => {
            assert_eq!(result.status, Some(200));
            assert!(result.url.ends_with("/old"));
            assert!(result.final_url.ends_with("/new.html"));
        }
        other => panic!("Expected a response, got {:?}", other),
    }
}

#[tokio::test]
async fn test_redirect_loop_gives_up_immediately() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/loop"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/loop"))
        .mount(&server)
        .await;

    let outcome = fetcher(&test_config(5), Arc::new(NoPacing))
        .fetch(&url(&server, "/loop"))
        .await;

    match outcome {
        FetchOutcome::Exhausted { error, attempts, .. } => {
            assert_eq!(attempts, 1);
            assert!(error.starts_with("Redirect error"));
        }
        other => panic!("Expected exhaustion, got {:?}", other),
    }
}

#[tokio::test]
async fn test_retry_after_delays_next_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/limited"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "1"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/next.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<body></body>"))
        .mount(&server)
        .await;

    let fetcher = fetcher(&test_config(1), Arc::new(HeaderPacing::new()));

    match fetcher.fetch(&url(&server, "/limited")).await {
        FetchOutcome::Fetched(result) => assert_eq!(result.status, Some(429)),
        other => panic!("Expected a response, got {:?}", other),
    }

    let started = Instant::now();
    match fetcher.fetch(&url(&server, "/next.html")).await {
        FetchOutcome::Fetched(result) => assert_eq!(result.status, Some(200)),
        other => panic!("Expected a response, got {:?}", other),
    }
    assert!(started.elapsed() >= Duration::from_millis(900));
}
