//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the HTTP client with a browser-like header set
//! - GET requests following redirects
//! - Retry logic for transient failures
//! - Error classification

use crate::config::CrawlerConfig;
use crate::crawler::pacing::PacingPolicy;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{redirect::Policy, Client};
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// Headers sent with every request
///
/// `Accept-Encoding` is left to the client so that compressed bodies are
/// decoded transparently.
pub const BROWSER_HEADERS: &[(&str, &str)] = &[
    (
        "accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,\
         image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.9",
    ),
    ("accept-language", "pt-PT,pt;q=0.9,en-US;q=0.8,en;q=0.7"),
    ("device-memory", "8"),
    ("downlink", "100"),
    (
        "sec-ch-ua",
        "\"Chromium\";v=\"104\", \" Not A;Brand\";v=\"99\", \"Google Chrome\";v=\"104\"",
    ),
    ("sec-ch-ua-arch", "\"x86\""),
    ("sec-ch-ua-full-version", "\"104.0.5112.81\""),
    ("sec-ch-ua-platform", "\"Windows\""),
    ("sec-ch-ua-platform-version", "\"10.0.0\""),
    ("viewport-width", "853"),
];

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/104.0.0.0 Safari/537.36";

const MAX_REDIRECTS: usize = 10;

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The fetch stage configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use cctld_crawler::config::CrawlerConfig;
/// use cctld_crawler::crawler::build_http_client;
///
/// let client = build_http_client(&CrawlerConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &CrawlerConfig) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    for (name, value) in BROWSER_HEADERS {
        headers.insert(
            HeaderName::from_static(*name),
            HeaderValue::from_static(*value),
        );
    }

    Client::builder()
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .pool_max_idle_per_host(config.max_concurrent_fetches as usize)
        .gzip(true)
        .brotli(true)
        .build()
}

/// How often and how patiently a URL is retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub tries: u32,
    /// Fixed delay between attempts
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            tries: config.tries.max(1),
            backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }
}

/// A completed HTTP exchange, whatever its status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    /// URL that was requested
    pub url: String,
    /// URL after redirects
    pub final_url: String,
    pub status: Option<u16>,
    pub headers: Vec<(String, String)>,
    /// Decoded body; only read for statuses below 400
    pub body: Option<String>,
    pub error: Option<String>,
    pub attempts: u32,
}

impl FetchResult {
    /// True when downstream stages should see this result
    pub fn is_processable(&self) -> bool {
        self.status.map_or(false, |s| s < 400) && self.body.is_some()
    }

    /// The final URL, parsed
    pub fn origin(&self) -> Option<Url> {
        Url::parse(&self.final_url).ok()
    }
}

/// Result of fetching one URL through the retry policy
#[derive(Debug)]
pub enum FetchOutcome {
    /// The server answered (any status)
    Fetched(FetchResult),

    /// Every attempt failed, or the failure was not worth retrying
    Exhausted {
        url: String,
        error: String,
        attempts: u32,
    },
}

/// Issues GET requests with retry and pacing
pub struct Fetcher {
    client: Client,
    retry: RetryPolicy,
    pacing: Arc<dyn PacingPolicy>,
}

impl Fetcher {
    pub fn new(client: Client, retry: RetryPolicy, pacing: Arc<dyn PacingPolicy>) -> Self {
        Self {
            client,
            retry,
            pacing,
        }
    }

    /// Fetches a URL with full error handling and retry logic
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | Any HTTP status | Returned as-is, never retried |
    /// | Timeout | Retry |
    /// | Connection error | Retry |
    /// | Request or body transmission error | Retry |
    /// | Redirect loop / more than 10 hops | Give up immediately |
    /// | Invalid URL, builder error | Give up immediately |
    ///
    /// Retries wait a fixed backoff and stop after `tries` attempts in total.
    pub async fn fetch(&self, url: &Url) -> FetchOutcome {
        let host = url.host_str().unwrap_or_default().to_lowercase();
        let mut attempts = 0;

        loop {
            attempts += 1;

            if let Some(wait) = self.pacing.delay_before(&host, Instant::now()) {
                tracing::debug!("Pacing {} for {:?}", host, wait);
                tokio::time::sleep(wait).await;
            }

            match self.attempt(url, &host).await {
                Ok(mut result) => {
                    result.attempts = attempts;
                    return FetchOutcome::Fetched(result);
                }
                Err(e) => {
                    let error = describe_error(&e);
                    if !is_transient(&e) || attempts >= self.retry.tries {
                        return FetchOutcome::Exhausted {
                            url: url.to_string(),
                            error,
                            attempts,
                        };
                    }

                    tracing::warn!(
                        "Attempt {}/{} for {} failed: {}",
                        attempts,
                        self.retry.tries,
                        url,
                        error
                    );
                    tokio::time::sleep(self.retry.backoff).await;
                }
            }
        }
    }

    async fn attempt(&self, url: &Url, host: &str) -> Result<FetchResult, reqwest::Error> {
        let response = self.client.get(url.clone()).send().await?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        self.pacing
            .observe(host, status, response.headers(), Instant::now());

        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();

        let body = if status < 400 {
            Some(response.text().await?)
        } else {
            None
        };

        Ok(FetchResult {
            url: url.to_string(),
            final_url,
            status: Some(status),
            headers,
            body,
            error: None,
            attempts: 0,
        })
    }
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

/// Failures that may succeed on a later attempt
fn is_transient(error: &reqwest::Error) -> bool {
    if error.is_redirect() || error.is_builder() {
        return false;
    }
    error.is_timeout() || error.is_connect() || error.is_request() || error.is_body()
}

fn describe_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "Request timeout".to_string()
    } else if error.is_connect() {
        format!("Connection failed: {}", error)
    } else if error.is_redirect() {
        format!("Redirect error: {}", error)
    } else {
        error.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(status: Option<u16>, body: Option<&str>) -> FetchResult {
        FetchResult {
            url: "http://a.pt/".to_string(),
            final_url: "http://a.pt/".to_string(),
            status,
            headers: vec![],
            body: body.map(str::to_string),
            error: None,
            attempts: 1,
        }
    }

    #[test]
    fn test_build_http_client() {
        assert!(build_http_client(&CrawlerConfig::default()).is_ok());
    }

    #[test]
    fn test_browser_headers_are_valid() {
        for (name, value) in BROWSER_HEADERS {
            assert!(HeaderName::from_bytes(name.as_bytes()).is_ok(), "{}", name);
            assert!(HeaderValue::from_str(value).is_ok(), "{}", name);
            assert_ne!(*name, "accept-encoding");
        }
    }

    #[test]
    fn test_retry_policy_from_config() {
        let config = CrawlerConfig {
            tries: 3,
            retry_backoff_ms: 250,
            ..CrawlerConfig::default()
        };
        let policy = RetryPolicy::from_config(&config);
        assert_eq!(policy.tries, 3);
        assert_eq!(policy.backoff, Duration::from_millis(250));
    }

    #[test]
    fn test_is_processable() {
        assert!(result(Some(200), Some("<html></html>")).is_processable());
        assert!(result(Some(304), Some("")).is_processable());
        assert!(!result(Some(404), Some("not found")).is_processable());
        assert!(!result(Some(200), None).is_processable());
        assert!(!result(None, None).is_processable());
    }

    #[test]
    fn test_origin_uses_final_url() {
        let mut r = result(Some(200), Some(""));
        r.final_url = "http://b.pt/landing".to_string();
        assert_eq!(r.origin().unwrap().as_str(), "http://b.pt/landing");
    }

    // Network behaviour (retries, redirects, statuses) is covered with
    // wiremock in tests/fetch_tests.rs
}
