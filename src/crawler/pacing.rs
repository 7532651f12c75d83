//! Politeness hooks for the fetch stage
//!
//! The fetcher asks a [`PacingPolicy`] how long to wait before each request
//! and reports every response back to it.

use crate::state::DomainState;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Longest `Retry-After` the crawler will honor
const MAX_RETRY_AFTER: Duration = Duration::from_secs(600);

const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

/// Decides how requests to a host are spaced out
pub trait PacingPolicy: Send + Sync {
    /// How long to wait before requesting `host` at `now`; `None` to go ahead
    fn delay_before(&self, host: &str, now: Instant) -> Option<Duration>;

    /// Reports the status and headers of a response from `host`
    fn observe(&self, host: &str, status: u16, headers: &HeaderMap, now: Instant);
}

/// Never delays a request
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPacing;

impl PacingPolicy for NoPacing {
    fn delay_before(&self, _host: &str, _now: Instant) -> Option<Duration> {
        None
    }

    fn observe(&self, _host: &str, _status: u16, _headers: &HeaderMap, _now: Instant) {}
}

/// Spaces requests according to the rate-limit headers a host sends
///
/// - `Retry-After` on a 429 or 503 blocks the host for the given delay
///   (delta-seconds or HTTP-date, capped at ten minutes)
/// - `X-RateLimit-Limit: N` spaces requests to the host 60/N seconds apart
#[derive(Debug, Default)]
pub struct HeaderPacing {
    domains: Mutex<HashMap<String, DomainState>>,
}

impl HeaderPacing {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PacingPolicy for HeaderPacing {
    fn delay_before(&self, host: &str, now: Instant) -> Option<Duration> {
        let mut domains = self.domains.lock().unwrap_or_else(PoisonError::into_inner);
        let state = domains.entry(host.to_string()).or_default();

        let wait = state.time_until_next_request(now);
        // Reserve the slot so concurrent workers queue up behind this request.
        state.record_request(now + wait.unwrap_or_default());
        wait
    }

    fn observe(&self, host: &str, status: u16, headers: &HeaderMap, now: Instant) {
        let retry_after = if status == 429 || status == 503 {
            headers
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| parse_retry_after(v, Utc::now()))
        } else {
            None
        };

        let rate_limit = headers
            .get("x-ratelimit-limit")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u32>().ok())
            .filter(|&limit| limit > 0);

        if retry_after.is_none() && rate_limit.is_none() {
            return;
        }

        let mut domains = self.domains.lock().unwrap_or_else(PoisonError::into_inner);
        let state = domains.entry(host.to_string()).or_default();

        if let Some(delay) = retry_after {
            tracing::debug!("{} asked to retry after {:?}", host, delay);
            state.block_until(now + delay);
        }

        if let Some(limit) = rate_limit {
            state.set_min_interval(RATE_LIMIT_WINDOW / limit);
        }
    }
}

/// Parses a `Retry-After` value: delta-seconds or an HTTP-date
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();

    let delay = match value.parse::<u64>() {
        Ok(seconds) => Duration::from_secs(seconds),
        Err(_) => {
            let at = DateTime::parse_from_rfc2822(value).ok()?;
            (at.with_timezone(&Utc) - now)
                .to_std()
                .unwrap_or(Duration::ZERO)
        }
    };

    Some(delay.min(MAX_RETRY_AFTER))
}
