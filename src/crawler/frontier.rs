//! Crawl frontier: the pending queue plus the visited bookkeeping
//!
//! All check-and-mark operations happen under one mutex, so a URL is
//! dispatched to a fetch worker at most once no matter how many extractors
//! offer it concurrently. The lock is never held across an `.await`.

use crate::crawler::gauges::{PipelineGauges, StageKind};
use crate::state::PipelineSnapshot;
use crate::url::{resolve_reference, DomainFilter};
use chrono::{DateTime, Utc};
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use url::Url;

/// A URL waiting to be fetched
#[derive(Debug, Clone)]
pub struct FrontierEntry {
    pub url: Url,
    /// Page the URL was found on; `None` for seeds
    pub discovered_from: Option<Url>,
    pub discovered_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Inner {
    queue: VecDeque<FrontierEntry>,
    pending: HashSet<String>,
    visited: HashSet<String>,
    domains: HashSet<String>,
    in_flight: usize,
    closed: bool,
}

/// URL work queue with at-most-once dispatch
pub struct Frontier {
    inner: Mutex<Inner>,
    filter: Arc<DomainFilter>,
    gauges: Arc<PipelineGauges>,
    available: Notify,
}

impl Frontier {
    pub fn new(filter: Arc<DomainFilter>) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            filter,
            gauges: Arc::new(PipelineGauges::new()),
            available: Notify::new(),
        }
    }

    /// Counters shared with the fetch workers and the downstream stages
    pub fn gauges(&self) -> &Arc<PipelineGauges> {
        &self.gauges
    }

    pub fn filter(&self) -> &Arc<DomainFilter> {
        &self.filter
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueues seed URLs without consulting the domain filter
    ///
    /// Seeds that fail to parse are logged and skipped. Returns how many were
    /// enqueued.
    pub fn seed<S: AsRef<str>>(&self, seeds: &[S]) -> usize {
        let mut enqueued = 0;
        for seed in seeds {
            match resolve_reference(seed.as_ref(), None) {
                Ok(url) => {
                    if self.enqueue(url, None) {
                        enqueued += 1;
                    }
                }
                Err(e) => tracing::warn!("Skipping seed '{}': {}", seed.as_ref(), e),
            }
        }
        enqueued
    }

    /// Offers a discovered href for crawling
    ///
    /// The href is resolved against `origin` and run through the domain
    /// filter, then enqueued unless it is already pending or visited.
    /// Returns whether it was enqueued.
    pub fn offer(&self, href: &str, origin: Option<&Url>) -> bool {
        match self.filter.resolve(href, origin) {
            Some(url) => self.offer_url(url, origin),
            None => false,
        }
    }

    /// Like [`Frontier::offer`], for a URL that is already resolved
    pub fn offer_url(&self, url: Url, origin: Option<&Url>) -> bool {
        if !self.filter.admit_url(&url) {
            return false;
        }
        self.enqueue(url, origin.cloned())
    }

    fn enqueue(&self, url: Url, discovered_from: Option<Url>) -> bool {
        {
            let mut inner = self.lock();
            if inner.closed {
                return false;
            }

            let key = url.as_str();
            if inner.visited.contains(key) || inner.pending.contains(key) {
                return false;
            }

            inner.pending.insert(key.to_string());
            inner.queue.push_back(FrontierEntry {
                url,
                discovered_from,
                discovered_at: Utc::now(),
            });
        }

        self.gauges.touch();
        self.available.notify_one();
        true
    }

    /// Waits for the next URL to fetch
    ///
    /// The returned URL has moved from pending to visited and counts as in
    /// flight until [`Frontier::complete`] is called. Returns `None` once the
    /// frontier is closed, even if URLs are still queued.
    pub async fn take(&self) -> Option<FrontierEntry> {
        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut inner = self.lock();
                if inner.closed {
                    return None;
                }

                while let Some(entry) = inner.queue.pop_front() {
                    let key = entry.url.as_str();
                    inner.pending.remove(key);

                    // Reached earlier as a redirect target.
                    if !inner.visited.insert(key.to_string()) {
                        continue;
                    }

                    inner.in_flight += 1;
                    drop(inner);
                    self.gauges.touch();
                    return Some(entry);
                }
            }

            notified.await;
        }
    }

    /// Marks the most recently taken entry of a worker as finished
    pub fn complete(&self) {
        {
            let mut inner = self.lock();
            inner.in_flight = inner.in_flight.saturating_sub(1);
        }
        self.gauges.touch();
    }

    /// Marks a URL visited without fetching it, e.g. a redirect target
    ///
    /// Returns false if it was already visited.
    pub fn mark_visited(&self, url: &str) -> bool {
        self.lock().visited.insert(url.to_string())
    }

    /// Records a domain with at least one successful fetch
    pub fn record_domain(&self, domain: &str) -> bool {
        self.lock().domains.insert(domain.to_string())
    }

    /// Stops intake and wakes every waiting [`Frontier::take`]
    pub fn close(&self) {
        self.lock().closed = true;
        self.available.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of URLs waiting to be fetched
    pub fn size(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn in_flight(&self) -> usize {
        self.lock().in_flight
    }

    pub fn visited_count(&self) -> usize {
        self.lock().visited.len()
    }

    pub fn domain_count(&self) -> usize {
        self.lock().domains.len()
    }

    /// Copy of the visited set, for the shutdown ledger
    pub fn visited_urls(&self) -> Vec<String> {
        self.lock().visited.iter().cloned().collect()
    }

    /// Queue depths and activity counter, as seen by the termination monitor
    pub fn snapshot(&self) -> PipelineSnapshot {
        let (pending, in_flight) = {
            let inner = self.lock();
            (inner.queue.len(), inner.in_flight)
        };
        PipelineSnapshot {
            pending,
            in_flight,
            extract_depth: self.gauges.depth_of(StageKind::LinkExtractor),
            classify_depth: self.gauges.depth_of(StageKind::Classifier),
            epoch: self.gauges.epoch(),
        }
    }
}

impl std::fmt::Debug for Frontier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("Frontier")
            .field("pending", &inner.queue.len())
            .field("visited", &inner.visited.len())
            .field("in_flight", &inner.in_flight)
            .field("closed", &inner.closed)
            .finish()
    }
}
