//! Fetch worker loop
//!
//! Each worker takes a URL from the frontier, fetches it, persists the
//! response metadata and hands processable pages to both downstream stages.

use crate::crawler::fetcher::{FetchOutcome, FetchResult, Fetcher};
use crate::crawler::frontier::Frontier;
use crate::crawler::gauges::StageKind;
use crate::storage::{ErrorRecord, Gateway, HeaderRecord, SiteRecord};
use crate::url::netloc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use url::Url;

/// Everything a fetch worker needs, shared by the whole pool
///
/// Dropping the last reference closes both stage channels.
pub(crate) struct FetchContext {
    pub frontier: Arc<Frontier>,
    pub fetcher: Fetcher,
    pub gateway: Arc<dyn Gateway>,
    pub extract_tx: mpsc::UnboundedSender<Arc<FetchResult>>,
    pub classify_tx: mpsc::UnboundedSender<Arc<FetchResult>>,
    pub errors_recorded: Arc<AtomicUsize>,
}

impl FetchContext {
    fn handle(&self, outcome: FetchOutcome) {
        match outcome {
            FetchOutcome::Fetched(result) => self.handle_response(result),
            FetchOutcome::Exhausted {
                url,
                error,
                attempts,
            } => {
                tracing::warn!("Giving up on {} after {} attempts: {}", url, attempts, error);
                match self.gateway.insert_error(&ErrorRecord { url, error }) {
                    Ok(true) => {
                        self.errors_recorded.fetch_add(1, Ordering::Relaxed);
                    }
                    Ok(false) => {}
                    Err(e) => tracing::error!("Failed to save fetch error: {}", e),
                }
            }
        }
    }

    fn handle_response(&self, result: FetchResult) {
        let status = result.status.unwrap_or_default();
        tracing::debug!("{} {} ({} attempts)", status, result.url, result.attempts);

        if result.final_url != result.url {
            self.frontier.mark_visited(&result.final_url);
        }

        if let Ok(final_url) = Url::parse(&result.final_url) {
            if status < 400 {
                if let Some(parts) = self.frontier.filter().domain_parts(&final_url) {
                    self.frontier.record_domain(&parts.fqdn());
                }
            }

            if let Some(netloc) = netloc(&final_url) {
                if let Err(e) = self.gateway.insert_site(&SiteRecord { netloc }) {
                    tracing::error!("Failed to save site for {}: {}", result.url, e);
                }
            }
        }

        let headers: Vec<HeaderRecord> = result
            .headers
            .iter()
            .filter(|(name, _)| HeaderRecord::is_persisted(name))
            .map(|(name, value)| HeaderRecord {
                name: name.clone(),
                value: value.clone(),
            })
            .collect();
        if let Err(e) = self.gateway.insert_headers(&headers) {
            tracing::error!("Failed to save headers for {}: {}", result.url, e);
        }

        if result.is_processable() {
            let result = Arc::new(result);
            self.forward(StageKind::LinkExtractor, &self.extract_tx, &result);
            self.forward(StageKind::Classifier, &self.classify_tx, &result);
        }
    }

    fn forward(
        &self,
        stage: StageKind,
        tx: &mpsc::UnboundedSender<Arc<FetchResult>>,
        result: &Arc<FetchResult>,
    ) {
        let gauges = self.frontier.gauges();
        gauges.queued(stage);
        if tx.send(Arc::clone(result)).is_err() {
            gauges.processed(stage);
            tracing::warn!("{} stage is gone, dropping {}", stage.name(), result.url);
        }
    }
}

/// Runs one fetch worker until the frontier closes
///
/// Returns the number of URLs this worker fetched.
pub(crate) async fn run_fetch_worker(id: usize, ctx: Arc<FetchContext>) -> usize {
    let mut fetched = 0;

    while let Some(entry) = ctx.frontier.take().await {
        let outcome = ctx.fetcher.fetch(&entry.url).await;
        // Hand-off happens before `complete` so the pipeline never looks idle in between.
        ctx.handle(outcome);
        ctx.frontier.complete();
        fetched += 1;
    }

    tracing::trace!("Fetch worker {} exiting after {} URLs", id, fetched);
    fetched
}
