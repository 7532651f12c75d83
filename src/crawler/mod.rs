//! Crawler module for web page fetching and processing
//!
//! This module contains the crawl pipeline:
//! - The frontier with at-most-once dispatch
//! - A pool of fetch workers with retry and optional header-driven pacing
//! - Link extraction feeding back into the frontier
//! - Structural classification feeding the page sink
//! - The termination coordinator that detects quiescence and drains everything

mod classifier;
mod coordinator;
mod extractor;
mod fetcher;
mod frontier;
mod gauges;
mod pacing;
mod stage;
mod worker;

pub use classifier::{fingerprint, run_classify_stage, skeleton, Classifier, FingerprintCache};
pub use coordinator::TerminationCoordinator;
pub use extractor::{run_link_stage, LinkExtractor};
pub use fetcher::{
    build_http_client, FetchOutcome, FetchResult, Fetcher, RetryPolicy, BROWSER_HEADERS,
};
pub use frontier::{Frontier, FrontierEntry};
pub use gauges::{PipelineGauges, StageKind};
pub use pacing::{parse_retry_after, HeaderPacing, NoPacing, PacingPolicy};
pub use stage::StageReport;

use crate::config::Config;
use crate::output::CrawlReport;
use crate::storage::{open_gateway, Gateway};
use crate::url::DomainFilter;
use crate::CrawlError;
use coordinator::Pipeline;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use worker::{run_fetch_worker, FetchContext};

/// Requests a graceful drain of a running crawl
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    /// Asks the coordinator to drain now instead of waiting for quiescence
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }
}

/// One crawl over a configured seed set
pub struct Crawler {
    config: Config,
    gateway: Arc<dyn Gateway>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Crawler {
    pub fn new(config: Config, gateway: Arc<dyn Gateway>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            config,
            gateway,
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
        }
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: Arc::clone(&self.shutdown_tx),
        }
    }

    /// Runs the pipeline until it drains
    ///
    /// 1. Seed the frontier
    /// 2. Start the link extractor and classifier stages
    /// 3. Start `max-concurrent-fetches` fetch workers
    /// 4. Hand everything to the termination coordinator
    pub async fn run(&self) -> Result<CrawlReport, CrawlError> {
        let started = Instant::now();
        let config = &self.config;

        let filter = Arc::new(DomainFilter::new(&config.filter));
        let frontier = Arc::new(Frontier::new(filter));
        let seeded = frontier.seed(&config.crawler.seeds);
        tracing::info!("Seeded frontier with {} URLs", seeded);

        let pacing: Arc<dyn PacingPolicy> = if config.crawler.honor_rate_limit_headers {
            Arc::new(HeaderPacing::new())
        } else {
            Arc::new(NoPacing)
        };
        let fetcher = Fetcher::new(
            build_http_client(&config.crawler)?,
            RetryPolicy::from_config(&config.crawler),
            pacing,
        );

        let (extract_tx, extract_rx) = mpsc::unbounded_channel();
        let (classify_tx, classify_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = watch::channel(false);

        let link_stage = tokio::spawn(run_link_stage(
            LinkExtractor::new(Arc::clone(&frontier)),
            extract_rx,
            stop_rx.clone(),
            Arc::clone(&self.gateway),
        ));
        let classify_stage = tokio::spawn(run_classify_stage(
            Classifier::new(&config.classifier, Arc::new(FingerprintCache::new())),
            config.classifier.flush_batch_size,
            classify_rx,
            stop_rx,
            Arc::clone(frontier.gauges()),
            Arc::clone(&self.gateway),
        ));

        let errors_recorded = Arc::new(AtomicUsize::new(0));
        let context = Arc::new(FetchContext {
            frontier: Arc::clone(&frontier),
            fetcher,
            gateway: Arc::clone(&self.gateway),
            extract_tx,
            classify_tx,
            errors_recorded: Arc::clone(&errors_recorded),
        });

        let mut workers = JoinSet::new();
        for id in 0..config.crawler.max_concurrent_fetches as usize {
            workers.spawn(run_fetch_worker(id, Arc::clone(&context)));
        }
        tracing::info!(
            "Started {} fetch workers",
            config.crawler.max_concurrent_fetches
        );

        let pipeline = Pipeline {
            frontier: Arc::clone(&frontier),
            workers,
            context,
            stop: stop_tx,
            stages: vec![
                (StageKind::LinkExtractor, link_stage),
                (StageKind::Classifier, classify_stage),
            ],
        };

        let mut coordinator = TerminationCoordinator::new(&config.termination);
        let reports = coordinator
            .run(pipeline, self.shutdown_rx.clone())
            .await?;

        let pages_recorded = reports
            .iter()
            .filter(|r| r.stage == StageKind::Classifier)
            .map(|r| r.flushed)
            .sum();

        let report = CrawlReport::new(
            frontier.visited_count(),
            frontier.domain_count(),
            pages_recorded,
            errors_recorded.load(Ordering::Relaxed),
            started.elapsed(),
        );
        tracing::info!("Crawl finished: {}", report);
        Ok(report)
    }
}

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Open the SQLite store named in the configuration
/// 2. Run the pipeline until it goes quiet
/// 3. Drain on Ctrl-C instead, if that comes first
///
/// # Arguments
///
/// * `config` - The crawler configuration
///
/// # Returns
///
/// * `Ok(CrawlReport)` - Crawl completed successfully
/// * `Err(CrawlError)` - Storage could not be opened, or a stage failed to stop
pub async fn crawl(config: Config) -> Result<CrawlReport, CrawlError> {
    let gateway = Arc::new(open_gateway(Path::new(&config.output.database_path))?);
    let crawler = Crawler::new(config, gateway);

    let handle = crawler.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, draining pipeline");
            handle.shutdown();
        }
    });

    crawler.run().await
}
