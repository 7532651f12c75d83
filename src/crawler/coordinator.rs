//! Termination coordinator
//!
//! Watches the pipeline until it has been quiet for a full observation
//! interval (or until shutdown is requested), then drains it:
//!
//! 1. Close the frontier so no new URL is taken
//! 2. Join the fetch workers, letting in-flight requests finish
//! 3. Close the stage channels and raise the stop signal
//! 4. Wait for both stages to acknowledge, each with its final flush

use crate::config::TerminationConfig;
use crate::crawler::frontier::Frontier;
use crate::crawler::gauges::StageKind;
use crate::crawler::stage::StageReport;
use crate::crawler::worker::FetchContext;
use crate::state::{QuiescenceMonitor, TerminationPhase};
use crate::CrawlError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};

/// Polls between two progress lines
const PROGRESS_EVERY: u64 = 10;

/// The running pipeline, as handed to the coordinator
pub(crate) struct Pipeline {
    pub frontier: Arc<Frontier>,
    pub workers: JoinSet<usize>,
    pub context: Arc<FetchContext>,
    pub stop: watch::Sender<bool>,
    pub stages: Vec<(StageKind, JoinHandle<StageReport>)>,
}

/// Drives the pipeline from `Running` to `Stopped`
#[derive(Debug)]
pub struct TerminationCoordinator {
    monitor: QuiescenceMonitor,
    poll_interval: Duration,
    ack_timeout: Duration,
}

impl TerminationCoordinator {
    pub fn new(config: &TerminationConfig) -> Self {
        Self {
            monitor: QuiescenceMonitor::new(Duration::from_millis(config.observation_interval_ms)),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            ack_timeout: Duration::from_millis(config.ack_timeout_ms),
        }
    }

    pub fn phase(&self) -> TerminationPhase {
        self.monitor.phase()
    }

    /// Runs until every stage has acknowledged shutdown
    pub(crate) async fn run(
        &mut self,
        pipeline: Pipeline,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Vec<StageReport>, CrawlError> {
        self.wait_for_quiescence(&pipeline.frontier, shutdown).await;
        self.drain(pipeline).await
    }

    async fn wait_for_quiescence(&mut self, frontier: &Frontier, mut shutdown: watch::Receiver<bool>) {
        if *shutdown.borrow_and_update() {
            tracing::info!("Shutdown requested before start, draining");
            self.monitor.begin_drain();
            return;
        }

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut shutdown_open = true;
        let mut polls: u64 = 0;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let snapshot = frontier.snapshot();
                    let previous = self.monitor.phase();
                    let phase = self.monitor.observe(snapshot, Instant::now().into_std());

                    polls += 1;
                    if polls % PROGRESS_EVERY == 0 {
                        tracing::info!(
                            "Progress: {} URLs visited, {} domains, {} to be followed, {} in flight",
                            frontier.visited_count(),
                            frontier.domain_count(),
                            snapshot.pending,
                            snapshot.in_flight
                        );
                    }

                    if std::mem::discriminant(&previous) != std::mem::discriminant(&phase) {
                        tracing::debug!("Termination phase: {} -> {}", previous, phase);
                    }

                    if phase == TerminationPhase::Draining {
                        tracing::info!("Pipeline quiescent, draining");
                        return;
                    }
                }
                changed = shutdown.changed(), if shutdown_open => {
                    match changed {
                        Ok(()) if *shutdown.borrow() => {
                            tracing::info!("Shutdown requested, draining");
                            self.monitor.begin_drain();
                            return;
                        }
                        Ok(()) => {}
                        Err(_) => shutdown_open = false,
                    }
                }
            }
        }
    }

    async fn drain(&mut self, pipeline: Pipeline) -> Result<Vec<StageReport>, CrawlError> {
        let Pipeline {
            frontier,
            mut workers,
            context,
            stop,
            stages,
        } = pipeline;

        frontier.close();

        let mut fetched = 0;
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(count) => fetched += count,
                Err(e) => tracing::error!("Fetch worker failed: {}", e),
            }
        }
        tracing::debug!("Fetch workers joined after {} fetches", fetched);

        drop(context);
        stop.send_replace(true);

        let deadline = Instant::now() + self.ack_timeout;
        let mut reports = Vec::with_capacity(stages.len());

        for (stage, handle) in stages {
            match tokio::time::timeout_at(deadline, handle).await {
                Ok(Ok(report)) => {
                    tracing::debug!(
                        "{} acknowledged: {} processed, {} flushed",
                        stage.name(),
                        report.processed,
                        report.flushed
                    );
                    reports.push(report);
                }
                Ok(Err(e)) => {
                    return Err(CrawlError::StageFailed {
                        stage: stage.name(),
                        message: e.to_string(),
                    })
                }
                Err(_) => {
                    return Err(CrawlError::ShutdownTimeout {
                        stage: stage.name(),
                        timeout_ms: self.ack_timeout.as_millis() as u64,
                    })
                }
            }
        }

        self.monitor.finish();
        tracing::info!("All stages stopped");
        Ok(reports)
    }
}
