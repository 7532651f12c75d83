//! Receive loop shared by the link extractor and classifier stages

use crate::crawler::fetcher::FetchResult;
use crate::crawler::gauges::{PipelineGauges, StageKind};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// What a stage reports back when it acknowledges shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageReport {
    pub stage: StageKind,
    /// Fetch results handled
    pub processed: usize,
    /// Records this stage wrote to the gateway
    pub flushed: usize,
}

/// Feeds every received result to `handle` until the stop signal
///
/// After the signal, whatever is still queued is handled before returning,
/// so nothing sent before the stop is lost. A closed channel also ends the
/// loop. Returns the number of results handled.
pub(crate) async fn consume<F>(
    stage: StageKind,
    mut rx: mpsc::UnboundedReceiver<Arc<FetchResult>>,
    mut stop: watch::Receiver<bool>,
    gauges: Arc<PipelineGauges>,
    mut handle: F,
) -> usize
where
    F: FnMut(&FetchResult),
{
    let mut processed = 0;
    let mut run = |result: Arc<FetchResult>, processed: &mut usize| {
        handle(&result);
        gauges.processed(stage);
        *processed += 1;
    };

    loop {
        tokio::select! {
            maybe = rx.recv() => match maybe {
                Some(result) => run(result, &mut processed),
                None => break,
            },
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    while let Ok(result) = rx.try_recv() {
                        run(result, &mut processed);
                    }
                    break;
                }
            }
        }
    }

    tracing::debug!("{} stage stopped after {} results", stage.name(), processed);
    processed
}
