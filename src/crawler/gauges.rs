//! Shared counters observed by the termination coordinator

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// The two stages fed by the fetch workers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    LinkExtractor,
    Classifier,
}

impl StageKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::LinkExtractor => "link-extractor",
            Self::Classifier => "classifier",
        }
    }
}

/// Queue depths of the downstream stages plus the pipeline activity counter
///
/// A result counts against a stage from the moment it is sent until the stage
/// has finished processing it, so "depth zero" means nothing is queued and
/// nothing is being worked on.
#[derive(Debug, Default)]
pub struct PipelineGauges {
    extract_depth: AtomicUsize,
    classify_depth: AtomicUsize,
    epoch: AtomicU64,
}

impl PipelineGauges {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bumps the activity counter
    pub fn touch(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Call before handing a result to `stage`
    pub fn queued(&self, stage: StageKind) {
        self.depth(stage).fetch_add(1, Ordering::SeqCst);
        self.touch();
    }

    /// Call once `stage` has finished with a result
    pub fn processed(&self, stage: StageKind) {
        let _ = self
            .depth(stage)
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |d| d.checked_sub(1));
        self.touch();
    }

    pub fn depth_of(&self, stage: StageKind) -> usize {
        self.depth(stage).load(Ordering::SeqCst)
    }

    fn depth(&self, stage: StageKind) -> &AtomicUsize {
        match stage {
            StageKind::LinkExtractor => &self.extract_depth,
            StageKind::Classifier => &self.classify_depth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queued_and_processed() {
        let gauges = PipelineGauges::new();

        gauges.queued(StageKind::LinkExtractor);
        gauges.queued(StageKind::LinkExtractor);
        gauges.queued(StageKind::Classifier);
        assert_eq!(gauges.depth_of(StageKind::LinkExtractor), 2);
        assert_eq!(gauges.depth_of(StageKind::Classifier), 1);

        gauges.processed(StageKind::LinkExtractor);
        assert_eq!(gauges.depth_of(StageKind::LinkExtractor), 1);
    }

    #[test]
    fn test_depth_never_underflows() {
        let gauges = PipelineGauges::new();
        gauges.processed(StageKind::Classifier);
        assert_eq!(gauges.depth_of(StageKind::Classifier), 0);
    }

    #[test]
    fn test_every_change_moves_epoch() {
        let gauges = PipelineGauges::new();
        let start = gauges.epoch();

        gauges.queued(StageKind::Classifier);
        gauges.processed(StageKind::Classifier);
        gauges.touch();

        assert_eq!(gauges.epoch(), start + 3);
    }
}
