/// Termination phases and the quiescence detector that drives them
///
/// The detector is a pure function of the snapshots it is fed and the instants
/// they were taken at, so every transition is testable without a runtime.
use std::fmt;
use std::time::{Duration, Instant};

/// Where the pipeline is in its shutdown lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationPhase {
    /// Work is flowing or was seen recently
    Running,

    /// Every stage looked idle at `since`, with the activity counter at `epoch`
    QuiescentCandidate { since: Instant, epoch: u64 },

    /// Intake is closed and the stages are flushing
    Draining,

    /// Every stage acknowledged shutdown
    Stopped,
}

impl TerminationPhase {
    /// Returns true once shutdown has begun
    pub fn is_shutting_down(&self) -> bool {
        matches!(self, Self::Draining | Self::Stopped)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::QuiescentCandidate { .. } => "quiescent_candidate",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for TerminationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Point-in-time view of the pipeline's queues and counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PipelineSnapshot {
    /// URLs waiting in the frontier
    pub pending: usize,

    /// URLs taken by a fetch worker and not yet completed
    pub in_flight: usize,

    /// Fetch results queued for, or being processed by, the link extractor
    pub extract_depth: usize,

    /// Fetch results queued for, or being processed by, the classifier
    pub classify_depth: usize,

    /// Monotonic activity counter, bumped on every enqueue, dispatch and completion
    pub epoch: u64,
}

impl PipelineSnapshot {
    /// Returns true when no stage holds any work
    pub fn is_idle(&self) -> bool {
        self.pending == 0
            && self.in_flight == 0
            && self.extract_depth == 0
            && self.classify_depth == 0
    }
}

/// Debounced quiescence detector
///
/// The pipeline must look idle, with an unchanged activity counter, for a full
/// observation interval before the monitor moves to [`TerminationPhase::Draining`].
/// The counter closes the gap where work appears and finishes entirely
/// between two observations.
#[derive(Debug, Clone)]
pub struct QuiescenceMonitor {
    observation_interval: Duration,
    phase: TerminationPhase,
}

impl QuiescenceMonitor {
    pub fn new(observation_interval: Duration) -> Self {
        Self {
            observation_interval,
            phase: TerminationPhase::Running,
        }
    }

    pub fn phase(&self) -> TerminationPhase {
        self.phase
    }

    /// Feeds one observation and returns the resulting phase
    pub fn observe(&mut self, snapshot: PipelineSnapshot, now: Instant) -> TerminationPhase {
        self.phase = match self.phase {
            TerminationPhase::Running => {
                if snapshot.is_idle() {
                    TerminationPhase::QuiescentCandidate {
                        since: now,
                        epoch: snapshot.epoch,
                    }
                } else {
                    TerminationPhase::Running
                }
            }
            TerminationPhase::QuiescentCandidate { since, epoch } => {
                if !snapshot.is_idle() || snapshot.epoch != epoch {
                    TerminationPhase::Running
                } else if now.saturating_duration_since(since) >= self.observation_interval {
                    TerminationPhase::Draining
                } else {
                    self.phase
                }
            }
            sticky => sticky,
        };
        self.phase
    }

    /// Forces the drain, e.g. on an external shutdown request
    pub fn begin_drain(&mut self) {
        if !self.phase.is_shutting_down() {
            self.phase = TerminationPhase::Draining;
        }
    }

    /// Records that every stage acknowledged shutdown
    pub fn finish(&mut self) {
        self.phase = TerminationPhase::Stopped;
    }
}
