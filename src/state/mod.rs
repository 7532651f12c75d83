//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `TerminationPhase` / `QuiescenceMonitor`: the shutdown state machine
//! - `PipelineSnapshot`: queue depths and the activity counter it observes
//! - `DomainState`: per-host pacing hints gathered from response headers

mod domain_state;
mod phase;

// Re-export main types
pub use domain_state::DomainState;
pub use phase::{PipelineSnapshot, QuiescenceMonitor, TerminationPhase};
