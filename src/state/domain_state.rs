use std::time::{Duration, Instant};

/// Per-host pacing state
///
/// Tracks what a host has told us about how fast it wants to be crawled.
/// Nothing here applies a limit on its own: the state only answers how long
/// the next request to the host should wait.
#[derive(Debug, Clone, Default)]
pub struct DomainState {
    /// Timestamp of the last request to this host
    pub last_request_time: Option<Instant>,

    /// No request before this instant (from `Retry-After`)
    pub blocked_until: Option<Instant>,

    /// Minimum spacing between two requests (from `X-RateLimit-Limit`)
    pub min_interval: Option<Duration>,
}

impl DomainState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that a request was made to this host
    pub fn record_request(&mut self, now: Instant) {
        self.last_request_time = Some(now);
    }

    /// Blocks the host until `until`, keeping the later of two blocks
    pub fn block_until(&mut self, until: Instant) {
        self.blocked_until = Some(match self.blocked_until {
            Some(current) if current > until => current,
            _ => until,
        });
    }

    pub fn set_min_interval(&mut self, interval: Duration) {
        self.min_interval = Some(interval);
    }

    /// Calculates the time until the next request can be made
    ///
    /// Returns None if a request can be made now, or the duration to wait otherwise.
    pub fn time_until_next_request(&self, now: Instant) -> Option<Duration> {
        let blocked = self
            .blocked_until
            .map(|until| until.saturating_duration_since(now));

        let spaced = match (self.last_request_time, self.min_interval) {
            (Some(last), Some(interval)) => Some((last + interval).saturating_duration_since(now)),
            _ => None,
        };

        blocked
            .into_iter()
            .chain(spaced)
            .max()
            .filter(|wait| !wait.is_zero())
    }
}
