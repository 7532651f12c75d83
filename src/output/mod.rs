//! Output module for crawl reports and statistics
//!
//! This module handles:
//! - The end-of-run report returned by a crawl
//! - Reading sink counts back out of a stored database

pub mod stats;

pub use stats::{load_statistics, print_statistics, CrawlStatistics};

use std::fmt;
use std::time::Duration;

/// Summary of one finished crawl
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlReport {
    /// URLs dispatched to fetch, including redirect targets
    pub urls_visited: usize,

    /// Distinct domains that answered with a non-error status
    pub distinct_domains: usize,

    /// Pages the classifier wrote to the page sink
    pub pages_recorded: usize,

    /// URLs given up on after every retry
    pub errors_recorded: usize,

    pub elapsed: Duration,

    pub pages_per_second: f64,
}

impl CrawlReport {
    pub fn new(
        urls_visited: usize,
        distinct_domains: usize,
        pages_recorded: usize,
        errors_recorded: usize,
        elapsed: Duration,
    ) -> Self {
        let secs = elapsed.as_secs_f64();
        let pages_per_second = if secs > 0.0 {
            urls_visited as f64 / secs
        } else {
            0.0
        };

        Self {
            urls_visited,
            distinct_domains,
            pages_recorded,
            errors_recorded,
            elapsed,
            pages_per_second,
        }
    }
}

impl fmt::Display for CrawlReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} URLs visited across {} domains, {} pages recorded, {} errors in {:.1}s ({:.2} pages/s)",
            self.urls_visited,
            self.distinct_domains,
            self.pages_recorded,
            self.errors_recorded,
            self.elapsed.as_secs_f64(),
            self.pages_per_second
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_rate() {
        let report = CrawlReport::new(50, 4, 10, 2, Duration::from_secs(10));
        assert!((report.pages_per_second - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_report_zero_elapsed() {
        let report = CrawlReport::new(3, 1, 1, 0, Duration::ZERO);
        assert_eq!(report.pages_per_second, 0.0);
    }

    #[test]
    fn test_report_display() {
        let report = CrawlReport::new(12, 3, 5, 1, Duration::from_secs(4));
        let line = report.to_string();
        assert!(line.starts_with("12 URLs visited across 3 domains"));
        assert!(line.contains("5 pages recorded"));
        assert!(line.contains("3.00 pages/s"));
    }
}
