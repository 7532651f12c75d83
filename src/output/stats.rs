//! Statistics read back from a crawl database
//!
//! This module provides functionality for counting what each sink holds
//! after (or during) a crawl.

use crate::storage::{Gateway, Sink, StorageResult};
use std::collections::HashMap;

/// Row counts per sink
#[derive(Debug, Clone, Default)]
pub struct CrawlStatistics {
    pub counts: HashMap<Sink, u64>,
}

impl CrawlStatistics {
    pub fn count(&self, sink: Sink) -> u64 {
        self.counts.get(&sink).copied().unwrap_or(0)
    }

    /// Share of visited URLs that produced a new page structure
    pub fn page_yield(&self) -> f64 {
        let visited = self.count(Sink::Visited);
        if visited == 0 {
            return 0.0;
        }
        (self.count(Sink::Pages) as f64 / visited as f64) * 100.0
    }
}

/// Loads statistics from a gateway
///
/// # Arguments
///
/// * `gateway` - The storage backend to query
///
/// # Returns
///
/// * `Ok(CrawlStatistics)` - Successfully loaded statistics
/// * `Err(StorageError)` - Failed to query a sink
pub fn load_statistics(gateway: &dyn Gateway) -> StorageResult<CrawlStatistics> {
    let mut counts = HashMap::new();
    for sink in Sink::ALL {
        counts.insert(sink, gateway.count(sink)?);
    }
    Ok(CrawlStatistics { counts })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Sinks:");
    for sink in Sink::ALL {
        println!("  {:<8} {}", sink.table_name(), stats.count(sink));
    }
    println!();

    println!(
        "Page Yield: {:.1}% ({} distinct structures / {} URLs visited)",
        stats.page_yield(),
        stats.count(Sink::Pages),
        stats.count(Sink::Visited)
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryGateway, PageRecord, SiteRecord};

    #[test]
    fn test_load_statistics_counts_every_sink() {
        let gateway = MemoryGateway::new();
        gateway
            .insert_site(&SiteRecord {
                netloc: "a.pt".to_string(),
            })
            .unwrap();
        gateway
            .insert_visited_batch(&["http://a.pt/".to_string(), "http://a.pt/b.html".to_string()])
            .unwrap();
        gateway
            .insert_page(&PageRecord {
                fingerprint: "f".to_string(),
                structure: "<body></body>".to_string(),
                url: "http://a.pt/".to_string(),
                is_positive: false,
                raw_html: None,
            })
            .unwrap();

        let stats = load_statistics(&gateway).unwrap();

        assert_eq!(stats.counts.len(), Sink::ALL.len());
        assert_eq!(stats.count(Sink::Sites), 1);
        assert_eq!(stats.count(Sink::Visited), 2);
        assert_eq!(stats.count(Sink::Errors), 0);
        assert!((stats.page_yield() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_yield() {
        assert_eq!(CrawlStatistics::default().page_yield(), 0.0);
    }
}
