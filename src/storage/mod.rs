//! Storage module for persisting crawl data
//!
//! Every sink follows an insert-if-absent contract: writing a record that is
//! already stored is a no-op, so concurrent stages may race on the same
//! record without coordination.
//!
//! - `SqliteGateway`: the on-disk store used by the binary
//! - `MemoryGateway`: an in-process store used by tests

mod memory;
mod schema;
mod sqlite;
mod traits;

pub use memory::MemoryGateway;
pub use sqlite::SqliteGateway;
pub use traits::{Gateway, StorageError, StorageResult};

use std::path::Path;

/// Opens (or creates) the SQLite store at `path`
pub fn open_gateway(path: &Path) -> StorageResult<SqliteGateway> {
    SqliteGateway::new(path)
}

/// A URL whose fetch failed after every retry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ErrorRecord {
    pub url: String,
    pub error: String,
}

/// One response header, as a name/value pair
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HeaderRecord {
    pub name: String,
    pub value: String,
}

impl HeaderRecord {
    /// Headers that change on every response and carry no signal
    const VOLATILE: [&'static str; 2] = ["date", "expires"];

    /// Returns false for headers that are never persisted (`Date`, `Expires`)
    pub fn is_persisted(name: &str) -> bool {
        !Self::VOLATILE
            .iter()
            .any(|volatile| name.eq_ignore_ascii_case(volatile))
    }
}

/// The network location of a fetched site
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SiteRecord {
    pub netloc: String,
}

/// A page whose structural fingerprint was new to the crawl
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageRecord {
    /// SHA-256 hex digest of `structure`
    pub fingerprint: String,
    /// Tag skeleton of the page's main region
    pub structure: String,
    pub url: String,
    /// Whether the keyword heuristic matched
    pub is_positive: bool,
    pub raw_html: Option<String>,
}

/// The record kinds the gateway stores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sink {
    Errors,
    Headers,
    Sites,
    Pages,
    Visited,
}

impl Sink {
    pub const ALL: [Sink; 5] = [
        Sink::Errors,
        Sink::Headers,
        Sink::Sites,
        Sink::Pages,
        Sink::Visited,
    ];

    /// The SQLite table backing this sink
    pub fn table_name(&self) -> &'static str {
        match self {
            Self::Errors => "errors",
            Self::Headers => "headers",
            Self::Sites => "sites",
            Self::Pages => "pages",
            Self::Visited => "urls",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volatile_headers_not_persisted() {
        assert!(!HeaderRecord::is_persisted("Date"));
        assert!(!HeaderRecord::is_persisted("EXPIRES"));
        assert!(HeaderRecord::is_persisted("Server"));
        assert!(HeaderRecord::is_persisted("Content-Type"));
    }

    #[test]
    fn test_sink_tables_are_distinct() {
        let tables: std::collections::HashSet<_> =
            Sink::ALL.iter().map(|s| s.table_name()).collect();
        assert_eq!(tables.len(), Sink::ALL.len());
    }
}
