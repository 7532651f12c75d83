//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::storage::{ErrorRecord, HeaderRecord, PageRecord, SiteRecord, Sink};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage lock poisoned")]
    LockPoisoned,

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Persistence gateway shared by every pipeline stage
///
/// Each insert returns `true` when a new row was written and `false` when an
/// identical record was already present. Implementations must be safe to call
/// from many tasks at once.
pub trait Gateway: Send + Sync {
    /// Records a URL that failed after every retry (deduplicated by pair)
    fn insert_error(&self, record: &ErrorRecord) -> StorageResult<bool>;

    /// Records a response header (deduplicated by name/value pair)
    fn insert_header(&self, record: &HeaderRecord) -> StorageResult<bool>;

    /// Records a fetched site (deduplicated by netloc)
    fn insert_site(&self, record: &SiteRecord) -> StorageResult<bool>;

    /// Records a classified page (deduplicated by fingerprint)
    fn insert_page(&self, record: &PageRecord) -> StorageResult<bool>;

    /// Records a URL dispatched to fetch
    fn insert_visited(&self, url: &str) -> StorageResult<bool>;

    /// Number of records stored in a sink
    fn count(&self, sink: Sink) -> StorageResult<u64>;

    // ===== Batches =====
    //
    // Each returns how many new rows were written.

    fn insert_headers(&self, records: &[HeaderRecord]) -> StorageResult<usize> {
        let mut written = 0;
        for record in records {
            written += usize::from(self.insert_header(record)?);
        }
        Ok(written)
    }

    fn insert_pages(&self, records: &[PageRecord]) -> StorageResult<usize> {
        let mut written = 0;
        for record in records {
            written += usize::from(self.insert_page(record)?);
        }
        Ok(written)
    }

    fn insert_visited_batch(&self, urls: &[String]) -> StorageResult<usize> {
        let mut written = 0;
        for url in urls {
            written += usize::from(self.insert_visited(url)?);
        }
        Ok(written)
    }
}
