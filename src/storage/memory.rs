//! In-process storage implementation
//!
//! Keeps every sink in memory. Used by tests and by embedders that inspect
//! results directly instead of reading a database.

use crate::storage::traits::{Gateway, StorageError, StorageResult};
use crate::storage::{ErrorRecord, HeaderRecord, PageRecord, SiteRecord, Sink};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Sinks {
    errors: HashSet<ErrorRecord>,
    headers: HashSet<HeaderRecord>,
    sites: HashSet<String>,
    pages: HashMap<String, PageRecord>,
    visited: HashSet<String>,
}

/// Memory-backed gateway with the same dedup contract as SQLite
#[derive(Debug, Default)]
pub struct MemoryGateway {
    sinks: Mutex<Sinks>,
    fail_writes: AtomicBool,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent insert fail with a database error
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn errors(&self) -> Vec<ErrorRecord> {
        self.read(|s| s.errors.iter().cloned().collect())
    }

    pub fn headers(&self) -> Vec<HeaderRecord> {
        self.read(|s| s.headers.iter().cloned().collect())
    }

    pub fn sites(&self) -> Vec<String> {
        self.read(|s| s.sites.iter().cloned().collect())
    }

    pub fn pages(&self) -> Vec<PageRecord> {
        self.read(|s| s.pages.values().cloned().collect())
    }

    pub fn visited(&self) -> Vec<String> {
        self.read(|s| s.visited.iter().cloned().collect())
    }

    fn read<T: Default>(&self, f: impl FnOnce(&Sinks) -> T) -> T {
        self.sinks.lock().map(|s| f(&s)).unwrap_or_default()
    }

    fn write(&self) -> StorageResult<MutexGuard<'_, Sinks>> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Database("writes disabled".to_string()));
        }
        self.sinks.lock().map_err(|_| StorageError::LockPoisoned)
    }
}

impl Gateway for MemoryGateway {
    fn insert_error(&self, record: &ErrorRecord) -> StorageResult<bool> {
        Ok(self.write()?.errors.insert(record.clone()))
    }

    fn insert_header(&self, record: &HeaderRecord) -> StorageResult<bool> {
        Ok(self.write()?.headers.insert(record.clone()))
    }

    fn insert_site(&self, record: &SiteRecord) -> StorageResult<bool> {
        Ok(self.write()?.sites.insert(record.netloc.clone()))
    }

    fn insert_page(&self, record: &PageRecord) -> StorageResult<bool> {
        let mut sinks = self.write()?;
        if sinks.pages.contains_key(&record.fingerprint) {
            return Ok(false);
        }
        sinks
            .pages
            .insert(record.fingerprint.clone(), record.clone());
        Ok(true)
    }

    fn insert_visited(&self, url: &str) -> StorageResult<bool> {
        Ok(self.write()?.visited.insert(url.to_string()))
    }

    fn count(&self, sink: Sink) -> StorageResult<u64> {
        let sinks = self.sinks.lock().map_err(|_| StorageError::LockPoisoned)?;
        let count = match sink {
            Sink::Errors => sinks.errors.len(),
            Sink::Headers => sinks.headers.len(),
            Sink::Sites => sinks.sites.len(),
            Sink::Pages => sinks.pages.len(),
            Sink::Visited => sinks.visited.len(),
        };
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_keeps_first_url_for_fingerprint() {
        let gateway = MemoryGateway::new();
        let first = PageRecord {
            fingerprint: "f".to_string(),
            structure: "<body></body>".to_string(),
            url: "http://a.pt/1".to_string(),
            is_positive: true,
            raw_html: None,
        };
        let second = PageRecord {
            url: "http://a.pt/2".to_string(),
            ..first.clone()
        };

        assert!(gateway.insert_page(&first).unwrap());
        assert!(!gateway.insert_page(&second).unwrap());
        assert_eq!(gateway.pages(), vec![first]);
    }

    #[test]
    fn test_default_batch_helpers() {
        let gateway = MemoryGateway::new();
        let urls = vec![
            "http://a.pt/".to_string(),
            "http://a.pt/".to_string(),
            "http://b.pt/".to_string(),
        ];

        assert_eq!(gateway.insert_visited_batch(&urls).unwrap(), 2);
        assert_eq!(gateway.count(Sink::Visited).unwrap(), 2);
    }

    #[test]
    fn test_fail_writes() {
        let gateway = MemoryGateway::new();
        gateway.set_fail_writes(true);

        let result = gateway.insert_site(&SiteRecord {
            netloc: "a.pt".to_string(),
        });
        assert!(matches!(result, Err(StorageError::Database(_))));

        gateway.set_fail_writes(false);
        assert_eq!(gateway.count(Sink::Sites).unwrap(), 0);
    }
}
