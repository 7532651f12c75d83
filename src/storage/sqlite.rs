//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Gateway trait.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Gateway, StorageError, StorageResult};
use crate::storage::{ErrorRecord, HeaderRecord, PageRecord, SiteRecord, Sink};
use chrono::Utc;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// SQLite storage backend
///
/// A single connection behind a mutex; stages hold the lock only for the
/// duration of one statement or one batch transaction.
pub struct SqliteGateway {
    conn: Mutex<Connection>,
}

impl SqliteGateway {
    /// Creates a new SqliteGateway instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteGateway)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            PRAGMA mmap_size = 268435456;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

impl Gateway for SqliteGateway {
    fn insert_error(&self, record: &ErrorRecord) -> StorageResult<bool> {
        let changed = self.lock()?.execute(
            "INSERT OR IGNORE INTO errors (url, error, recorded_at) VALUES (?1, ?2, ?3)",
            params![record.url, record.error, now()],
        )?;
        Ok(changed > 0)
    }

    fn insert_header(&self, record: &HeaderRecord) -> StorageResult<bool> {
        let changed = self.lock()?.execute(
            "INSERT OR IGNORE INTO headers (name, value, recorded_at) VALUES (?1, ?2, ?3)",
            params![record.name, record.value, now()],
        )?;
        Ok(changed > 0)
    }

    fn insert_site(&self, record: &SiteRecord) -> StorageResult<bool> {
        let changed = self.lock()?.execute(
            "INSERT OR IGNORE INTO sites (netloc, recorded_at) VALUES (?1, ?2)",
            params![record.netloc, now()],
        )?;
        Ok(changed > 0)
    }

    fn insert_page(&self, record: &PageRecord) -> StorageResult<bool> {
        let changed = self.lock()?.execute(
            "INSERT OR IGNORE INTO pages (fingerprint, structure, url, is_positive, raw_html, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.fingerprint,
                record.structure,
                record.url,
                record.is_positive,
                record.raw_html,
                now()
            ],
        )?;
        Ok(changed > 0)
    }

    fn insert_visited(&self, url: &str) -> StorageResult<bool> {
        let changed = self.lock()?.execute(
            "INSERT OR IGNORE INTO urls (url, recorded_at) VALUES (?1, ?2)",
            params![url, now()],
        )?;
        Ok(changed > 0)
    }

    fn count(&self, sink: Sink) -> StorageResult<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", sink.table_name());
        let count: i64 = self.lock()?.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn insert_headers(&self, records: &[HeaderRecord]) -> StorageResult<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut written = 0;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO headers (name, value, recorded_at) VALUES (?1, ?2, ?3)",
            )?;
            let recorded_at = now();
            for record in records {
                written += stmt.execute(params![record.name, record.value, recorded_at])?;
            }
        }
        tx.commit()?;
        Ok(written)
    }

    fn insert_pages(&self, records: &[PageRecord]) -> StorageResult<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut written = 0;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO pages (fingerprint, structure, url, is_positive, raw_html, recorded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            let recorded_at = now();
            for record in records {
                written += stmt.execute(params![
                    record.fingerprint,
                    record.structure,
                    record.url,
                    record.is_positive,
                    record.raw_html,
                    recorded_at
                ])?;
            }
        }
        tx.commit()?;
        Ok(written)
    }

    fn insert_visited_batch(&self, urls: &[String]) -> StorageResult<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut written = 0;
        {
            let mut stmt =
                tx.prepare_cached("INSERT OR IGNORE INTO urls (url, recorded_at) VALUES (?1, ?2)")?;
            let recorded_at = now();
            for url in urls {
                written += stmt.execute(params![url, recorded_at])?;
            }
        }
        tx.commit()?;
        Ok(written)
    }
}
