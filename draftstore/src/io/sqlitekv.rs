//! SQLite-backed implementation of `KVStore`
//!
//! This implementation stores records in a SQLite database, providing
//! persistence across program runs. It is the durable primary store of the
//! command-line tool.

use super::types::{KVError, KVStore};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// SQLite-backed key-value record storage
///
/// The connection is guarded by a mutex to satisfy SQLite's threading
/// restrictions; statements are short and never held across an await.
pub struct SqliteKV {
    conn: Mutex<Connection>,
    quota: Option<usize>,
}

impl SqliteKV {
    /// Create a new `SqliteKV` backed by the database at the given path
    ///
    /// Creates the database and table if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns error if database cannot be opened or table creation fails.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, rusqlite::Error> {
        Self::from_connection(Connection::open(db_path)?)
    }

    /// Like [`new`](Self::new), but holding at most `quota` bytes of keys
    /// and records
    ///
    /// # Errors
    ///
    /// Returns error if database cannot be opened or table creation fails.
    pub fn with_quota<P: AsRef<Path>>(db_path: P, quota: usize) -> Result<Self, rusqlite::Error> {
        let mut kv = Self::new(db_path)?;
        kv.quota = Some(quota);
        Ok(kv)
    }

    /// Create a store over a private in-memory database
    ///
    /// # Errors
    ///
    /// Returns error if table creation fails.
    pub fn open_in_memory() -> Result<Self, rusqlite::Error> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, rusqlite::Error> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS draft_records (
                key TEXT PRIMARY KEY,
                data BLOB NOT NULL
            )",
            [],
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
            quota: None,
        })
    }
}

fn backend_error(key: &str, e: &rusqlite::Error) -> KVError {
    match e {
        rusqlite::Error::SqliteFailure(code, _)
            if code.code == rusqlite::ErrorCode::DiskFull =>
        {
            KVError::QuotaExceeded {
                key: key.to_string(),
                needed: 0,
                limit: 0,
            }
        }
        rusqlite::Error::SqliteFailure(code, _)
            if matches!(
                code.code,
                rusqlite::ErrorCode::CannotOpen
                    | rusqlite::ErrorCode::NotADatabase
                    | rusqlite::ErrorCode::PermissionDenied
            ) =>
        {
            KVError::Unavailable(e.to_string())
        }
        _ => KVError::Backend {
            key: key.to_string(),
            reason: e.to_string(),
        },
    }
}

impl KVStore for SqliteKV {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KVError> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT data FROM draft_records WHERE key = ?",
            params![key],
            |row| row.get::<_, Vec<u8>>(0),
        )
        .optional()
        .map_err(|e| backend_error(key, &e))
    }

    async fn set(&self, key: &str, data: &[u8]) -> Result<(), KVError> {
        let conn = self.conn.lock();
        if let Some(limit) = self.quota {
            let others: i64 = conn
                .query_row(
                    "SELECT COALESCE(SUM(LENGTH(CAST(key AS BLOB)) + LENGTH(data)), 0)
                     FROM draft_records WHERE key != ?",
                    params![key],
                    |row| row.get(0),
                )
                .map_err(|e| backend_error(key, &e))?;
            let needed = key.len() + data.len();
            if usize::try_from(others).unwrap_or(usize::MAX).saturating_add(needed) > limit {
                return Err(KVError::QuotaExceeded {
                    key: key.to_string(),
                    needed,
                    limit,
                });
            }
        }
        conn.execute(
            "INSERT OR REPLACE INTO draft_records (key, data) VALUES (?, ?)",
            params![key, data],
        )
        .map_err(|e| backend_error(key, &e))?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), KVError> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM draft_records WHERE key = ?", params![key])
            .map_err(|e| backend_error(key, &e))?;
        Ok(())
    }
}
