//! SQLite-backed cache medium.
//!
//! # Invariants
//! - One row per key; writes replace the previous value atomically.

use super::{CacheMedium, CacheResult};
use crate::db::{open_db, open_db_in_memory};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

pub struct SqliteCacheMedium {
    conn: Connection,
}

impl SqliteCacheMedium {
    /// Opens (and migrates) the cache file at `path`.
    pub fn open(path: impl AsRef<Path>) -> CacheResult<Self> {
        Ok(Self {
            conn: open_db(path)?,
        })
    }

    pub fn open_in_memory() -> CacheResult<Self> {
        Ok(Self {
            conn: open_db_in_memory()?,
        })
    }
}

impl CacheMedium for SqliteCacheMedium {
    fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM kv_cache WHERE key = ?1;",
                [key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&mut self, key: &str, value: &str) -> CacheResult<()> {
        self.conn.execute(
            "INSERT INTO kv_cache (key, value, updated_at)
             VALUES (?1, ?2, (strftime('%s', 'now') * 1000))
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at;",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> CacheResult<()> {
        self.conn
            .execute("DELETE FROM kv_cache WHERE key = ?1;", [key])?;
        Ok(())
    }
}
