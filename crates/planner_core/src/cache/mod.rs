//! Local cache store for planner snapshots.
//!
//! # Responsibility
//! - Persist one serialized `PlannerState` per user under
//!   `planner_data_{userId}`.
//! - Turn every medium failure into a reported, non-fatal outcome.
//!
//! # Invariants
//! - `read` never fails: corrupt or missing entries are `None`.
//! - `write` never panics; failures are returned to the orchestrator, which
//!   keeps the in-memory state authoritative.

mod memory_medium;
mod sqlite_medium;

pub use memory_medium::MemoryCacheMedium;
pub use sqlite_medium::SqliteCacheMedium;

use crate::db::DbError;
use crate::model::state::PlannerState;
use log::{debug, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

const CACHE_KEY_PREFIX: &str = "planner_data_";

pub type CacheResult<T> = Result<T, CacheError>;

#[derive(Debug)]
pub enum CacheError {
    /// Storage medium rejected the operation (I/O, quota, locked file).
    Medium(DbError),
    /// Snapshot could not be encoded.
    Serialize(String),
    /// Stored snapshot could not be decoded.
    Corrupt(String),
}

impl Display for CacheError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Medium(err) => write!(f, "cache medium failure: {err}"),
            Self::Serialize(message) => write!(f, "cache serialization failure: {message}"),
            Self::Corrupt(message) => write!(f, "corrupt cache entry: {message}"),
        }
    }
}

impl Error for CacheError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Medium(err) => Some(err),
            Self::Serialize(_) | Self::Corrupt(_) => None,
        }
    }
}

impl From<DbError> for CacheError {
    fn from(value: DbError) -> Self {
        Self::Medium(value)
    }
}

impl From<rusqlite::Error> for CacheError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Medium(DbError::Sqlite(value))
    }
}

/// Synchronous string-keyed persistent key/value surface.
pub trait CacheMedium: Send {
    fn get(&self, key: &str) -> CacheResult<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> CacheResult<()>;
    fn remove(&mut self, key: &str) -> CacheResult<()>;
}

/// Returns the medium key used for one user's snapshot.
pub fn cache_key(user_id: &str) -> String {
    format!("{CACHE_KEY_PREFIX}{user_id}")
}

/// Per-user snapshot persistence over a `CacheMedium`.
pub struct LocalCacheStore {
    medium: Box<dyn CacheMedium>,
}

impl LocalCacheStore {
    pub fn new(medium: Box<dyn CacheMedium>) -> Self {
        Self { medium }
    }

    /// Cache kept only for the lifetime of this process.
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryCacheMedium::new()))
    }

    /// Reads the user's snapshot, mapping every failure to `None`.
    pub fn read(&self, user_id: &str) -> Option<PlannerState> {
        match self.try_read(user_id) {
            Ok(state) => state,
            Err(err) => {
                warn!(
                    "event=cache_read module=cache status=error error_code=cache_read_failed error={}",
                    err
                );
                None
            }
        }
    }

    /// Reads the user's snapshot and reports why it is unusable.
    pub fn try_read(&self, user_id: &str) -> CacheResult<Option<PlannerState>> {
        let Some(raw) = self.medium.get(&cache_key(user_id))? else {
            debug!("event=cache_read module=cache status=skipped reason=absent");
            return Ok(None);
        };
        let state = serde_json::from_str::<PlannerState>(&raw)
            .map_err(|err| CacheError::Corrupt(err.to_string()))?;
        debug!(
            "event=cache_read module=cache status=ok records={} bytes={}",
            state.record_count(),
            raw.len()
        );
        Ok(Some(state))
    }

    /// Persists the user's snapshot synchronously.
    pub fn write(&mut self, user_id: &str, state: &PlannerState) -> CacheResult<()> {
        let started_at = Instant::now();
        let encoded =
            serde_json::to_string(state).map_err(|err| CacheError::Serialize(err.to_string()))?;
        if let Err(err) = self.medium.set(&cache_key(user_id), &encoded) {
            warn!(
                "event=cache_write module=cache status=error duration_ms={} error_code=cache_write_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err);
        }
        debug!(
            "event=cache_write module=cache status=ok records={} bytes={} duration_ms={}",
            state.record_count(),
            encoded.len(),
            started_at.elapsed().as_millis()
        );
        Ok(())
    }

    /// Drops the user's snapshot.
    pub fn clear(&mut self, user_id: &str) -> CacheResult<()> {
        self.medium.remove(&cache_key(user_id))
    }
}
