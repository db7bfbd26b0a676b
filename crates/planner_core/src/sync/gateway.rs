//! Remote collection gateway contract.
//!
//! # Responsibility
//! - Define the per-collection read/upsert/delete surface of the remote store.
//! - Carry failures as a stable envelope that distinguishes transient from
//!   permanent errors.
//!
//! # Invariants
//! - Records crossing this boundary use remote (`snake_case`) field names.
//! - Implementations perform no retries and no batching.
//! - Implementations must not panic; every failure is a `GatewayError`.

use crate::model::collection::CollectionKind;
use crate::model::state::Record;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Operation stage that produced a gateway failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayStage {
    Fetch,
    Upsert,
    Delete,
}

impl GatewayStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Upsert => "upsert",
            Self::Delete => "delete",
        }
    }
}

/// Stable gateway error envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayError {
    pub collection: CollectionKind,
    pub stage: GatewayStage,
    /// Record id for upsert/delete failures.
    pub record_id: Option<String>,
    /// Machine-readable code, e.g. `network`, `http_409`, `decode`.
    pub code: String,
    pub message: String,
    /// `true` for network/timeout/throttling failures.
    pub retryable: bool,
}

impl GatewayError {
    pub fn new(
        collection: CollectionKind,
        stage: GatewayStage,
        code: impl Into<String>,
        message: impl Into<String>,
        retryable: bool,
    ) -> Self {
        Self {
            collection,
            stage,
            record_id: None,
            code: code.into(),
            message: message.into(),
            retryable,
        }
    }

    pub fn with_record_id(mut self, record_id: impl Into<String>) -> Self {
        self.record_id = Some(record_id.into());
        self
    }

    pub fn is_transient(&self) -> bool {
        self.retryable
    }
}

impl Display for GatewayError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} failed [{}]: {}",
            self.collection,
            self.stage.as_str(),
            self.code,
            self.message
        )?;
        if let Some(id) = &self.record_id {
            write!(f, " (record {id})")?;
        }
        Ok(())
    }
}

impl Error for GatewayError {}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Per-collection access to the remote authoritative store.
///
/// Shared with background workers.
pub trait RemoteGateway: Send + Sync {
    /// Reads every record of `kind` owned by `user_id`, in server order.
    fn fetch(&self, kind: CollectionKind, user_id: &str) -> GatewayResult<Vec<Record>>;

    /// Inserts or replaces one record, keyed by its `id` (budgets: by
    /// owner, subject, year and month).
    fn upsert(&self, kind: CollectionKind, record: &Record) -> GatewayResult<()>;

    /// Deletes one record by id.
    fn delete(&self, kind: CollectionKind, id: &str) -> GatewayResult<()>;
}
