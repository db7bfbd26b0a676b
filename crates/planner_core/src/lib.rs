//! Local-first sync core for the personal planner.
//! This crate is the single source of truth for state-consistency invariants.

pub mod cache;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod sync;

pub use cache::{CacheError, CacheMedium, LocalCacheStore, MemoryCacheMedium, SqliteCacheMedium};
pub use config::{ConfigError, PlannerConfig, RemoteConfig};
pub use logging::{
    default_log_level, init_logging, init_logging_from_config, logging_status, LogLevel,
    LoggingError,
};
pub use model::budget::BudgetRow;
pub use model::collection::CollectionKind;
pub use model::state::{new_record_id, record_id, BudgetMap, PlannerState, Record};
pub use sync::budget_normalizer::{to_map, to_rows, BudgetKeyError, BudgetRows};
pub use sync::gateway::{GatewayError, GatewayResult, GatewayStage, RemoteGateway};
pub use sync::loader::{AggregateLoader, LoadOutcome, LoadReport};
pub use sync::orchestrator::{
    DeleteOutcome, MutateOutcome, PlannerView, SessionPhase, SyncError, SyncOrchestrator,
    SyncResult,
};
pub use sync::push::PushReport;
pub use sync::rest_gateway::RestGateway;
pub use sync::session::{PlannerSession, RemoteConnector, SessionChange, SessionError, SessionEvent};
pub use sync::tracker::SyncStatus;

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
