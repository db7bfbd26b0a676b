//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose the planner session lifecycle and state operations to Dart via FRB.
//! - Exchange planner state as camelCase JSON text.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - At most one planner session holder exists per process.

use log::warn;
use planner_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, new_record_id,
    ping as ping_inner, CollectionKind, PlannerConfig, PlannerSession, PlannerState,
    SessionChange, SessionEvent, SyncOrchestrator,
};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

static SESSION: Mutex<Option<PlannerSession>> = Mutex::new(None);

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// Generates a fresh id for a record created on the Dart side.
#[flutter_rust_bridge::frb(sync)]
pub fn planner_new_record_id() -> String {
    new_record_id()
}

/// Generic action response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannerActionResponse {
    /// Whether operation succeeded.
    pub ok: bool,
    /// `idle|syncing|error`, or `None` without an active session.
    pub sync_status: Option<String>,
    /// Human-readable response message for diagnostics/UI.
    pub message: String,
}

impl PlannerActionResponse {
    fn success(message: impl Into<String>, sync_status: Option<String>) -> Self {
        Self {
            ok: true,
            sync_status,
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            sync_status: None,
            message: message.into(),
        }
    }
}

/// Current planner state for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannerStateResponse {
    pub ok: bool,
    /// Whole state as camelCase JSON; `None` on failure.
    pub state_json: Option<String>,
    pub sync_status: Option<String>,
    pub message: String,
}

/// Loads configuration from `config_path` and opens the session holder.
///
/// Replaces any previous holder; its active session is closed first.
#[flutter_rust_bridge::frb(sync)]
pub fn planner_open(config_path: String) -> PlannerActionResponse {
    let config = match PlannerConfig::load(Path::new(config_path.trim())) {
        Ok(config) => config,
        Err(err) => return PlannerActionResponse::failure(format!("planner_open failed: {err}")),
    };
    if let Err(err) = planner_core::init_logging_from_config(&config.logging) {
        warn!("event=ffi_open module=ffi status=degraded reason=logging_init error={err}");
    }
    let session = match PlannerSession::from_config(&config) {
        Ok(session) => session,
        Err(err) => return PlannerActionResponse::failure(format!("planner_open failed: {err}")),
    };

    match SESSION.lock() {
        Ok(mut slot) => {
            if let Some(mut previous) = slot.take() {
                previous.handle(SessionEvent::SignedOut);
            }
            *slot = Some(session);
            PlannerActionResponse::success("Planner opened.", None)
        }
        Err(_) => PlannerActionResponse::failure("planner_open failed: session lock poisoned"),
    }
}

/// Starts (or keeps) the session for `user_id`.
///
/// Blocks on the first remote load when the user has no cached snapshot.
#[flutter_rust_bridge::frb(sync)]
pub fn planner_sign_in(user_id: String, access_token: Option<String>) -> PlannerActionResponse {
    with_session(|session| {
        let change = session.handle(SessionEvent::SignedIn {
            user_id,
            access_token,
        });
        let status = active_status(session);
        match change {
            SessionChange::Started { .. } => {
                PlannerActionResponse::success("Session started.", status)
            }
            SessionChange::Unchanged => {
                PlannerActionResponse::success("Session unchanged.", status)
            }
            SessionChange::Ended { .. } | SessionChange::Ignored => {
                PlannerActionResponse::failure("planner_sign_in ignored: empty user id")
            }
        }
    })
}

/// Ends the active session, if any.
#[flutter_rust_bridge::frb(sync)]
pub fn planner_sign_out() -> PlannerActionResponse {
    with_session(|session| match session.handle(SessionEvent::SignedOut) {
        SessionChange::Ended { .. } => PlannerActionResponse::success("Session ended.", None),
        _ => PlannerActionResponse::success("No active session.", None),
    })
}

/// Returns the current state, applying any finished background reload first.
#[flutter_rust_bridge::frb(sync)]
pub fn planner_state() -> PlannerStateResponse {
    let result = with_orchestrator(|orchestrator| {
        let view = orchestrator.view();
        let json = serde_json::to_string(view.state)
            .map_err(|err| format!("planner_state failed: {err}"))?;
        Ok((json, view.sync_status.as_str().to_string()))
    });
    match result {
        Ok((state_json, sync_status)) => PlannerStateResponse {
            ok: true,
            state_json: Some(state_json),
            sync_status: Some(sync_status),
            message: String::new(),
        },
        Err(message) => PlannerStateResponse {
            ok: false,
            state_json: None,
            sync_status: None,
            message,
        },
    }
}

/// Replaces the whole state with `state_json`.
#[flutter_rust_bridge::frb(sync)]
pub fn planner_mutate(state_json: String) -> PlannerActionResponse {
    let next = match serde_json::from_str::<PlannerState>(&state_json) {
        Ok(next) => next,
        Err(err) => {
            return PlannerActionResponse::failure(format!("planner_mutate invalid state: {err}"))
        }
    };
    into_response(with_orchestrator(|orchestrator| {
        let outcome = orchestrator
            .mutate(next)
            .map_err(|err| format!("planner_mutate failed: {err}"))?;
        let message = match outcome.cache_error {
            Some(err) => format!("State updated; cache write failed: {err}"),
            None => format!("State updated; {} collection(s) queued.", outcome.pushed.len()),
        };
        Ok(PlannerActionResponse::success(message, status_of(orchestrator)))
    }))
}

/// Deletes one record by collection table name (e.g. `goals`) and id.
#[flutter_rust_bridge::frb(sync)]
pub fn planner_delete_record(collection: String, id: String) -> PlannerActionResponse {
    let kind = match CollectionKind::from_table_name(collection.trim()) {
        Some(kind) if kind.is_record_collection() => kind,
        _ => {
            return PlannerActionResponse::failure(format!(
                "planner_delete_record unknown collection: {collection}"
            ))
        }
    };
    into_response(with_orchestrator(|orchestrator| {
        let outcome = orchestrator
            .delete_record(kind, id.trim())
            .map_err(|err| format!("planner_delete_record failed: {err}"))?;
        let message = if outcome.removed {
            "Record deleted."
        } else {
            "Record not found locally; remote delete queued."
        };
        Ok(PlannerActionResponse::success(message, status_of(orchestrator)))
    }))
}

/// Reloads everything from the remote store, replacing local state.
#[flutter_rust_bridge::frb(sync)]
pub fn planner_force_refresh() -> PlannerActionResponse {
    into_response(with_orchestrator(|orchestrator| {
        let report = orchestrator
            .force_refresh()
            .map_err(|err| format!("planner_force_refresh failed: {err}"))?;
        let message = if report.is_degraded() {
            let failed = report
                .failed_collections()
                .iter()
                .map(|kind| kind.table_name())
                .collect::<Vec<_>>();
            format!("Refreshed with failures: {}", failed.join(","))
        } else {
            "Refreshed.".to_string()
        };
        Ok(PlannerActionResponse::success(message, status_of(orchestrator)))
    }))
}

/// Waits up to `timeout_ms` for background pushes to finish.
#[flutter_rust_bridge::frb(sync)]
pub fn planner_wait_for_idle(timeout_ms: u32) -> PlannerActionResponse {
    into_response(with_orchestrator(|orchestrator| {
        let idle = orchestrator.wait_for_idle(Duration::from_millis(u64::from(timeout_ms)));
        let message = if idle { "Idle." } else { "Still syncing." };
        Ok(PlannerActionResponse::success(message, status_of(orchestrator)))
    }))
}

fn with_session(f: impl FnOnce(&mut PlannerSession) -> PlannerActionResponse) -> PlannerActionResponse {
    match SESSION.lock() {
        Ok(mut slot) => match slot.as_mut() {
            Some(session) => f(session),
            None => PlannerActionResponse::failure("planner is not opened"),
        },
        Err(_) => PlannerActionResponse::failure("session lock poisoned"),
    }
}

fn with_orchestrator<T>(
    f: impl FnOnce(&mut SyncOrchestrator) -> Result<T, String>,
) -> Result<T, String> {
    let mut slot = SESSION
        .lock()
        .map_err(|_| "session lock poisoned".to_string())?;
    let session = slot
        .as_mut()
        .ok_or_else(|| "planner is not opened".to_string())?;
    let orchestrator = session
        .orchestrator_mut()
        .ok_or_else(|| "no signed-in session".to_string())?;
    f(orchestrator)
}

fn into_response(result: Result<PlannerActionResponse, String>) -> PlannerActionResponse {
    result.unwrap_or_else(PlannerActionResponse::failure)
}

fn status_of(orchestrator: &SyncOrchestrator) -> Option<String> {
    Some(orchestrator.sync_status().as_str().to_string())
}

fn active_status(session: &PlannerSession) -> Option<String> {
    session.orchestrator().and_then(status_of)
}

#[cfg(test)]
mod tests {
    use super::{
        core_version, init_logging, ping, planner_delete_record, planner_mutate,
        planner_new_record_id, planner_open,
    };

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }

    #[test]
    fn init_logging_rejects_empty_log_dir() {
        let error = init_logging("info".to_string(), String::new());
        assert!(!error.is_empty());
    }

    #[test]
    fn init_logging_rejects_unsupported_level() {
        let error = init_logging("verbose".to_string(), "tmp/logs".to_string());
        assert!(!error.is_empty());
    }

    #[test]
    fn mutate_rejects_malformed_state_json() {
        let response = planner_mutate("{\"dreams\": 3}".to_string());
        assert!(!response.ok);
        assert!(response.message.contains("invalid state"));
    }

    #[test]
    fn delete_rejects_unknown_and_budget_collections() {
        let unknown = planner_delete_record("notes".to_string(), "n1".to_string());
        assert!(!unknown.ok);
        assert!(unknown.message.contains("unknown collection"));

        let budgets = planner_delete_record("budgets".to_string(), "b1".to_string());
        assert!(!budgets.ok);
    }

    #[test]
    fn new_record_ids_are_distinct() {
        assert_ne!(planner_new_record_id(), planner_new_record_id());
    }

    #[test]
    fn open_fails_for_missing_config_file() {
        let response = planner_open("/nonexistent/planner.toml".to_string());
        assert!(!response.ok);
        assert!(response.message.starts_with("planner_open failed"));
    }
}
