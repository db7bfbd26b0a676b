//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `planner_core` linkage without the Flutter runtime.
//! - With `<config.toml> <user_id>`, run one session bootstrap against the
//!   configured remote and print per-collection counts.

use planner_core::{CollectionKind, PlannerConfig, PlannerSession, SessionEvent};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

const IDLE_TIMEOUT: Duration = Duration::from_secs(30);

fn main() -> ExitCode {
    println!("planner_core ping={}", planner_core::ping());
    println!("planner_core version={}", planner_core::core_version());

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    match args.as_slice() {
        [] => ExitCode::SUCCESS,
        [config_path, user_id] => match probe(PathBuf::from(config_path), user_id) {
            Ok(()) => ExitCode::SUCCESS,
            Err(message) => {
                eprintln!("probe failed: {message}");
                ExitCode::FAILURE
            }
        },
        _ => {
            eprintln!("usage: planner_cli [<config.toml> <user_id>]");
            ExitCode::from(2)
        }
    }
}

fn probe(config_path: PathBuf, user_id: &str) -> Result<(), String> {
    let config = PlannerConfig::load(&config_path).map_err(|err| err.to_string())?;
    planner_core::init_logging_from_config(&config.logging).map_err(|err| err.to_string())?;

    let mut session = PlannerSession::from_config(&config).map_err(|err| err.to_string())?;
    session.handle(SessionEvent::SignedIn {
        user_id: user_id.to_string(),
        access_token: std::env::var("PLANNER_ACCESS_TOKEN").ok(),
    });
    let orchestrator = session
        .orchestrator_mut()
        .ok_or_else(|| "sign-in did not start a session".to_string())?;

    let idle = orchestrator.wait_for_idle(IDLE_TIMEOUT);
    println!("sync_status={} idle={}", orchestrator.sync_status().as_str(), idle);
    for kind in CollectionKind::PUSH_ORDER {
        println!("{}={}", kind.table_name(), orchestrator.state().records(kind).len());
    }
    println!("budgets={}", orchestrator.state().budgets.len());
    if let Some(report) = orchestrator.last_load_report() {
        for err in &report.failed {
            println!("failed {err}");
        }
    }

    session.handle(SessionEvent::SignedOut);
    Ok(())
}
