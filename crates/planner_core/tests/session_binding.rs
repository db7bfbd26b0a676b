mod common;

use common::{full_state, ScriptedGateway, WAIT};
use planner_core::{
    CollectionKind, LocalCacheStore, PlannerConfig, PlannerSession, RemoteGateway, SessionChange,
    SessionError, SessionEvent, SessionPhase, SyncStatus,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

fn signed_in(user_id: &str) -> SessionEvent {
    SessionEvent::SignedIn {
        user_id: user_id.to_string(),
        access_token: Some(format!("token-{user_id}")),
    }
}

fn session_over(gateway: &Arc<ScriptedGateway>) -> PlannerSession {
    let gateway = Arc::clone(gateway);
    PlannerSession::new(
        LocalCacheStore::in_memory(),
        Box::new(move |_token: Option<&str>| -> Arc<dyn RemoteGateway> { gateway.clone() }),
        2,
    )
}

#[test]
fn sign_in_starts_a_ready_session() {
    let gateway = ScriptedGateway::new();
    gateway.seed(CollectionKind::Dreams, vec![json!({"id": "d1"})]);
    let mut session = session_over(&gateway);

    let change = session.handle(signed_in("alice"));

    assert_eq!(
        change,
        SessionChange::Started {
            user_id: "alice".to_string()
        }
    );
    let orchestrator = session.orchestrator().unwrap();
    assert_eq!(orchestrator.phase(), SessionPhase::Ready);
    assert_eq!(orchestrator.state().dreams.len(), 1);
    assert_eq!(session.active_user_id(), Some("alice"));
}

#[test]
fn repeated_sign_in_for_same_user_keeps_the_session() {
    let gateway = ScriptedGateway::new();
    let mut session = session_over(&gateway);

    session.handle(signed_in("alice"));
    let fetches = gateway.fetches();

    assert_eq!(session.handle(signed_in("alice")), SessionChange::Unchanged);
    assert_eq!(gateway.fetches(), fetches);
}

#[test]
fn sign_out_ends_the_session() {
    let gateway = ScriptedGateway::new();
    let mut session = session_over(&gateway);

    assert_eq!(session.handle(SessionEvent::SignedOut), SessionChange::Ignored);
    session.handle(signed_in("alice"));

    assert_eq!(
        session.handle(SessionEvent::SignedOut),
        SessionChange::Ended {
            user_id: "alice".to_string()
        }
    );
    assert!(session.orchestrator().is_none());
    assert_eq!(session.active_user_id(), None);
}

#[test]
fn blank_user_id_is_ignored() {
    let gateway = ScriptedGateway::new();
    let mut session = session_over(&gateway);

    assert_eq!(session.handle(signed_in("  ")), SessionChange::Ignored);
    assert!(session.orchestrator().is_none());
    assert_eq!(gateway.fetches(), 0);
}

#[test]
fn switching_users_replaces_the_orchestrator() {
    let gateway = ScriptedGateway::new();
    let mut session = session_over(&gateway);

    session.handle(signed_in("alice"));
    let orchestrator = session.orchestrator_mut().unwrap();
    orchestrator.mutate(full_state()).unwrap();
    assert!(orchestrator.wait_for_idle(WAIT));

    let change = session.handle(signed_in("bob"));

    assert_eq!(
        change,
        SessionChange::Started {
            user_id: "bob".to_string()
        }
    );
    assert_eq!(session.active_user_id(), Some("bob"));
    assert_eq!(session.orchestrator().unwrap().user_id(), "bob");
}

#[test]
fn returning_user_warm_starts_from_cache() {
    let gateway = ScriptedGateway::new();
    let mut session = session_over(&gateway);

    session.handle(signed_in("alice"));
    let orchestrator = session.orchestrator_mut().unwrap();
    orchestrator.mutate(full_state()).unwrap();
    assert!(orchestrator.wait_for_idle(WAIT));
    session.handle(SessionEvent::SignedOut);

    gateway.set_fetch_delay(Duration::from_millis(10));
    session.handle(signed_in("alice"));

    let orchestrator = session.orchestrator_mut().unwrap();
    assert_eq!(orchestrator.state().goals.len(), 1);
    assert_eq!(orchestrator.sync_status(), SyncStatus::Syncing);
    assert!(orchestrator.wait_for_idle(WAIT));
}

#[test]
fn connector_receives_the_access_token() {
    let gateway = ScriptedGateway::new();
    let seen = Arc::new(Mutex::new(Vec::<Option<String>>::new()));
    let calls = Arc::new(AtomicUsize::new(0));
    let connector = {
        let seen = Arc::clone(&seen);
        let calls = Arc::clone(&calls);
        let gateway = Arc::clone(&gateway);
        move |token: Option<&str>| -> Arc<dyn RemoteGateway> {
            calls.fetch_add(1, Ordering::SeqCst);
            seen.lock().unwrap().push(token.map(str::to_string));
            gateway.clone()
        }
    };
    let mut session = PlannerSession::with_defaults(LocalCacheStore::in_memory(), Box::new(connector));

    session.handle(signed_in("alice"));
    session.handle(SessionEvent::SignedIn {
        user_id: "bob".to_string(),
        access_token: None,
    });

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(
        *seen.lock().unwrap(),
        vec![Some("token-alice".to_string()), None]
    );
}

#[test]
fn pump_applies_queued_events_in_order() {
    let gateway = ScriptedGateway::new();
    let mut session = session_over(&gateway);
    let (sender, receiver) = mpsc::channel();

    sender.send(signed_in("alice")).unwrap();
    sender.send(SessionEvent::SignedOut).unwrap();
    sender.send(signed_in("bob")).unwrap();

    assert_eq!(session.pump(&receiver), 3);
    assert_eq!(session.active_user_id(), Some("bob"));
    assert_eq!(session.pump(&receiver), 0);
}

#[test]
fn session_from_config_requires_remote_url() {
    let config = PlannerConfig::from_toml_str("[sync]\nmax_in_flight_pushes = 2\n").unwrap();

    let err = PlannerSession::from_config(&config).err().unwrap();
    assert!(matches!(err, SessionError::Config(_)));
}

#[test]
fn session_from_config_opens_sqlite_cache() {
    let dir = tempfile::tempdir().unwrap();
    let text = format!(
        "[remote]\nbase_url = \"http://127.0.0.1:9\"\napi_key = \"anon\"\n\n[cache]\npath = \"{}\"\n",
        dir.path().join("cache.db").display()
    );
    let config = PlannerConfig::from_toml_str(&text).unwrap();

    let session = PlannerSession::from_config(&config).unwrap();

    assert!(session.orchestrator().is_none());
    assert!(dir.path().join("cache.db").exists());
}
