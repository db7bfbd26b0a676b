#![allow(dead_code)]

use planner_core::{
    CacheError, CacheMedium, CollectionKind, GatewayError, GatewayResult, GatewayStage,
    PlannerState, Record, RemoteGateway,
};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const USER: &str = "user-1";
pub const WAIT: Duration = Duration::from_secs(5);

pub fn record(value: Value) -> Record {
    value.as_object().cloned().expect("fixture must be a JSON object")
}

/// In-memory remote store with failure injection and call counters.
#[derive(Default)]
pub struct ScriptedGateway {
    rows: Mutex<BTreeMap<CollectionKind, Vec<Record>>>,
    failing_fetches: Mutex<HashSet<CollectionKind>>,
    failing_records: Mutex<HashSet<String>>,
    fetch_delay: Mutex<Option<Duration>>,
    upsert_delay: Mutex<Option<Duration>>,
    pub fetch_calls: AtomicUsize,
    pub upsert_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
}

impl ScriptedGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Seeds remote rows (remote naming) for one collection.
    pub fn seed(&self, kind: CollectionKind, rows: Vec<Value>) {
        self.rows
            .lock()
            .unwrap()
            .insert(kind, rows.into_iter().map(record).collect());
    }

    pub fn fail_fetch(&self, kind: CollectionKind) {
        self.failing_fetches.lock().unwrap().insert(kind);
    }

    pub fn heal_fetch(&self, kind: CollectionKind) {
        self.failing_fetches.lock().unwrap().remove(&kind);
    }

    /// Makes upserts of the record with this id (or budget subject) fail.
    pub fn fail_record(&self, id: &str) {
        self.failing_records.lock().unwrap().insert(id.to_string());
    }

    pub fn heal_record(&self, id: &str) {
        self.failing_records.lock().unwrap().remove(id);
    }

    pub fn set_fetch_delay(&self, delay: Duration) {
        *self.fetch_delay.lock().unwrap() = Some(delay);
    }

    pub fn set_upsert_delay(&self, delay: Duration) {
        *self.upsert_delay.lock().unwrap() = Some(delay);
    }

    pub fn rows(&self, kind: CollectionKind) -> Vec<Record> {
        self.rows
            .lock()
            .unwrap()
            .get(&kind)
            .cloned()
            .unwrap_or_default()
    }

    pub fn upserts(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    pub fn fetches(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }
}

fn row_key(kind: CollectionKind, row: &Record) -> String {
    if kind == CollectionKind::Budgets {
        return format!(
            "{}_{}_{}",
            row.get("category_id").and_then(Value::as_str).unwrap_or_default(),
            row.get("year").cloned().unwrap_or(Value::Null),
            row.get("month").cloned().unwrap_or(Value::Null)
        );
    }
    row.get("id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

impl RemoteGateway for ScriptedGateway {
    fn fetch(&self, kind: CollectionKind, _user_id: &str) -> GatewayResult<Vec<Record>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = *self.fetch_delay.lock().unwrap() {
            std::thread::sleep(delay);
        }
        if self.failing_fetches.lock().unwrap().contains(&kind) {
            return Err(GatewayError::new(
                kind,
                GatewayStage::Fetch,
                "network",
                "connection reset",
                true,
            ));
        }
        Ok(self.rows(kind))
    }

    fn upsert(&self, kind: CollectionKind, record: &Record) -> GatewayResult<()> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = *self.upsert_delay.lock().unwrap() {
            std::thread::sleep(delay);
        }
        let id = record
            .get("id")
            .or_else(|| record.get("category_id"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        if self.failing_records.lock().unwrap().contains(&id) {
            return Err(
                GatewayError::new(kind, GatewayStage::Upsert, "http_400", "rejected", false)
                    .with_record_id(id),
            );
        }

        let key = row_key(kind, record);
        let mut rows = self.rows.lock().unwrap();
        let table = rows.entry(kind).or_default();
        match table.iter_mut().find(|row| row_key(kind, row) == key) {
            Some(existing) => *existing = record.clone(),
            None => table.push(record.clone()),
        }
        Ok(())
    }

    fn delete(&self, kind: CollectionKind, id: &str) -> GatewayResult<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_records.lock().unwrap().contains(id) {
            return Err(
                GatewayError::new(kind, GatewayStage::Delete, "http_403", "forbidden", false)
                    .with_record_id(id),
            );
        }
        let mut rows = self.rows.lock().unwrap();
        if let Some(table) = rows.get_mut(&kind) {
            table.retain(|row| row_key(kind, row) != id);
        }
        Ok(())
    }
}

/// Cache medium that rejects every write, as a full disk would.
#[derive(Default)]
pub struct RejectingMedium;

impl CacheMedium for RejectingMedium {
    fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Ok(None)
    }

    fn set(&mut self, _key: &str, _value: &str) -> Result<(), CacheError> {
        Err(CacheError::Serialize("quota exceeded".to_string()))
    }

    fn remove(&mut self, _key: &str) -> Result<(), CacheError> {
        Ok(())
    }
}

/// A state with one record in each of the ten record collections.
pub fn full_state() -> PlannerState {
    let mut state = PlannerState::default();
    state.spheres.push(record(json!({"id": "sp1", "name": "Health", "sortOrder": 0})));
    state.dreams.push(record(json!({"id": "d1", "title": "Marathon", "sphereId": "sp1"})));
    state.goals.push(record(json!({"id": "g1", "dreamId": "d1", "title": "Run 10k"})));
    state.steps.push(record(json!({"id": "st1", "goalId": "g1", "title": "Base miles"})));
    state.actions.push(record(json!({
        "id": "a1",
        "stepId": "st1",
        "title": "Morning run",
        "date": "2025-03-01",
        "time": "07:00",
        "priority": "high",
        "status": "active"
    })));
    state.activities.push(record(json!({"id": "ac1", "name": "Running"})));
    state.sessions.push(record(json!({
        "id": "se1",
        "activityId": "ac1",
        "startAt": "2025-03-01T07:00:00Z",
        "duration": 3600
    })));
    state
        .finance_categories
        .push(record(json!({"id": "cat_food", "name": "Food", "type": "expense"})));
    state.funds.push(record(json!({"id": "f1", "name": "Reserve", "balance": 100})));
    state.transactions.push(record(json!({
        "id": "t1",
        "type": "expense",
        "amount": 12.5,
        "categoryId": "cat_food"
    })));
    state
}
