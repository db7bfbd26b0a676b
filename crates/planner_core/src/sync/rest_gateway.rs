//! PostgREST-style HTTP gateway.
//!
//! # Responsibility
//! - Map gateway calls onto `/rest/v1/{table}` requests.
//! - Classify HTTP failures into transient and permanent errors.
//!
//! # Invariants
//! - One HTTP request per gateway call; no retries.
//! - Request/response bodies are never logged.

use super::gateway::{GatewayError, GatewayResult, GatewayStage, RemoteGateway};
use crate::config::RemoteConfig;
use crate::model::collection::CollectionKind;
use crate::model::state::Record;
use log::{debug, warn};
use serde_json::Value;
use std::time::{Duration, Instant};

const REST_PREFIX: &str = "/rest/v1";
const BUDGET_CONFLICT_COLUMNS: &str = "user_id,category_id,year,month";

/// Blocking HTTP gateway backed by `ureq`.
pub struct RestGateway {
    base_url: String,
    api_key: String,
    access_token: Option<String>,
    agent: ureq::Agent,
}

impl RestGateway {
    pub fn new(config: &RemoteConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build();
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            access_token: None,
            agent,
        }
    }

    /// Authorizes requests with a user session token instead of the api key.
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.access_token = (!token.trim().is_empty()).then_some(token);
        self
    }

    fn table_url(&self, kind: CollectionKind) -> String {
        format!("{}{REST_PREFIX}/{}", self.base_url, kind.table_name())
    }

    fn bearer(&self) -> String {
        format!(
            "Bearer {}",
            self.access_token.as_deref().unwrap_or(self.api_key.as_str())
        )
    }

    fn authorized(&self, request: ureq::Request) -> ureq::Request {
        request
            .set("apikey", &self.api_key)
            .set("Authorization", &self.bearer())
    }
}

impl RemoteGateway for RestGateway {
    fn fetch(&self, kind: CollectionKind, user_id: &str) -> GatewayResult<Vec<Record>> {
        let started_at = Instant::now();
        let mut request = self
            .authorized(self.agent.get(&self.table_url(kind)))
            .query("select", "*")
            .query("user_id", &format!("eq.{user_id}"));
        if let Some(order) = kind.remote_order() {
            let direction = if order.ascending { "asc" } else { "desc" };
            request = request.query("order", &format!("{}.{direction}", order.column));
        }

        let response = request
            .call()
            .map_err(|err| classify(kind, GatewayStage::Fetch, err))?;
        let body: Value = response.into_json().map_err(|err| {
            GatewayError::new(kind, GatewayStage::Fetch, "decode", err.to_string(), true)
        })?;
        let records = decode_records(kind, body)?;

        debug!(
            "event=remote_fetch module=gateway status=ok collection={} count={} duration_ms={}",
            kind,
            records.len(),
            started_at.elapsed().as_millis()
        );
        Ok(records)
    }

    fn upsert(&self, kind: CollectionKind, record: &Record) -> GatewayResult<()> {
        let record_id = record.get("id").and_then(Value::as_str).unwrap_or_default();
        let mut request = self
            .authorized(self.agent.post(&self.table_url(kind)))
            .set("Content-Type", "application/json")
            .set("Prefer", "resolution=merge-duplicates,return=minimal");
        if kind == CollectionKind::Budgets {
            request = request.query("on_conflict", BUDGET_CONFLICT_COLUMNS);
        }

        request
            .send_json(Value::Object(record.clone()))
            .map_err(|err| classify(kind, GatewayStage::Upsert, err).with_record_id(record_id))?;
        Ok(())
    }

    fn delete(&self, kind: CollectionKind, id: &str) -> GatewayResult<()> {
        self.authorized(self.agent.delete(&self.table_url(kind)))
            .query("id", &format!("eq.{id}"))
            .call()
            .map_err(|err| classify(kind, GatewayStage::Delete, err).with_record_id(id))?;
        Ok(())
    }
}

fn decode_records(kind: CollectionKind, body: Value) -> GatewayResult<Vec<Record>> {
    match body {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(record) => Ok(record),
                other => Err(GatewayError::new(
                    kind,
                    GatewayStage::Fetch,
                    "decode",
                    format!("expected object row, got {}", json_kind(&other)),
                    false,
                )),
            })
            .collect(),
        Value::Null => Ok(Vec::new()),
        other => Err(GatewayError::new(
            kind,
            GatewayStage::Fetch,
            "decode",
            format!("expected array body, got {}", json_kind(&other)),
            false,
        )),
    }
}

fn classify(kind: CollectionKind, stage: GatewayStage, err: ureq::Error) -> GatewayError {
    match err {
        ureq::Error::Status(code, response) => {
            let retryable = is_retryable_status(code);
            let detail = response
                .into_string()
                .ok()
                .and_then(|body| serde_json::from_str::<Value>(&body).ok())
                .and_then(|json| json.get("message").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_else(|| format!("server returned status {code}"));
            warn!(
                "event=remote_call module=gateway status=error collection={} stage={} error_code=http_{} retryable={}",
                kind,
                stage.as_str(),
                code,
                retryable
            );
            GatewayError::new(kind, stage, format!("http_{code}"), detail, retryable)
        }
        ureq::Error::Transport(transport) => {
            warn!(
                "event=remote_call module=gateway status=error collection={} stage={} error_code=network retryable=true",
                kind,
                stage.as_str()
            );
            GatewayError::new(kind, stage, "network", transport.to_string(), true)
        }
    }
}

/// Timeouts, throttling and server errors are worth another attempt.
pub fn is_retryable_status(code: u16) -> bool {
    matches!(code, 408 | 429) || (500..600).contains(&code)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
