//! Background push of local state to the remote store.
//!
//! # Responsibility
//! - Prepare internal records for the remote store (naming, owner, defaults).
//! - Upsert every record independently, collection by collection.
//!
//! # Invariants
//! - One upsert per record; a failure never skips later records.
//! - Present values are never altered; defaults fill absent or null fields only.

use super::budget_normalizer::{row_to_remote, to_rows, BudgetKeyError};
use super::gateway::{GatewayError, RemoteGateway};
use super::key_casing::to_remote;
use crate::model::collection::CollectionKind;
use crate::model::state::{record_id, BudgetMap, Record};
use log::{debug, info, warn};
use serde_json::Value;
use std::collections::BTreeSet;
use std::time::Instant;

/// Snapshot of what one `mutate` call sends to the remote store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PushPlan {
    pub user_id: String,
    /// Record collections in push order, with internal-naming records.
    pub collections: Vec<(CollectionKind, Vec<Record>)>,
    /// Full budget map to rewrite, when budgets are part of this push.
    pub budgets: Option<BudgetMap>,
}

impl PushPlan {
    pub fn is_empty(&self) -> bool {
        self.collections.is_empty() && self.budgets.is_none()
    }

    /// Collections touched by this plan, budgets last.
    pub fn kinds(&self) -> Vec<CollectionKind> {
        let mut kinds = self
            .collections
            .iter()
            .map(|(kind, _)| *kind)
            .collect::<Vec<_>>();
        if self.budgets.is_some() {
            kinds.push(CollectionKind::Budgets);
        }
        kinds
    }
}

/// Outcome of one push.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PushReport {
    /// Upsert calls issued.
    pub attempted: usize,
    pub failed: Vec<GatewayError>,
    pub malformed_budget_keys: Vec<BudgetKeyError>,
}

impl PushReport {
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    pub fn failed_collections(&self) -> BTreeSet<CollectionKind> {
        self.failed.iter().map(|err| err.collection).collect()
    }
}

/// Runs every upsert of `plan` against `gateway`.
pub fn run_push(gateway: &dyn RemoteGateway, plan: &PushPlan) -> PushReport {
    let started_at = Instant::now();
    let mut report = PushReport::default();

    for (kind, records) in &plan.collections {
        for record in records {
            let remote = prepare_record(*kind, record, &plan.user_id);
            report.attempted += 1;
            if let Err(err) = gateway.upsert(*kind, &remote) {
                warn!(
                    "event=record_upsert module=push status=error collection={} record_id={} error_code={} retryable={}",
                    kind,
                    record_id(record).unwrap_or("<none>"),
                    err.code,
                    err.retryable
                );
                report.failed.push(err);
            }
        }
        debug!(
            "event=collection_push module=push status=done collection={} records={}",
            kind,
            records.len()
        );
    }

    if let Some(budgets) = &plan.budgets {
        let split = to_rows(budgets);
        for skipped in &split.skipped {
            warn!("event=budget_row module=push status=skipped error={}", skipped);
        }
        report.malformed_budget_keys = split.skipped;
        for row in &split.rows {
            report.attempted += 1;
            let remote = row_to_remote(row, &plan.user_id);
            if let Err(err) = gateway.upsert(CollectionKind::Budgets, &remote) {
                warn!(
                    "event=record_upsert module=push status=error collection=budgets error_code={} retryable={}",
                    err.code, err.retryable
                );
                report.failed.push(err);
            }
        }
    }

    let status = if report.has_failures() { "error" } else { "ok" };
    info!(
        "event=remote_push module=push status={} collections={} attempted={} failed={} duration_ms={}",
        status,
        plan.kinds().len(),
        report.attempted,
        report.failed.len(),
        started_at.elapsed().as_millis()
    );
    report
}

/// Translates one internal record into the remote row sent on upsert.
pub fn prepare_record(kind: CollectionKind, record: &Record, user_id: &str) -> Record {
    let mut remote = to_remote(record);
    remote.insert("user_id".to_string(), Value::from(user_id));
    for (field, default) in remote_defaults(kind) {
        let missing = remote.get(field).map_or(true, Value::is_null);
        if missing {
            remote.insert(field.to_string(), default);
        }
    }
    remote
}

/// Column defaults the remote schema expects when the client left a field unset.
pub fn remote_defaults(kind: CollectionKind) -> Vec<(&'static str, Value)> {
    let mut defaults: Vec<(&'static str, Value)> = match kind {
        CollectionKind::Spheres => vec![
            ("icon_id", Value::from("star")),
            ("is_default", Value::from(false)),
        ],
        CollectionKind::Dreams => vec![
            ("type", Value::from("dream")),
            ("is_focused", Value::from(false)),
            ("is_leading", Value::from(false)),
            ("status", Value::from("active")),
        ],
        CollectionKind::Goals => vec![
            ("status", Value::from("active")),
            ("progress", Value::from(0)),
        ],
        CollectionKind::Steps => vec![("status", Value::from("active"))],
        CollectionKind::Actions => vec![
            ("status", Value::from("active")),
            ("priority", Value::from("normal")),
            ("is_recurring", Value::from(false)),
        ],
        CollectionKind::Activities | CollectionKind::FinanceCategories => {
            vec![("is_archived", Value::from(false))]
        }
        CollectionKind::Funds => vec![("balance", Value::from(0))],
        CollectionKind::Transactions => vec![("is_recurring", Value::from(false))],
        CollectionKind::Sessions | CollectionKind::Budgets => Vec::new(),
    };
    if kind.is_sort_ordered() {
        defaults.push(("sort_order", Value::from(0)));
    }
    defaults
}
