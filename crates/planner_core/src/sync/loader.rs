//! Aggregate loader: one fetch per collection, assembled into `PlannerState`.
//!
//! # Responsibility
//! - Fetch all eleven collections sequentially in `LOAD_ORDER`.
//! - Translate records to internal naming and fold budget rows into the map.
//!
//! # Invariants
//! - A failed fetch yields an empty collection and never aborts the others.
//! - The loader always returns a complete `PlannerState`.

use super::budget_normalizer::{row_from_remote, to_map, BudgetKeyError};
use super::gateway::{GatewayError, RemoteGateway};
use super::key_casing::to_internal;
use crate::model::collection::CollectionKind;
use crate::model::state::PlannerState;
use log::{info, warn};
use std::sync::Arc;
use std::time::Instant;

/// Per-load diagnostics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    /// Collections whose fetch failed, in load order.
    pub failed: Vec<GatewayError>,
    /// Remote budget rows that could not be read.
    pub skipped_budget_rows: Vec<BudgetKeyError>,
}

impl LoadReport {
    /// Some collections were replaced by empty ones.
    pub fn is_degraded(&self) -> bool {
        !self.failed.is_empty()
    }

    pub fn failed_collections(&self) -> Vec<CollectionKind> {
        self.failed.iter().map(|err| err.collection).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadOutcome {
    pub state: PlannerState,
    pub report: LoadReport,
}

pub struct AggregateLoader {
    gateway: Arc<dyn RemoteGateway>,
}

impl AggregateLoader {
    pub fn new(gateway: Arc<dyn RemoteGateway>) -> Self {
        Self { gateway }
    }

    /// Loads every collection for `user_id`.
    pub fn load_all(&self, user_id: &str) -> LoadOutcome {
        let started_at = Instant::now();
        info!("event=load_all module=loader status=start");

        let mut state = PlannerState::default();
        let mut report = LoadReport::default();

        for kind in CollectionKind::LOAD_ORDER {
            let rows = match self.gateway.fetch(kind, user_id) {
                Ok(rows) => rows,
                Err(err) => {
                    warn!(
                        "event=collection_fetch module=loader status=error collection={} error_code={} retryable={}",
                        kind, err.code, err.retryable
                    );
                    report.failed.push(err);
                    continue;
                }
            };

            if kind == CollectionKind::Budgets {
                let mut budget_rows = Vec::with_capacity(rows.len());
                for row in &rows {
                    match row_from_remote(row) {
                        Ok(parsed) => budget_rows.push(parsed),
                        Err(err) => report.skipped_budget_rows.push(err),
                    }
                }
                state.budgets = to_map(&budget_rows);
            } else if let Some(records) = state.records_mut(kind) {
                *records = rows.into_iter().map(to_internal).collect();
            }
        }

        let status = if report.is_degraded() { "degraded" } else { "ok" };
        info!(
            "event=load_all module=loader status={} records={} budgets={} failed_collections={} skipped_budget_rows={} duration_ms={}",
            status,
            state.record_count(),
            state.budgets.len(),
            report.failed.len(),
            report.skipped_budget_rows.len(),
            started_at.elapsed().as_millis()
        );

        LoadOutcome { state, report }
    }
}
