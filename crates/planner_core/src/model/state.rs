//! `PlannerState` aggregate root.
//!
//! # Responsibility
//! - Hold the eleven collections rendered by presentation code.
//! - Serialize to the cache format (`camelCase` collection names).
//!
//! # Invariants
//! - Record order is the order supplied by the caller or the remote store;
//!   core never re-sorts.
//! - Records are transported verbatim; only the `id` field is interpreted.

use super::collection::CollectionKind;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use uuid::Uuid;

/// One opaque record, keyed by field name.
pub type Record = Map<String, Value>;

/// Budget limits keyed by `{subjectId}_{year}_{month}`.
pub type BudgetMap = BTreeMap<String, f64>;

/// Returns the record id when present and textual.
pub fn record_id(record: &Record) -> Option<&str> {
    record.get("id").and_then(Value::as_str)
}

/// Generates a fresh client-side record id.
pub fn new_record_id() -> String {
    Uuid::new_v4().to_string()
}

/// Complete planner snapshot for one user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannerState {
    #[serde(default)]
    pub spheres: Vec<Record>,
    #[serde(default)]
    pub dreams: Vec<Record>,
    #[serde(default)]
    pub goals: Vec<Record>,
    #[serde(default)]
    pub steps: Vec<Record>,
    #[serde(default)]
    pub actions: Vec<Record>,
    #[serde(default)]
    pub activities: Vec<Record>,
    #[serde(default)]
    pub sessions: Vec<Record>,
    #[serde(default)]
    pub finance_categories: Vec<Record>,
    #[serde(default)]
    pub funds: Vec<Record>,
    #[serde(default)]
    pub transactions: Vec<Record>,
    #[serde(default)]
    pub budgets: BudgetMap,
}

impl PlannerState {
    /// Returns the records of one collection; budgets yield an empty slice.
    pub fn records(&self, kind: CollectionKind) -> &[Record] {
        match kind {
            CollectionKind::Spheres => &self.spheres,
            CollectionKind::Dreams => &self.dreams,
            CollectionKind::Goals => &self.goals,
            CollectionKind::Steps => &self.steps,
            CollectionKind::Actions => &self.actions,
            CollectionKind::Activities => &self.activities,
            CollectionKind::Sessions => &self.sessions,
            CollectionKind::FinanceCategories => &self.finance_categories,
            CollectionKind::Funds => &self.funds,
            CollectionKind::Transactions => &self.transactions,
            CollectionKind::Budgets => &[],
        }
    }

    /// Mutable access to one record collection; `None` for budgets.
    pub fn records_mut(&mut self, kind: CollectionKind) -> Option<&mut Vec<Record>> {
        let records = match kind {
            CollectionKind::Spheres => &mut self.spheres,
            CollectionKind::Dreams => &mut self.dreams,
            CollectionKind::Goals => &mut self.goals,
            CollectionKind::Steps => &mut self.steps,
            CollectionKind::Actions => &mut self.actions,
            CollectionKind::Activities => &mut self.activities,
            CollectionKind::Sessions => &mut self.sessions,
            CollectionKind::FinanceCategories => &mut self.finance_categories,
            CollectionKind::Funds => &mut self.funds,
            CollectionKind::Transactions => &mut self.transactions,
            CollectionKind::Budgets => return None,
        };
        Some(records)
    }

    /// Total number of records across the ten record collections.
    pub fn record_count(&self) -> usize {
        CollectionKind::PUSH_ORDER
            .iter()
            .map(|kind| self.records(*kind).len())
            .sum()
    }

    /// Removes the record with `id` from `kind`. Returns whether one was removed.
    pub fn remove_record(&mut self, kind: CollectionKind, id: &str) -> bool {
        let Some(records) = self.records_mut(kind) else {
            return false;
        };
        let before = records.len();
        records.retain(|record| record_id(record) != Some(id));
        records.len() != before
    }

    /// Collections whose content differs from `previous`, in load order.
    pub fn changed_collections(&self, previous: &PlannerState) -> Vec<CollectionKind> {
        CollectionKind::LOAD_ORDER
            .into_iter()
            .filter(|kind| match kind {
                CollectionKind::Budgets => self.budgets != previous.budgets,
                other => self.records(*other) != previous.records(*other),
            })
            .collect()
    }

    /// Ids that appear more than once within one collection.
    ///
    /// Core tolerates such input (the remote store resolves it by
    /// last-write-wins) but reports it for diagnostics.
    pub fn duplicate_ids(&self) -> Vec<(CollectionKind, String)> {
        let mut duplicates = Vec::new();
        for kind in CollectionKind::PUSH_ORDER {
            let mut seen = HashSet::new();
            for id in self.records(kind).iter().filter_map(record_id) {
                if !seen.insert(id) {
                    duplicates.push((kind, id.to_string()));
                }
            }
        }
        duplicates
    }
}
