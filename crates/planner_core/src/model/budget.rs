//! Budget rows as stored remotely.

use serde::{Deserialize, Serialize};

/// One per-subject, per-month budget limit.
///
/// `subject_id` is a finance category id or a fund id; the remote column is
/// `category_id` for both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetRow {
    pub subject_id: String,
    pub year: i32,
    pub month: u32,
    pub limit_amount: f64,
}

impl BudgetRow {
    pub fn new(subject_id: impl Into<String>, year: i32, month: u32, limit_amount: f64) -> Self {
        Self {
            subject_id: subject_id.into(),
            year,
            month,
            limit_amount,
        }
    }

    /// Composite map key `{subjectId}_{year}_{month}`.
    pub fn key(&self) -> String {
        format!("{}_{}_{}", self.subject_id, self.year, self.month)
    }
}
