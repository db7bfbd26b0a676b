//! Budget row list <-> composite-key map.
//!
//! # Responsibility
//! - Fold remote budget rows into the `budgets` lookup map.
//! - Split the map back into rows for the remote row rewrite.
//!
//! # Invariants
//! - Later rows win when two rows share a key.
//! - A malformed key skips only its own entry.

use crate::model::budget::BudgetRow;
use crate::model::state::{BudgetMap, Record};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

// Subject ids may contain underscores, so the year/month suffix anchors the split.
static BUDGET_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<subject>.+)_(?P<year>-?\d+)_(?P<month>\d+)$").expect("valid regex")
});

/// Budget normalization failures. Always non-fatal to the whole transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BudgetKeyError {
    /// Map key does not match `{subjectId}_{year}_{month}`.
    Malformed(String),
    /// Remote row lacks a usable subject id, year, month or limit.
    InvalidRow(String),
}

impl Display for BudgetKeyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed(key) => write!(f, "malformed budget key: {key}"),
            Self::InvalidRow(message) => write!(f, "invalid budget row: {message}"),
        }
    }
}

impl Error for BudgetKeyError {}

/// Result of splitting a budget map into rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BudgetRows {
    pub rows: Vec<BudgetRow>,
    pub skipped: Vec<BudgetKeyError>,
}

/// Folds rows into the composite-key map. Later rows overwrite earlier ones.
pub fn to_map(rows: &[BudgetRow]) -> BudgetMap {
    let mut map = BudgetMap::new();
    for row in rows {
        map.insert(row.key(), row.limit_amount);
    }
    map
}

/// Splits every map entry back into a row; malformed keys are skipped and reported.
pub fn to_rows(map: &BudgetMap) -> BudgetRows {
    let mut result = BudgetRows::default();
    for (key, limit_amount) in map {
        match parse_key(key) {
            Ok((subject_id, year, month)) => {
                result
                    .rows
                    .push(BudgetRow::new(subject_id, year, month, *limit_amount));
            }
            Err(err) => result.skipped.push(err),
        }
    }
    result
}

/// Parses `{subjectId}_{year}_{month}`.
pub fn parse_key(key: &str) -> Result<(String, i32, u32), BudgetKeyError> {
    let malformed = || BudgetKeyError::Malformed(key.to_string());
    let caps = BUDGET_KEY.captures(key).ok_or_else(malformed)?;
    let year = caps["year"].parse::<i32>().map_err(|_| malformed())?;
    let month = caps["month"].parse::<u32>().map_err(|_| malformed())?;
    Ok((caps["subject"].to_string(), year, month))
}

/// Reads a budget row from a remote record (`category_id`, `year`, `month`,
/// `limit_amount`).
pub fn row_from_remote(record: &Record) -> Result<BudgetRow, BudgetKeyError> {
    let subject_id = match record.get("category_id") {
        Some(Value::String(value)) if !value.is_empty() => value.clone(),
        Some(Value::Number(value)) => value.to_string(),
        _ => return Err(invalid_row(record, "category_id")),
    };
    let year = integer_field(record, "year")
        .and_then(|value| i32::try_from(value).ok())
        .ok_or_else(|| invalid_row(record, "year"))?;
    let month = integer_field(record, "month")
        .and_then(|value| u32::try_from(value).ok())
        .ok_or_else(|| invalid_row(record, "month"))?;
    let limit_amount = number_field(record, "limit_amount")
        .ok_or_else(|| invalid_row(record, "limit_amount"))?;

    Ok(BudgetRow::new(subject_id, year, month, limit_amount))
}

/// Builds the remote record for one budget row, owned by `user_id`.
pub fn row_to_remote(row: &BudgetRow, user_id: &str) -> Record {
    let mut record = Record::new();
    record.insert("user_id".to_string(), Value::from(user_id));
    record.insert("category_id".to_string(), Value::from(row.subject_id.as_str()));
    record.insert("year".to_string(), Value::from(row.year));
    record.insert("month".to_string(), Value::from(row.month));
    record.insert("limit_amount".to_string(), Value::from(row.limit_amount));
    record
}

fn integer_field(record: &Record, field: &str) -> Option<i64> {
    match record.get(field)? {
        Value::Number(value) => value
            .as_i64()
            .or_else(|| value.as_f64().filter(|v| v.fract() == 0.0).map(|v| v as i64)),
        Value::String(value) => value.trim().parse().ok(),
        _ => None,
    }
}

fn number_field(record: &Record, field: &str) -> Option<f64> {
    match record.get(field)? {
        Value::Number(value) => value.as_f64(),
        // Numeric columns may come back as strings from the REST layer.
        Value::String(value) => value.trim().parse().ok(),
        _ => None,
    }
}

fn invalid_row(record: &Record, field: &str) -> BudgetKeyError {
    let id = record
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or("<no id>");
    BudgetKeyError::InvalidRow(format!("row {id} has no usable `{field}`"))
}

#[cfg(test)]
mod tests {
    use super::{parse_key, row_from_remote, row_to_remote, to_map, to_rows, BudgetKeyError};
    use crate::model::budget::BudgetRow;
    use crate::model::state::BudgetMap;
    use serde_json::json;

    #[test]
    fn later_rows_win_on_key_collision() {
        let rows = vec![
            BudgetRow::new("cat_food", 2025, 3, 100.0),
            BudgetRow::new("cat_food", 2025, 3, 250.0),
        ];
        let map = to_map(&rows);
        assert_eq!(map.len(), 1);
        assert_eq!(map["cat_food_2025_3"], 250.0);
    }

    #[test]
    fn parse_key_keeps_underscores_in_subject_id() {
        assert_eq!(
            parse_key("cat_food_2025_3").expect("valid key"),
            ("cat_food".to_string(), 2025, 3)
        );
        assert!(matches!(
            parse_key("cat_food_2025"),
            Err(BudgetKeyError::Malformed(_))
        ));
        assert!(parse_key("_2025_3").is_err());
        assert!(parse_key("fund_x_2025_march").is_err());
    }

    #[test]
    fn to_rows_skips_and_reports_malformed_keys() {
        let mut map = BudgetMap::new();
        map.insert("fund_1_2024_12".to_string(), 42.5);
        map.insert("garbage".to_string(), 1.0);

        let split = to_rows(&map);
        assert_eq!(split.rows, vec![BudgetRow::new("fund_1", 2024, 12, 42.5)]);
        assert_eq!(
            split.skipped,
            vec![BudgetKeyError::Malformed("garbage".to_string())]
        );
    }

    #[test]
    fn remote_rows_accept_numeric_strings() {
        let record = json!({
            "id": "b1",
            "category_id": "cat_food",
            "year": "2025",
            "month": 3,
            "limit_amount": "5000.00"
        })
        .as_object()
        .cloned()
        .expect("object fixture");

        let row = row_from_remote(&record).expect("row should parse");
        assert_eq!(row, BudgetRow::new("cat_food", 2025, 3, 5000.0));
    }

    #[test]
    fn remote_rows_without_month_are_rejected() {
        let record = json!({"id": "b2", "category_id": "c", "year": 2025, "limit_amount": 1})
            .as_object()
            .cloned()
            .expect("object fixture");
        let err = row_from_remote(&record).expect_err("missing month must fail");
        assert!(err.to_string().contains("month"));
    }

    #[test]
    fn row_to_remote_uses_remote_column_names() {
        let record = row_to_remote(&BudgetRow::new("f1", 2026, 1, 12.0), "user-1");
        assert_eq!(record["user_id"], json!("user-1"));
        assert_eq!(record["category_id"], json!("f1"));
        assert_eq!(record["limit_amount"], json!(12.0));
    }
}
