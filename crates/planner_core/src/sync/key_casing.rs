//! Field-name translation between remote `snake_case` and internal `camelCase`.
//!
//! # Invariants
//! - Only top-level keys are renamed; values pass through untouched.
//! - Translation is total: keys that do not fit the pattern are kept as-is.

use crate::model::state::Record;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static SNAKE_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"_([a-z])").expect("valid regex"));
static CAMEL_HUMP: Lazy<Regex> = Lazy::new(|| Regex::new(r"([A-Z])").expect("valid regex"));

/// `sort_order` -> `sortOrder`. Underscores not followed by a lowercase
/// ASCII letter are preserved.
pub fn snake_to_camel(key: &str) -> String {
    SNAKE_SEGMENT
        .replace_all(key, |caps: &Captures<'_>| caps[1].to_ascii_uppercase())
        .into_owned()
}

/// `sortOrder` -> `sort_order`.
pub fn camel_to_snake(key: &str) -> String {
    CAMEL_HUMP
        .replace_all(key, |caps: &Captures<'_>| {
            format!("_{}", caps[1].to_ascii_lowercase())
        })
        .into_owned()
}

/// Renames every top-level key of a remote record into internal naming.
pub fn to_internal(record: Record) -> Record {
    record
        .into_iter()
        .map(|(key, value)| (snake_to_camel(&key), value))
        .collect()
}

/// Renames every top-level key of an internal record into remote naming.
pub fn to_remote(record: &Record) -> Record {
    record
        .iter()
        .map(|(key, value)| (camel_to_snake(key), value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{camel_to_snake, snake_to_camel, to_internal, to_remote};
    use serde_json::json;

    #[test]
    fn converts_common_column_names() {
        assert_eq!(snake_to_camel("sort_order"), "sortOrder");
        assert_eq!(snake_to_camel("is_recurring"), "isRecurring");
        assert_eq!(snake_to_camel("id"), "id");
        assert_eq!(camel_to_snake("recurrenceRule"), "recurrence_rule");
        assert_eq!(camel_to_snake("userId"), "user_id");
    }

    #[test]
    fn malformed_keys_pass_through() {
        assert_eq!(snake_to_camel("_"), "_");
        assert_eq!(snake_to_camel("field_1"), "field_1");
        assert_eq!(snake_to_camel("trailing_"), "trailing_");
        assert_eq!(camel_to_snake("already_snake"), "already_snake");
        assert_eq!(camel_to_snake(""), "");
    }

    #[test]
    fn nested_values_are_not_renamed() {
        let remote = json!({
            "rule_value": {"inner_key": [1, 2]},
            "icon_id": "star"
        })
        .as_object()
        .cloned()
        .expect("object fixture");

        let internal = to_internal(remote);
        assert_eq!(internal["ruleValue"], json!({"inner_key": [1, 2]}));
        assert_eq!(internal["iconId"], json!("star"));

        let back = to_remote(&internal);
        assert_eq!(back["rule_value"], json!({"inner_key": [1, 2]}));
        assert!(back.get("ruleValue").is_none());
    }
}
