use planner_core::{to_map, to_rows, BudgetKeyError, BudgetMap, BudgetRow};

#[test]
fn splitting_then_folding_preserves_the_map() {
    let mut map = BudgetMap::new();
    map.insert("cat_food_2025_3".to_string(), 5000.0);
    map.insert("fund_reserve_2024_12".to_string(), 120.25);
    map.insert("f1_2026_1".to_string(), 0.0);

    let split = to_rows(&map);

    assert!(split.skipped.is_empty());
    assert_eq!(split.rows.len(), 3);
    assert_eq!(to_map(&split.rows), map);
}

#[test]
fn folding_then_splitting_preserves_distinct_rows() {
    let mut rows = vec![
        BudgetRow::new("cat_food", 2025, 3, 5000.0),
        BudgetRow::new("cat_food", 2025, 4, 4500.0),
        BudgetRow::new("my_fund", 2024, 11, 12.0),
    ];

    let mut back = to_rows(&to_map(&rows)).rows;
    rows.sort_by_key(BudgetRow::key);
    back.sort_by_key(BudgetRow::key);
    assert_eq!(back, rows);
}

#[test]
fn folding_example_row_yields_composite_key() {
    let map = to_map(&[BudgetRow::new("cat_food", 2025, 3, 5000.0)]);

    assert_eq!(map.len(), 1);
    assert_eq!(map["cat_food_2025_3"], 5000.0);
}

#[test]
fn duplicate_rows_keep_the_last_limit() {
    let map = to_map(&[
        BudgetRow::new("cat_food", 2025, 3, 10.0),
        BudgetRow::new("cat_food", 2025, 3, 20.0),
    ]);

    assert_eq!(map["cat_food_2025_3"], 20.0);
}

#[test]
fn malformed_keys_are_skipped_individually() {
    let mut map = BudgetMap::new();
    map.insert("cat_food_2025_3".to_string(), 1.0);
    map.insert("cat_food".to_string(), 2.0);
    map.insert("cat_food_march_2025".to_string(), 3.0);

    let split = to_rows(&map);

    assert_eq!(split.rows, vec![BudgetRow::new("cat_food", 2025, 3, 1.0)]);
    assert_eq!(split.skipped.len(), 2);
    assert!(split
        .skipped
        .contains(&BudgetKeyError::Malformed("cat_food".to_string())));
}
