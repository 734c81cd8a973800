//! CASE and CASE ON evaluation, in memory and against rows.

use std::sync::Arc;

use tessera::data::DataSet;
use tessera::model::Schema;
use tessera::value::Value;

#[test]
fn test_first_matching_when_wins() {
    let mut schema = Schema::new();
    let yes = schema.constant(true).unwrap();
    let one = schema.constant(1_i64).unwrap();
    let two = schema.constant(2_i64).unwrap();
    let three = schema.constant(3_i64).unwrap();

    let case = schema
        .case::<i64>()
        .when(yes, one)
        .when(yes, two)
        .otherwise(&mut schema, three)
        .unwrap();

    assert_eq!(schema.eval(case).unwrap(), Value::Int64(1));
}

#[test]
fn test_else_when_nothing_matches() {
    let mut schema = Schema::new();
    let no = schema.constant(false).unwrap();
    let unknown = schema.null::<bool>().unwrap();
    let one = schema.constant(1_i64).unwrap();
    let three = schema.constant(3_i64).unwrap();

    let case = schema
        .case::<i64>()
        .when(no, one)
        .when(unknown, one)
        .otherwise(&mut schema, three)
        .unwrap();

    assert_eq!(schema.eval(case).unwrap(), Value::Int64(3));
}

#[test]
fn test_case_without_when_is_else() {
    let mut schema = Schema::new();
    let fallback = schema.constant("fallback".to_string()).unwrap();
    let case = schema.case::<String>().otherwise(&mut schema, fallback).unwrap();
    assert_eq!(schema.eval(case).unwrap(), Value::from("fallback"));
}

#[test]
fn test_case_on_dispatches_by_equality() {
    let mut schema = Schema::new();
    let order = schema.add_model("Order").unwrap();
    let status = schema.add_column::<i64>(order, "Status").unwrap();
    let open = schema.constant(1_i64).unwrap();
    let closed = schema.constant(2_i64).unwrap();
    let open_label = schema.constant("open".to_string()).unwrap();
    let closed_label = schema.constant("closed".to_string()).unwrap();
    let other_label = schema.constant("other".to_string()).unwrap();

    let label = schema
        .case_on::<i64, String>(status)
        .when(open, open_label)
        .when(closed, closed_label)
        .otherwise(&mut schema, other_label)
        .unwrap();

    let mut data = DataSet::new(Arc::new(schema), order).unwrap();
    let row = data.add_row().unwrap();

    data.set(row, status, Some(2)).unwrap();
    assert_eq!(data.get(row, label).unwrap().as_deref(), Some("closed"));

    data.set(row, status, Some(1)).unwrap();
    assert_eq!(data.get(row, label).unwrap().as_deref(), Some("open"));

    data.set(row, status, Some(9)).unwrap();
    assert_eq!(data.get(row, label).unwrap().as_deref(), Some("other"));

    data.set(row, status, None).unwrap();
    assert_eq!(data.get(row, label).unwrap().as_deref(), Some("other"));
}

#[test]
fn test_case_rejects_mismatched_branch_types() {
    let mut schema = Schema::new();
    let yes = schema.constant(true).unwrap();
    let one = schema.constant(1_i64).unwrap();
    let text = schema.constant("x".to_string()).unwrap();
    assert!(schema.case_expr(vec![(yes.id(), one.id())], text.id()).is_err());
    assert!(schema.case_expr(vec![(one.id(), one.id())], one.id()).is_err());
}
