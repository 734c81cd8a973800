//! Aggregates over child rows, evaluated from the parent's row.

use std::sync::Arc;

use tessera::data::{DataSet, DataSetChain};
use tessera::error::Error;
use tessera::model::Schema;
use tessera::value::Value;

#[test]
fn test_sum_over_children() {
    let mut schema = Schema::new();
    let order = schema.add_model("Order").unwrap();
    let line = schema.add_child_model(order, "OrderLine").unwrap();
    let amount = schema.add_column::<i64>(line, "Amount").unwrap();
    let total = schema.sum(amount).unwrap();
    let count = schema.count(amount).unwrap();
    let average = schema.average(amount).unwrap();

    let mut data = DataSet::new(Arc::new(schema), order).unwrap();
    let o = data.add_row().unwrap();
    for value in [4, 6, 11] {
        let l = data.add_child_row(o, line).unwrap();
        data.set(l, amount, Some(value)).unwrap();
    }
    let empty = data.add_child_row(o, line).unwrap();

    assert_eq!(data.get(o, total).unwrap(), Some(21));
    // Nulls are skipped by every aggregate.
    assert_eq!(data.get(o, count).unwrap(), Some(3));
    assert_eq!(data.get(o, average).unwrap(), Some(7.0));
    assert_eq!(data.eval(empty, amount).unwrap(), Value::Null);
}

#[test]
fn test_integer_sum_overflow_fails() {
    let mut schema = Schema::new();
    let order = schema.add_model("Order").unwrap();
    let line = schema.add_child_model(order, "OrderLine").unwrap();
    let amount = schema.add_column::<i64>(line, "Amount").unwrap();
    let total = schema.sum(amount).unwrap();

    let mut data = DataSet::new(Arc::new(schema), order).unwrap();
    let o = data.add_row().unwrap();
    for value in [i64::MAX, 1] {
        let l = data.add_child_row(o, line).unwrap();
        data.set(l, amount, Some(value)).unwrap();
    }

    assert!(matches!(data.eval(o, total).unwrap_err(), Error::InvalidOperation(_)));
}

#[test]
fn test_empty_input_yields_identity() {
    let mut schema = Schema::new();
    let order = schema.add_model("Order").unwrap();
    let line = schema.add_child_model(order, "OrderLine").unwrap();
    let amount = schema.add_column::<f64>(line, "Amount").unwrap();
    let total = schema.sum(amount).unwrap();
    let count = schema.count(amount).unwrap();
    let average = schema.average(amount).unwrap();
    let highest = schema.max(amount).unwrap();

    let mut data = DataSet::new(Arc::new(schema), order).unwrap();
    let o = data.add_row().unwrap();

    assert_eq!(data.eval(o, total).unwrap(), Value::Double(0.0));
    assert_eq!(data.eval(o, count).unwrap(), Value::Int64(0));
    assert_eq!(data.eval(o, average).unwrap(), Value::Null);
    assert_eq!(data.eval(o, highest).unwrap(), Value::Null);
}

#[test]
fn test_aggregate_over_grandchildren() {
    let mut schema = Schema::new();
    let order = schema.add_model("Order").unwrap();
    let line = schema.add_child_model(order, "OrderLine").unwrap();
    let shipment = schema.add_child_model(line, "Shipment").unwrap();
    let weight = schema.add_column::<i64>(shipment, "Weight").unwrap();
    let heaviest = schema.max(weight).unwrap();
    let first = schema.first(weight).unwrap();
    let last = schema.last(weight).unwrap();

    let mut data = DataSet::new(Arc::new(schema), order).unwrap();
    let o = data.add_row().unwrap();
    let l1 = data.add_child_row(o, line).unwrap();
    let l2 = data.add_child_row(o, line).unwrap();
    for (l, w) in [(l1, 3), (l2, 9), (l1, 5)] {
        let s = data.add_child_row(l, shipment).unwrap();
        data.set(s, weight, Some(w)).unwrap();
    }

    // Leaves are visited line by line: 3, 5, then 9.
    assert_eq!(data.get(o, heaviest).unwrap(), Some(9));
    assert_eq!(data.get(o, first).unwrap(), Some(3));
    assert_eq!(data.get(o, last).unwrap(), Some(9));
    // From a line, only its own shipments are in scope.
    assert_eq!(data.get(l1, heaviest).unwrap(), Some(5));

    let chain = [line, shipment];
    assert_eq!(DataSetChain::new(&data, o, &chain).rows().unwrap().len(), 3);
}

#[test]
fn test_aggregate_from_the_aggregated_model_fails() {
    let mut schema = Schema::new();
    let order = schema.add_model("Order").unwrap();
    let line = schema.add_child_model(order, "OrderLine").unwrap();
    let amount = schema.add_column::<i64>(line, "Amount").unwrap();
    let total = schema.sum(amount).unwrap();

    let mut data = DataSet::new(Arc::new(schema), order).unwrap();
    let o = data.add_row().unwrap();
    let l = data.add_child_row(o, line).unwrap();
    assert!(data.eval(l, total).is_err());
}
