//! Computation registration and dependency tracking.

use tessera::error::Error;
use tessera::model::{Col, ColumnSet, Schema};

fn two_columns() -> (Schema, Col<i64>, Col<i64>, Col<i64>) {
    let mut schema = Schema::new();
    let order = schema.add_model("Order").unwrap();
    let a = schema.add_column::<i64>(order, "A").unwrap();
    let b = schema.add_column::<i64>(order, "B").unwrap();
    let one = schema.constant(1_i64).unwrap();
    (schema, a, b, one)
}

#[test]
fn test_direct_self_reference_is_circular() {
    let (mut schema, a, _, one) = two_columns();
    let expr = schema.add(a, one).unwrap();
    assert!(matches!(
        schema.compute(a, expr).unwrap_err(),
        Error::CircularComputation { .. }
    ));
    assert!(!schema.column(a.id()).unwrap().is_computed());
}

#[test]
fn test_cycle_is_detected_whichever_column_merges_first() {
    for a_first in [true, false] {
        let (mut schema, a, b, one) = two_columns();
        let a_expr = schema.add(b, one).unwrap();
        let b_expr = schema.add(a, one).unwrap();

        let (first, second) = if a_first {
            ((a, a_expr), (b, b_expr))
        } else {
            ((b, b_expr), (a, a_expr))
        };
        schema.compute(first.0, first.1).unwrap();
        let err = schema.compute(second.0, second.1).unwrap_err();
        assert!(matches!(err, Error::CircularComputation { .. }), "a_first = {}", a_first);

        // The failed merge leaves the schema as it was.
        assert!(schema.column(first.0.id()).unwrap().is_computed());
        assert!(!schema.column(second.0.id()).unwrap().is_computed());
    }
}

#[test]
fn test_cycle_through_a_chain() {
    let mut schema = Schema::new();
    let order = schema.add_model("Order").unwrap();
    let a = schema.add_column::<i64>(order, "A").unwrap();
    let b = schema.add_column::<i64>(order, "B").unwrap();
    let c = schema.add_column::<i64>(order, "C").unwrap();
    let b_expr = schema.negate(a).unwrap();
    let c_expr = schema.negate(b).unwrap();
    let a_expr = schema.negate(c).unwrap();
    schema.compute(b, b_expr).unwrap();
    schema.compute(c, c_expr).unwrap();
    assert!(matches!(
        schema.compute(a, a_expr).unwrap_err(),
        Error::CircularComputation { .. }
    ));
}

#[test]
fn test_compute_all_registers_together_or_not_at_all() {
    let (mut schema, a, b, one) = two_columns();
    let a_expr = schema.add(b, one).unwrap();
    let b_expr = schema.add(a, one).unwrap();
    assert!(schema
        .compute_all(&[(a.id(), a_expr.id()), (b.id(), b_expr.id())])
        .is_err());
    assert!(schema.computations().is_empty());
    assert!(!schema.column(a.id()).unwrap().is_computed());
}

#[test]
fn test_dependents_are_grouped_by_model() {
    let mut schema = Schema::new();
    let order = schema.add_model("Order").unwrap();
    let total = schema.add_column::<i64>(order, "Total").unwrap();
    let line = schema.add_child_model(order, "OrderLine").unwrap();
    let amount = schema.add_column::<i64>(line, "Amount").unwrap();
    let doubled = schema.add_column::<i64>(line, "Doubled").unwrap();

    let sum = schema.sum(amount).unwrap();
    schema.compute(total, sum).unwrap();
    let twice = schema.add(amount, amount).unwrap();
    schema.compute(doubled, twice).unwrap();

    let manager = schema.computations();
    let changed = ColumnSet::of(amount.id());
    assert_eq!(manager.sibling_computation_columns(&changed), ColumnSet::of(doubled.id()));

    let others = manager.non_sibling_computation_columns(&changed);
    assert_eq!(others.len(), 1);
    assert_eq!(others[&order], ColumnSet::of(total.id()));

    let aggregates = manager.aggregate_computation_columns(&schema, line).unwrap();
    assert_eq!(aggregates[&order], ColumnSet::of(total.id()));
    assert!(manager.aggregate_computation_columns(&schema, order).unwrap().is_empty());
}

#[test]
fn test_expression_must_stay_within_reachable_models() {
    let mut schema = Schema::new();
    let order = schema.add_model("Order").unwrap();
    let total = schema.add_column::<i64>(order, "Total").unwrap();
    let line = schema.add_child_model(order, "OrderLine").unwrap();
    let amount = schema.add_column::<i64>(line, "Amount").unwrap();
    let copy = schema.negate(amount).unwrap();

    // A parent row cannot read a child column without aggregating it.
    assert!(matches!(
        schema.compute(total, copy).unwrap_err(),
        Error::InvalidComputation { .. }
    ));
}
