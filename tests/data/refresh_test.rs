//! Refresh of computed columns as rows and values change.

use std::sync::Arc;

use tessera::config::ComputationSettings;
use tessera::data::{DataSet, RowId};
use tessera::model::{Col, ModelId, Schema};
use tessera::value::Value;

struct Orders {
    schema: Schema,
    order: ModelId,
    line: ModelId,
    total: Col<i64>,
    amount: Col<i64>,
}

/// `Order.Total = SUM(OrderLine.Amount)`.
fn orders() -> Orders {
    let mut schema = Schema::new();
    let order = schema.add_model("Order").unwrap();
    let total = schema.add_column::<i64>(order, "Total").unwrap();
    let line = schema.add_child_model(order, "OrderLine").unwrap();
    let amount = schema.add_column::<i64>(line, "Amount").unwrap();
    let sum = schema.sum(amount).unwrap();
    schema.compute(total, sum).unwrap();
    Orders {
        schema,
        order,
        line,
        total,
        amount,
    }
}

fn add_line(data: &mut DataSet, order: RowId, line: ModelId, amount: Col<i64>, value: i64) -> RowId {
    let row = data.add_child_row(order, line).unwrap();
    data.set(row, amount, Some(value)).unwrap();
    row
}

#[test]
fn test_explicit_refresh_of_order_total() {
    let Orders {
        schema,
        order,
        line,
        total,
        amount,
    } = orders();
    let settings = ComputationSettings { auto_refresh: false };
    let mut data = DataSet::with_settings(Arc::new(schema), order, settings).unwrap();

    let o = data.add_row().unwrap();
    add_line(&mut data, o, line, amount, 10);
    add_line(&mut data, o, line, amount, 15);
    assert_eq!(data.eval(o, total).unwrap(), Value::Null);

    data.refresh_computations(o).unwrap();
    assert_eq!(data.get(o, total).unwrap(), Some(25));

    add_line(&mut data, o, line, amount, 5);
    assert_eq!(data.get(o, total).unwrap(), Some(25));
    data.refresh_computations(o).unwrap();
    assert_eq!(data.get(o, total).unwrap(), Some(30));
}

#[test]
fn test_auto_refresh_follows_every_change() {
    let Orders {
        schema,
        order,
        line,
        total,
        amount,
    } = orders();
    let mut data = DataSet::new(Arc::new(schema), order).unwrap();

    let o = data.add_row().unwrap();
    assert_eq!(data.get(o, total).unwrap(), Some(0));

    let first = add_line(&mut data, o, line, amount, 10);
    add_line(&mut data, o, line, amount, 15);
    assert_eq!(data.get(o, total).unwrap(), Some(25));

    add_line(&mut data, o, line, amount, 5);
    assert_eq!(data.get(o, total).unwrap(), Some(30));

    data.set(first, amount, Some(20)).unwrap();
    assert_eq!(data.get(o, total).unwrap(), Some(40));

    data.remove_row(first).unwrap();
    assert_eq!(data.get(o, total).unwrap(), Some(20));
}

#[test]
fn test_orders_refresh_independently() {
    let Orders {
        schema,
        order,
        line,
        total,
        amount,
    } = orders();
    let mut data = DataSet::new(Arc::new(schema), order).unwrap();

    let a = data.add_row().unwrap();
    let b = data.add_row().unwrap();
    add_line(&mut data, a, line, amount, 1);
    add_line(&mut data, b, line, amount, 100);
    add_line(&mut data, a, line, amount, 2);

    assert_eq!(data.get(a, total).unwrap(), Some(3));
    assert_eq!(data.get(b, total).unwrap(), Some(100));
}

#[test]
fn test_child_computation_reading_parent_aggregate() {
    let Orders {
        mut schema,
        order,
        line,
        total,
        amount,
    } = orders();
    // OrderLine.Share = Amount * 100 / Order.Total
    let share = schema.add_column::<i64>(line, "Share").unwrap();
    let hundred = schema.constant(100_i64).unwrap();
    let scaled = schema.multiply(amount, hundred).unwrap();
    let expr = schema.divide(scaled, total).unwrap();
    schema.compute(share, expr).unwrap();

    let mut data = DataSet::new(Arc::new(schema), order).unwrap();
    let o = data.add_row().unwrap();
    let first = add_line(&mut data, o, line, amount, 30);
    let second = add_line(&mut data, o, line, amount, 70);

    assert_eq!(data.get(o, total).unwrap(), Some(100));
    assert_eq!(data.get(first, share).unwrap(), Some(30));
    assert_eq!(data.get(second, share).unwrap(), Some(70));

    data.set(second, amount, Some(20)).unwrap();
    assert_eq!(data.get(o, total).unwrap(), Some(50));
    assert_eq!(data.get(first, share).unwrap(), Some(60));
    assert_eq!(data.get(second, share).unwrap(), Some(40));
}
