//! Expression evaluation: null propagation, logic, casts and row scope.

use std::sync::Arc;

use tessera::data::DataSet;
use tessera::error::Error;
use tessera::model::Schema;
use tessera::value::{DataType, Value};

#[test]
fn test_arithmetic_propagates_null() {
    let mut schema = Schema::new();
    let five = schema.constant(5_i64).unwrap();
    let missing = schema.null::<i64>().unwrap();
    let sum = schema.add(five, missing).unwrap();
    let product = schema.multiply(five, five).unwrap();
    assert_eq!(schema.eval(sum).unwrap(), Value::Null);
    assert_eq!(schema.eval(product).unwrap(), Value::Int64(25));
}

#[test]
fn test_three_valued_logic() {
    let mut schema = Schema::new();
    let yes = schema.constant(true).unwrap();
    let no = schema.constant(false).unwrap();
    let unknown = schema.null::<bool>().unwrap();

    let and_false = schema.and(unknown, no).unwrap();
    let and_true = schema.and(unknown, yes).unwrap();
    let or_true = schema.or(unknown, yes).unwrap();
    let or_false = schema.or(no, unknown).unwrap();
    let not_unknown = schema.not(unknown).unwrap();

    assert_eq!(schema.eval(and_false).unwrap(), Value::Boolean(false));
    assert_eq!(schema.eval(and_true).unwrap(), Value::Null);
    assert_eq!(schema.eval(or_true).unwrap(), Value::Boolean(true));
    assert_eq!(schema.eval(or_false).unwrap(), Value::Null);
    assert_eq!(schema.eval(not_unknown).unwrap(), Value::Null);
}

#[test]
fn test_comparisons() {
    let mut schema = Schema::new();
    let a = schema.constant("apple".to_string()).unwrap();
    let b = schema.constant("banana".to_string()).unwrap();
    let lt = schema.lt(a, b).unwrap();
    let eq = schema.eq(a, a).unwrap();
    let ne = schema.ne(a, b).unwrap();
    assert_eq!(schema.eval(lt).unwrap(), Value::Boolean(true));
    assert_eq!(schema.eval(eq).unwrap(), Value::Boolean(true));
    assert_eq!(schema.eval(ne).unwrap(), Value::Boolean(true));
}

#[test]
fn test_signed_zeros_compare_equal() {
    let mut schema = Schema::new();
    let negative_zero = schema.constant(-0.0_f64).unwrap();
    let zero = schema.constant(0.0_f64).unwrap();
    let eq = schema.eq(negative_zero, zero).unwrap();
    let ne = schema.ne(negative_zero, zero).unwrap();
    let ge = schema.ge(zero, negative_zero).unwrap();
    let le = schema.le(zero, negative_zero).unwrap();
    assert_eq!(schema.eval(eq).unwrap(), Value::Boolean(true));
    assert_eq!(schema.eval(ne).unwrap(), Value::Boolean(false));
    assert_eq!(schema.eval(ge).unwrap(), Value::Boolean(true));
    assert_eq!(schema.eval(le).unwrap(), Value::Boolean(true));
}

#[test]
fn test_nan_is_not_comparable() {
    let mut schema = Schema::new();
    let order = schema.add_model("Order").unwrap();
    let price = schema.add_column::<f64>(order, "Price").unwrap();
    let eq = schema.eq(price, price).unwrap();

    let mut data = DataSet::new(Arc::new(schema), order).unwrap();
    let row = data.add_row().unwrap();
    data.set(row, price, Some(f64::NAN)).unwrap();
    assert!(matches!(data.eval(row, eq).unwrap_err(), Error::InvalidOperation(_)));
}

#[test]
fn test_cast_out_of_range_double_fails() {
    let mut schema = Schema::new();
    let order = schema.add_model("Order").unwrap();
    let price = schema.add_column::<f64>(order, "Price").unwrap();
    let whole = schema.cast::<f64, i64>(price).unwrap();

    let mut data = DataSet::new(Arc::new(schema), order).unwrap();
    let row = data.add_row().unwrap();
    for value in [1e300, -1e300, 9_223_372_036_854_775_808.0, f64::INFINITY, f64::NAN] {
        data.set(row, price, Some(value)).unwrap();
        assert!(matches!(
            data.eval(row, whole).unwrap_err(),
            Error::InvalidCast { target: DataType::Int64, .. }
        ));
    }
    data.set(row, price, Some(-9_223_372_036_854_775_808.0)).unwrap();
    assert_eq!(data.eval(row, whole).unwrap(), Value::Int64(i64::MIN));
}

#[test]
fn test_cast_between_types() {
    let mut schema = Schema::new();
    let text = schema.constant("42".to_string()).unwrap();
    let number = schema.cast::<String, i64>(text).unwrap();
    let ratio = schema.cast::<i64, f64>(number).unwrap();
    assert_eq!(schema.eval(number).unwrap(), Value::Int64(42));
    assert_eq!(schema.eval(ratio).unwrap(), Value::Double(42.0));

    let bad = schema.constant("forty two".to_string()).unwrap();
    let bad = schema.cast::<String, i64>(bad).unwrap();
    assert!(matches!(
        schema.eval(bad).unwrap_err(),
        Error::InvalidCast { target: DataType::Int64, .. }
    ));
}

#[test]
fn test_if_null_and_is_null() {
    let mut schema = Schema::new();
    let missing = schema.null::<String>().unwrap();
    let fallback = schema.constant("n/a".to_string()).unwrap();
    let coalesced = schema.if_null(missing, fallback).unwrap();
    let is_null = schema.is_null(missing).unwrap();
    let length = schema.length(missing).unwrap();
    assert_eq!(schema.eval(coalesced).unwrap(), Value::from("n/a"));
    assert_eq!(schema.eval(is_null).unwrap(), Value::Boolean(true));
    assert_eq!(schema.eval(length).unwrap(), Value::Null);
}

#[test]
fn test_param_evaluates_to_its_value() {
    let mut schema = Schema::new();
    let order = schema.add_model("Order").unwrap();
    let amount = schema.add_column::<i64>(order, "Amount").unwrap();
    let param = schema.param(Some(7_i64), Some(amount)).unwrap();
    assert_eq!(schema.eval(param).unwrap(), Value::Int64(7));
}

#[test]
fn test_child_row_reads_parent_column() {
    let mut schema = Schema::new();
    let order = schema.add_model("Order").unwrap();
    let discount = schema.add_column::<f64>(order, "Discount").unwrap();
    let line = schema.add_child_model(order, "OrderLine").unwrap();
    let price = schema.add_column::<f64>(line, "Price").unwrap();
    let net = schema.add_column::<f64>(line, "Net").unwrap();
    let one = schema.constant(1.0_f64).unwrap();
    let keep = schema.subtract(one, discount).unwrap();
    let expr = schema.multiply(price, keep).unwrap();
    schema.compute(net, expr).unwrap();

    let mut data = DataSet::new(Arc::new(schema), order).unwrap();
    let o = data.add_row().unwrap();
    data.set(o, discount, Some(0.25)).unwrap();
    let l = data.add_child_row(o, line).unwrap();
    data.set(l, price, Some(100.0)).unwrap();
    assert_eq!(data.get(l, net).unwrap(), Some(75.0));

    // A parent write reaches computed columns of its children.
    data.set(o, discount, Some(0.5)).unwrap();
    assert_eq!(data.get(l, net).unwrap(), Some(50.0));
}

#[test]
fn test_model_column_without_row_is_invalid() {
    let mut schema = Schema::new();
    let order = schema.add_model("Order").unwrap();
    let amount = schema.add_column::<i64>(order, "Amount").unwrap();
    assert!(matches!(
        schema.eval(amount).unwrap_err(),
        Error::InvalidOperation(_)
    ));
}
