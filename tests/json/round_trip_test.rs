//! Writing columns as JSON and reading them back.

use std::sync::Arc;

use tessera::data::DataSet;
use tessera::error::{Error, JsonError};
use tessera::json::{self, register_defaults, ConverterRegistry};
use tessera::model::{Col, ColumnId, ModelId, Schema};
use tessera::value::Value;

struct Orders {
    schema: Schema,
    order: ModelId,
    amount: Col<i64>,
    price: Col<f64>,
    name: Col<String>,
    open: Col<bool>,
    qty: Col<i64>,
}

fn orders() -> Orders {
    let mut schema = Schema::new();
    let order = schema.add_model("Order").unwrap();
    let amount = schema.add_column::<i64>(order, "Amount").unwrap();
    let price = schema.add_column::<f64>(order, "Price").unwrap();
    let name = schema.add_column::<String>(order, "Name").unwrap();
    let open = schema.add_column::<bool>(order, "Open").unwrap();
    let line = schema.add_child_model(order, "OrderLine").unwrap();
    let qty = schema.add_column::<i64>(line, "Qty").unwrap();
    Orders {
        schema,
        order,
        amount,
        price,
        name,
        open,
        qty,
    }
}

/// Write `column`, parse it back, and check the copy writes and lowers
/// identically. Returns the parsed column.
fn round_trip(schema: &mut Schema, column: impl Into<ColumnId>) -> ColumnId {
    let column = column.into();
    let text = json::to_json(schema, column, false).unwrap();
    let parsed = json::parse_column(schema, &text).unwrap();
    assert_eq!(json::to_json(schema, parsed, false).unwrap(), text);
    assert_eq!(schema.db_expression(parsed).unwrap(), schema.db_expression(column).unwrap());
    parsed
}

#[test]
fn test_constant_text() {
    let mut schema = Schema::new();
    let five = schema.constant(5_i64).unwrap();
    let text = json::to_json(&schema, five, false).unwrap();
    insta::assert_snapshot!(text, @r#"{"TypeId":"Int64Column","Expression":{"TypeId":"ConstantExpression","ArgTypeIds":["Int64"],"Value":5}}"#);
}

#[test]
fn test_comparison_text_carries_operand_and_result_types() {
    let Orders { mut schema, amount, .. } = orders();
    let ten = schema.constant(10_i64).unwrap();
    let large = schema.gt(amount, ten).unwrap();
    let text = json::to_json(&schema, large, false).unwrap();
    insta::assert_snapshot!(text, @r#"{"TypeId":"BooleanColumn","Expression":{"TypeId":"BinaryExpression","ArgTypeIds":["Int64","Boolean"],"Kind":"GreaterThan","Left":{"TypeId":"Int64Column","Name":"Order.Amount"},"Right":{"TypeId":"Int64Column","Expression":{"TypeId":"ConstantExpression","ArgTypeIds":["Int64"],"Value":10}}}}"#);
}

#[test]
fn test_every_node_kind_round_trips() {
    let Orders {
        mut schema,
        amount,
        price,
        name,
        open,
        qty,
        ..
    } = orders();

    let half = schema.constant(0.5_f64).unwrap();
    let no_name = schema.null::<String>().unwrap();
    let param = schema.param(Some(3_i64), Some(amount)).unwrap();
    let loose_param = schema.param::<bool>(None, None).unwrap();
    let negated = schema.negate(price).unwrap();
    let closed = schema.not(open).unwrap();
    let discounted = schema.multiply(price, half).unwrap();
    let as_double = schema.cast::<i64, f64>(amount).unwrap();
    let as_text = schema.cast::<i64, String>(amount).unwrap();
    let upper = schema.upper(name).unwrap();
    let fallback = schema.constant("n/a".to_string()).unwrap();
    let named = schema.if_null(name, fallback).unwrap();
    let total_qty = schema.sum(qty).unwrap();
    let line_count = schema.count(qty).unwrap();

    let label_open = schema.constant("open".to_string()).unwrap();
    let label_closed = schema.constant("closed".to_string()).unwrap();
    let status = schema
        .case::<String>()
        .when(open, label_open)
        .when(closed, label_closed)
        .otherwise(&mut schema, no_name)
        .unwrap();

    let one = schema.constant(1_i64).unwrap();
    let two = schema.constant(2_i64).unwrap();
    let small = schema.constant("small".to_string()).unwrap();
    let pair = schema.constant("pair".to_string()).unwrap();
    let size = schema
        .case_on::<i64, String>(amount)
        .when(one, small)
        .when(two, pair)
        .otherwise(&mut schema, upper)
        .unwrap();

    let columns: Vec<ColumnId> = vec![
        amount.into(),
        half.into(),
        no_name.into(),
        param.into(),
        loose_param.into(),
        negated.into(),
        closed.into(),
        discounted.into(),
        as_double.into(),
        as_text.into(),
        upper.into(),
        named.into(),
        total_qty.into(),
        line_count.into(),
        status.into(),
        size.into(),
    ];
    for column in columns {
        round_trip(&mut schema, column);
    }
}

#[test]
fn test_parsed_expression_evaluates_like_original() {
    let Orders {
        mut schema,
        order,
        amount,
        price,
        ..
    } = orders();
    let as_double = schema.cast::<i64, f64>(amount).unwrap();
    let total = schema.multiply(as_double, price).unwrap();
    let parsed = round_trip(&mut schema, total);

    let mut data = DataSet::new(Arc::new(schema), order).unwrap();
    let row = data.add_row().unwrap();
    data.set(row, amount, Some(4)).unwrap();
    data.set(row, price, Some(2.5)).unwrap();
    assert_eq!(data.eval(row, parsed).unwrap(), Value::Double(10.0));
    assert_eq!(data.eval(row, parsed).unwrap(), data.eval(row, total).unwrap());
}

#[test]
fn test_parsed_constant_folds_without_rows() {
    let mut schema = Schema::new();
    let left = schema.constant("ab".to_string()).unwrap();
    let right = schema.constant("cd".to_string()).unwrap();
    let joined = schema.add(left, right).unwrap();
    let length = schema.length(joined).unwrap();
    let parsed = round_trip(&mut schema, length);
    assert_eq!(schema.eval(parsed).unwrap(), Value::Int64(4));
}

#[test]
fn test_pretty_output_parses_to_same_column() {
    let Orders { mut schema, amount, .. } = orders();
    let doubled = schema.add(amount, amount).unwrap();
    let pretty = json::to_json(&schema, doubled, true).unwrap();
    assert!(pretty.contains('\n'));
    let parsed = json::parse_column(&mut schema, &pretty).unwrap();
    assert_eq!(
        json::to_json(&schema, parsed, false).unwrap(),
        json::to_json(&schema, doubled, false).unwrap()
    );
}

#[test]
fn test_declared_type_must_match_rebuilt_node() {
    let Orders { mut schema, .. } = orders();
    let text = r#"{"TypeId":"Int64Column","Expression":{"TypeId":"BinaryExpression","ArgTypeIds":["Int64","Int64"],"Kind":"Add","Left":{"TypeId":"Int64Column","Name":"Order.Amount"},"Right":{"TypeId":"DoubleColumn","Name":"Order.Price"}}}"#;
    let err = json::parse_column(&mut schema, text).unwrap_err();
    assert!(matches!(
        err,
        Error::Json(JsonError::UnexpectedToken { ref path, .. }) if path == "$.Expression.Right"
    ));
}

#[test]
fn test_unknown_operator_name() {
    let Orders { mut schema, .. } = orders();
    let text = r#"{"TypeId":"Int64Column","Expression":{"TypeId":"UnaryExpression","ArgTypeIds":["Int64"],"Kind":"Explode","Operand":{"TypeId":"Int64Column","Name":"Order.Amount"}}}"#;
    let err = json::parse_column(&mut schema, text).unwrap_err();
    assert!(matches!(
        err,
        Error::Json(JsonError::UnexpectedToken { ref path, .. }) if path == "$.Expression.Kind"
    ));
}

#[test]
fn test_registering_defaults_is_idempotent() {
    register_defaults();
    let before = ConverterRegistry::global().len();
    register_defaults();
    assert_eq!(ConverterRegistry::global().len(), before);
    assert!(before >= 13);
}
