//! Writing columns and expressions as JSON.

use serde_json::{Map, Number, Value as JsonValue};

use crate::error::{JsonError, Result};
use crate::expr::{ColumnExpression, ExprKind};
use crate::model::{ColumnId, Schema};
use crate::value::{DataType, Value};

use super::converters::{
    AggregateFunctionExpression, BinaryExpression, CaseExpression, CaseOnExpression, CastExpression,
    ConstantExpression, FunctionExpression, ParamExpression, UnaryExpression,
};
use super::registry::{column_type_id, type_id_of};

pub(crate) fn value_to_json(value: &Value) -> Result<JsonValue> {
    Ok(match value {
        Value::Null => JsonValue::Null,
        Value::Boolean(b) => JsonValue::Bool(*b),
        Value::Int64(n) => JsonValue::Number((*n).into()),
        Value::Double(f) => JsonValue::Number(
            Number::from_f64(*f).ok_or_else(|| JsonError::Unrepresentable(format!("double {}", f)))?,
        ),
        Value::String(s) => JsonValue::String(s.clone()),
    })
}

/// A column node: `Name` for model columns, `Expression` for expression
/// columns.
pub(crate) fn write_column(schema: &Schema, id: ColumnId) -> Result<JsonValue> {
    let column = schema.column(id)?;
    let mut object = Map::new();
    object.insert("TypeId".into(), column_type_id(column.data_type()).into());
    match column.column_expression() {
        Some(expression) => {
            object.insert("Expression".into(), write_expression(schema, expression)?);
        }
        None => {
            object.insert("Name".into(), schema.qualified_name(id)?.into());
        }
    }
    Ok(JsonValue::Object(object))
}

fn write_expression(schema: &Schema, expression: &ColumnExpression) -> Result<JsonValue> {
    let data_type = expression.data_type();
    let mut node = NodeWriter::default();
    match expression.kind() {
        ExprKind::Constant(value) => {
            node.header(type_id_of::<ConstantExpression>(), &[data_type]);
            node.put("Value", value_to_json(value)?);
        }
        ExprKind::Param { value, source } => {
            node.header(type_id_of::<ParamExpression>(), &[data_type]);
            node.put("Value", value_to_json(value)?);
            if let Some(source) = source {
                let column = schema.column(*source)?;
                if column.model().is_none() {
                    return Err(JsonError::Unrepresentable(format!(
                        "param source '{}' is not a model column",
                        column.name()
                    ))
                    .into());
                }
                node.put("Source", schema.qualified_name(*source)?.into());
            }
        }
        ExprKind::Unary { kind, operand } => {
            node.header(type_id_of::<UnaryExpression>(), &[data_type]);
            node.put("Kind", kind.name().into());
            node.put("Operand", write_column(schema, *operand)?);
        }
        ExprKind::Binary { kind, left, right } => {
            let operand_type = schema.column(*left)?.data_type();
            node.header(type_id_of::<BinaryExpression>(), &[operand_type, data_type]);
            node.put("Kind", kind.name().into());
            node.put("Left", write_column(schema, *left)?);
            node.put("Right", write_column(schema, *right)?);
        }
        ExprKind::Cast {
            operand,
            source_type,
        } => {
            node.header(type_id_of::<CastExpression>(), &[*source_type, data_type]);
            node.put("Operand", write_column(schema, *operand)?);
        }
        ExprKind::Case { when_then, else_ } => {
            node.header(type_id_of::<CaseExpression>(), &[data_type]);
            node.put("WhenThen", write_pairs(schema, when_then)?);
            node.put("Else", write_column(schema, *else_)?);
        }
        ExprKind::CaseOn {
            on,
            when_then,
            else_,
        } => {
            let on_type = schema.column(*on)?.data_type();
            node.header(type_id_of::<CaseOnExpression>(), &[on_type, data_type]);
            node.put("On", write_column(schema, *on)?);
            node.put("WhenThen", write_pairs(schema, when_then)?);
            node.put("Else", write_column(schema, *else_)?);
        }
        ExprKind::Function { key, params } => {
            node.header(type_id_of::<FunctionExpression>(), &[data_type]);
            node.put("Function", key.name().into());
            let params = params
                .iter()
                .map(|p| write_column(schema, *p))
                .collect::<Result<Vec<_>>>()?;
            node.put("Params", JsonValue::Array(params));
        }
        ExprKind::Aggregate { kind, param } => {
            node.header(type_id_of::<AggregateFunctionExpression>(), &[data_type]);
            node.put("Function", kind.name().into());
            node.put("Param", write_column(schema, *param)?);
        }
    }
    Ok(node.finish())
}

fn write_pairs(schema: &Schema, pairs: &[(ColumnId, ColumnId)]) -> Result<JsonValue> {
    let pairs = pairs
        .iter()
        .map(|&(when, then)| {
            let mut pair = Map::new();
            pair.insert("When".into(), write_column(schema, when)?);
            pair.insert("Then".into(), write_column(schema, then)?);
            Ok(JsonValue::Object(pair))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(JsonValue::Array(pairs))
}

/// Builds one expression object with `TypeId` and `ArgTypeIds` first.
#[derive(Default)]
struct NodeWriter {
    object: Map<String, JsonValue>,
}

impl NodeWriter {
    fn header(&mut self, type_id: &str, args: &[DataType]) {
        self.object.insert("TypeId".into(), type_id.into());
        let args = args.iter().map(|t| JsonValue::from(t.type_id())).collect();
        self.object.insert("ArgTypeIds".into(), JsonValue::Array(args));
    }

    fn put(&mut self, key: &str, value: JsonValue) {
        self.object.insert(key.into(), value);
    }

    fn finish(self) -> JsonValue {
        JsonValue::Object(self.object)
    }
}
