//! Built-in expression converters, one per node kind.
//!
//! Each converter's type name is its persisted `TypeId`.

use crate::error::{JsonError, Result};
use crate::expr::{AggregateKind, BinaryKind, FunctionKey, UnaryKind};
use crate::model::ColumnId;

use super::reader::{unexpected, Node, Reader};
use super::registry::ExpressionConverter;

/// `ArgTypeIds: [T]`, payload `Value`.
pub struct ConstantExpression;

/// `ArgTypeIds: [T]`, payload `Value` and optional `Source`.
pub struct ParamExpression;

/// `ArgTypeIds: [T]`, payload `Kind` and `Operand`.
pub struct UnaryExpression;

/// `ArgTypeIds: [T, TResult]`, payload `Kind`, `Left` and `Right`.
pub struct BinaryExpression;

/// `ArgTypeIds: [TSource, TTarget]`, payload `Operand`.
pub struct CastExpression;

/// `ArgTypeIds: [TResult]`, payload `WhenThen` and `Else`.
pub struct CaseExpression;

/// `ArgTypeIds: [TWhen, TResult]`, payload `On`, `WhenThen` and `Else`.
pub struct CaseOnExpression;

/// `ArgTypeIds: [TResult]`, payload `Function` and `Params`.
pub struct FunctionExpression;

/// `ArgTypeIds: [TResult]`, payload `Function` and `Param`.
pub struct AggregateFunctionExpression;

fn parse_name<T>(node: &Node<'_>, field: &str, from_name: fn(&str) -> Option<T>, what: &str) -> Result<T> {
    let name = node.str_field(field)?;
    from_name(name).ok_or_else(|| unexpected(&node.path.field(field), what, format!("\"{}\"", name)))
}

impl ExpressionConverter for ConstantExpression {
    fn arity(&self) -> usize {
        1
    }

    fn read(&self, reader: &mut Reader<'_>, node: &Node<'_>) -> Result<ColumnId> {
        let data_type = node.arg(0);
        let value = node.value("Value", data_type)?;
        let id = reader.schema().constant_expr(value, data_type)?;
        node.finish(reader, id, data_type)
    }
}

impl ExpressionConverter for ParamExpression {
    fn arity(&self) -> usize {
        1
    }

    fn read(&self, reader: &mut Reader<'_>, node: &Node<'_>) -> Result<ColumnId> {
        let data_type = node.arg(0);
        let value = node.value("Value", data_type)?;
        let source = match node.object.get("Source") {
            None => None,
            Some(_) => {
                let name = node.str_field("Source")?;
                let source = reader.schema().resolve_qualified(name).map_err(|_| {
                    JsonError::UnknownColumnName {
                        name: name.into(),
                        path: node.path.field("Source").to_string(),
                    }
                })?;
                Some(source)
            }
        };
        let id = reader.schema().param_expr(value, data_type, source)?;
        node.finish(reader, id, data_type)
    }
}

impl ExpressionConverter for UnaryExpression {
    fn arity(&self) -> usize {
        1
    }

    fn read(&self, reader: &mut Reader<'_>, node: &Node<'_>) -> Result<ColumnId> {
        let data_type = node.arg(0);
        let kind = parse_name(node, "Kind", UnaryKind::from_name, "unary operator")?;
        let operand = node.typed_column(reader, "Operand", data_type)?;
        let id = reader.schema().unary_expr(kind, operand)?;
        node.finish(reader, id, data_type)
    }
}

impl ExpressionConverter for BinaryExpression {
    fn arity(&self) -> usize {
        2
    }

    fn read(&self, reader: &mut Reader<'_>, node: &Node<'_>) -> Result<ColumnId> {
        let (operand_type, result_type) = (node.arg(0), node.arg(1));
        let kind = parse_name(node, "Kind", BinaryKind::from_name, "binary operator")?;
        let left = node.typed_column(reader, "Left", operand_type)?;
        let right = node.typed_column(reader, "Right", operand_type)?;
        let id = reader.schema().binary_expr(kind, left, right)?;
        node.finish(reader, id, result_type)
    }
}

impl ExpressionConverter for CastExpression {
    fn arity(&self) -> usize {
        2
    }

    fn read(&self, reader: &mut Reader<'_>, node: &Node<'_>) -> Result<ColumnId> {
        let (source_type, target_type) = (node.arg(0), node.arg(1));
        let operand = node.typed_column(reader, "Operand", source_type)?;
        let id = reader.schema().cast_expr(operand, target_type)?;
        node.finish(reader, id, target_type)
    }
}

impl ExpressionConverter for CaseExpression {
    fn arity(&self) -> usize {
        1
    }

    fn read(&self, reader: &mut Reader<'_>, node: &Node<'_>) -> Result<ColumnId> {
        let result_type = node.arg(0);
        let when_then = node.when_then(reader)?;
        let else_ = node.typed_column(reader, "Else", result_type)?;
        let id = reader.schema().case_expr(when_then, else_)?;
        node.finish(reader, id, result_type)
    }
}

impl ExpressionConverter for CaseOnExpression {
    fn arity(&self) -> usize {
        2
    }

    fn read(&self, reader: &mut Reader<'_>, node: &Node<'_>) -> Result<ColumnId> {
        let (when_type, result_type) = (node.arg(0), node.arg(1));
        let on = node.typed_column(reader, "On", when_type)?;
        let when_then = node.when_then(reader)?;
        let else_ = node.typed_column(reader, "Else", result_type)?;
        let id = reader.schema().case_on_expr(on, when_then, else_)?;
        node.finish(reader, id, result_type)
    }
}

impl ExpressionConverter for FunctionExpression {
    fn arity(&self) -> usize {
        1
    }

    fn read(&self, reader: &mut Reader<'_>, node: &Node<'_>) -> Result<ColumnId> {
        let result_type = node.arg(0);
        let key = parse_name(node, "Function", FunctionKey::from_name, "function name")?;
        let path = node.path.field("Params");
        let params = node
            .array_field("Params")?
            .iter()
            .enumerate()
            .map(|(i, param)| reader.column(param, &path.index(i)))
            .collect::<Result<Vec<_>>>()?;
        let id = reader.schema().function_expr(key, params)?;
        node.finish(reader, id, result_type)
    }
}

impl ExpressionConverter for AggregateFunctionExpression {
    fn arity(&self) -> usize {
        1
    }

    fn read(&self, reader: &mut Reader<'_>, node: &Node<'_>) -> Result<ColumnId> {
        let result_type = node.arg(0);
        let kind = parse_name(node, "Function", AggregateKind::from_name, "aggregate function")?;
        let param = node.column(reader, "Param")?;
        let id = reader.schema().aggregate_expr(kind, param)?;
        node.finish(reader, id, result_type)
    }
}
