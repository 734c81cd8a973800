//! In-memory evaluation.
//!
//! An [`Evaluator`] walks an expression column's operands recursively. Model
//! columns read the stored slot of the current row, or of the nearest
//! ancestor row whose model owns the column.

use crate::data::{DataSet, RowId};
use crate::error::{Error, Result};
use crate::model::{ColumnId, Schema};
use crate::value::{DataType, Value};

use super::aggregate::compare;
use super::{BinaryKind, ColumnExpression, ExprKind, FunctionKey, UnaryKind};

/// The row an evaluation is anchored to.
#[derive(Clone, Copy)]
pub(crate) struct RowScope<'a> {
    pub data: &'a DataSet,
    pub row: RowId,
}

#[derive(Clone, Copy)]
pub(crate) struct Evaluator<'a> {
    schema: &'a Schema,
    scope: Option<RowScope<'a>>,
}

impl<'a> Evaluator<'a> {
    /// Evaluate without a row: only row-independent expressions succeed.
    pub(crate) fn detached(schema: &'a Schema) -> Self {
        Self { schema, scope: None }
    }

    pub(crate) fn in_row(data: &'a DataSet, row: RowId) -> Self {
        Self {
            schema: data.schema(),
            scope: Some(RowScope { data, row }),
        }
    }

    pub(crate) fn schema(&self) -> &'a Schema {
        self.schema
    }

    pub(crate) fn scope(&self) -> Option<RowScope<'a>> {
        self.scope
    }

    /// The same evaluator re-anchored to another row of the same data set.
    pub(crate) fn with_row(&self, row: RowId) -> Self {
        Self {
            schema: self.schema,
            scope: self.scope.map(|s| RowScope { data: s.data, row }),
        }
    }

    /// Value of `id` in the current scope.
    pub(crate) fn column(&self, id: ColumnId) -> Result<Value> {
        let column = self.schema.column(id)?;
        if let Some(expression) = column.column_expression() {
            return self.expression(id, expression);
        }
        let (Some(model), Some(ordinal)) = (column.model(), column.ordinal()) else {
            return Err(Error::InvalidOperation(format!(
                "column '{}' has neither a model nor an expression",
                column.name()
            )));
        };
        let Some(scope) = self.scope else {
            return Err(Error::InvalidOperation(format!(
                "column '{}' can only be read from a data row",
                self.schema.qualified_name(id)?
            )));
        };
        match scope.data.ancestor_row(scope.row, model)? {
            Some(row) => Ok(scope.data.stored(row, ordinal)?.clone()),
            None => Err(Error::RowModelMismatch {
                column: self.schema.qualified_name(id)?,
                model: self.schema.model(scope.data.row_model(scope.row)?)?.name().to_string(),
            }),
        }
    }

    fn expression(&self, owner: ColumnId, expression: &ColumnExpression) -> Result<Value> {
        match expression.kind() {
            ExprKind::Constant(value) => Ok(value.clone()),
            ExprKind::Param { value, .. } => Ok(value.clone()),
            ExprKind::Unary { kind, operand } => unary(*kind, self.column(*operand)?),
            ExprKind::Binary { kind, left, right } => self.binary(*kind, *left, *right),
            ExprKind::Cast { operand, .. } => self.column(*operand)?.cast(expression.data_type()),
            ExprKind::Case { when_then, else_ } => {
                for (when, then) in when_then {
                    // A null condition does not match.
                    if self.column(*when)?.as_bool() == Some(true) {
                        return self.column(*then);
                    }
                }
                self.column(*else_)
            }
            ExprKind::CaseOn {
                on,
                when_then,
                else_,
            } => {
                let on = self.column(*on)?;
                if !on.is_null() {
                    for (when, then) in when_then {
                        if self.column(*when)? == on {
                            return self.column(*then);
                        }
                    }
                }
                self.column(*else_)
            }
            ExprKind::Function { key, params } => {
                let args = params
                    .iter()
                    .map(|p| self.column(*p))
                    .collect::<Result<Vec<_>>>()?;
                function(*key, args)
            }
            ExprKind::Aggregate { kind, param } => self.aggregate(owner, *kind, *param),
        }
    }

    fn binary(&self, kind: BinaryKind, left: ColumnId, right: ColumnId) -> Result<Value> {
        let left = self.column(left)?;
        if kind.is_logical() {
            // Three-valued logic: a decided left side short-circuits.
            match (kind, left.as_bool()) {
                (BinaryKind::And, Some(false)) => return Ok(Value::Boolean(false)),
                (BinaryKind::Or, Some(true)) => return Ok(Value::Boolean(true)),
                _ => {}
            }
            let right = self.column(right)?.as_bool();
            return Ok(match (kind, left.as_bool(), right) {
                (BinaryKind::And, _, Some(false)) => Value::Boolean(false),
                (BinaryKind::Or, _, Some(true)) => Value::Boolean(true),
                (_, Some(l), Some(r)) => Value::Boolean(if kind == BinaryKind::And { l && r } else { l || r }),
                _ => Value::Null,
            });
        }

        let right = self.column(right)?;
        if left.is_null() || right.is_null() {
            return Ok(Value::Null);
        }
        if kind.is_comparison() {
            let holds = match kind {
                BinaryKind::Equal => compare(&left, &right)?.is_eq(),
                BinaryKind::NotEqual => compare(&left, &right)?.is_ne(),
                BinaryKind::LessThan => compare(&left, &right)?.is_lt(),
                BinaryKind::LessThanOrEqual => compare(&left, &right)?.is_le(),
                BinaryKind::GreaterThan => compare(&left, &right)?.is_gt(),
                _ => compare(&left, &right)?.is_ge(),
            };
            return Ok(Value::Boolean(holds));
        }
        arithmetic(kind, left, right)
    }
}

fn overflow(kind: impl std::fmt::Display) -> Error {
    Error::InvalidOperation(format!("integer overflow in {}", kind))
}

fn unary(kind: UnaryKind, value: Value) -> Result<Value> {
    Ok(match (kind, value) {
        (_, Value::Null) => Value::Null,
        (UnaryKind::Negate, Value::Int64(n)) => Value::Int64(n.checked_neg().ok_or_else(|| overflow(kind))?),
        (UnaryKind::Negate, Value::Double(f)) => Value::Double(-f),
        (UnaryKind::Not, Value::Boolean(b)) => Value::Boolean(!b),
        (UnaryKind::OnesComplement, Value::Int64(n)) => Value::Int64(!n),
        (UnaryKind::OnesComplement, Value::Boolean(b)) => Value::Boolean(!b),
        (kind, value) => {
            return Err(Error::InvalidOperation(format!(
                "cannot apply {} to '{}'",
                kind, value
            )))
        }
    })
}

fn arithmetic(kind: BinaryKind, left: Value, right: Value) -> Result<Value> {
    let value = match (left, right) {
        (Value::Int64(l), Value::Int64(r)) => {
            let result = match kind {
                BinaryKind::Add => l.checked_add(r),
                BinaryKind::Subtract => l.checked_sub(r),
                BinaryKind::Multiply => l.checked_mul(r),
                BinaryKind::Divide | BinaryKind::Modulo if r == 0 => return Err(Error::DivideByZero),
                BinaryKind::Divide => l.checked_div(r),
                BinaryKind::Modulo => l.checked_rem(r),
                BinaryKind::BitwiseAnd => Some(l & r),
                BinaryKind::BitwiseOr => Some(l | r),
                BinaryKind::ExclusiveOr => Some(l ^ r),
                _ => None,
            };
            Value::Int64(result.ok_or_else(|| overflow(kind))?)
        }
        (Value::Double(l), Value::Double(r)) => Value::Double(match kind {
            BinaryKind::Add => l + r,
            BinaryKind::Subtract => l - r,
            BinaryKind::Multiply => l * r,
            BinaryKind::Divide => l / r,
            BinaryKind::Modulo => l % r,
            _ => return Err(unsupported(kind, DataType::Double)),
        }),
        (Value::Boolean(l), Value::Boolean(r)) => Value::Boolean(match kind {
            BinaryKind::BitwiseAnd => l & r,
            BinaryKind::BitwiseOr => l | r,
            BinaryKind::ExclusiveOr => l ^ r,
            _ => return Err(unsupported(kind, DataType::Boolean)),
        }),
        (Value::String(l), Value::String(r)) if kind == BinaryKind::Add => Value::String(l + &r),
        (l, r) => {
            return Err(Error::InvalidOperation(format!(
                "cannot apply {} to '{}' and '{}'",
                kind, l, r
            )))
        }
    };
    Ok(value)
}

fn unsupported(kind: BinaryKind, data_type: DataType) -> Error {
    Error::InvalidOperation(format!("{} is not defined for {}", kind, data_type))
}

fn function(key: FunctionKey, mut args: Vec<Value>) -> Result<Value> {
    if args.len() != key.arity() {
        return Err(Error::InvalidOperation(format!(
            "{} expects {} argument(s), found {}",
            key,
            key.arity(),
            args.len()
        )));
    }
    match key {
        FunctionKey::IsNull => return Ok(Value::Boolean(args[0].is_null())),
        FunctionKey::IsNotNull => return Ok(Value::Boolean(!args[0].is_null())),
        FunctionKey::IfNull => {
            let replacement = args.pop().unwrap_or_default();
            let value = args.pop().unwrap_or_default();
            return Ok(if value.is_null() { replacement } else { value });
        }
        _ => {}
    }
    if args.iter().any(Value::is_null) {
        return Ok(Value::Null);
    }
    let value = match (key, args.as_slice()) {
        (FunctionKey::Length, [Value::String(s)]) => Value::Int64(s.chars().count() as i64),
        (FunctionKey::Upper, [Value::String(s)]) => Value::String(s.to_uppercase()),
        (FunctionKey::Lower, [Value::String(s)]) => Value::String(s.to_lowercase()),
        (FunctionKey::Trim, [Value::String(s)]) => Value::String(s.trim().to_string()),
        (FunctionKey::Abs, [Value::Int64(n)]) => {
            Value::Int64(n.checked_abs().ok_or_else(|| overflow(key))?)
        }
        (FunctionKey::Abs, [Value::Double(f)]) => Value::Double(f.abs()),
        (FunctionKey::Contains, [Value::String(s), Value::String(p)]) => Value::Boolean(s.contains(p.as_str())),
        _ => {
            return Err(Error::InvalidOperation(format!(
                "{} is not defined for the given arguments",
                key
            )))
        }
    };
    Ok(value)
}

impl Schema {
    /// Evaluate a column without a data row.
    ///
    /// Constants, params and expressions over them succeed; reading a model
    /// column or an aggregate is an `InvalidOperation`.
    pub fn eval(&self, column: impl Into<ColumnId>) -> Result<Value> {
        Evaluator::detached(self).column(column.into())
    }
}
