//! Expression constructors.
//!
//! The untyped `*_expr` constructors take column ids, infer the result type
//! and reject ill-typed operands; the JSON parser rebuilds trees through
//! them. The typed methods on [`Schema`] wrap them so that well-typed
//! expressions are the only ones a caller can spell.

use std::marker::PhantomData;

use crate::error::{Error, Result};
use crate::model::{Col, ColumnId, Schema};
use crate::value::{Addable, Bitwise, ColumnType, DataType, Numeric, Value};

use super::{AggregateKind, BinaryKind, ColumnExpression, ExprKind, FunctionKey, UnaryKind};

impl Schema {
    fn type_of(&self, id: ColumnId) -> Result<DataType> {
        Ok(self.column(id)?.data_type())
    }

    fn expect_type(&self, id: ColumnId, expected: DataType, context: &str) -> Result<()> {
        let actual = self.type_of(id)?;
        if actual != expected {
            return Err(Error::TypeMismatch {
                context: context.into(),
                expected,
                actual: actual.to_string(),
            });
        }
        Ok(())
    }

    fn expect_numeric(&self, id: ColumnId, context: &str) -> Result<DataType> {
        let actual = self.type_of(id)?;
        if !actual.is_numeric() {
            return Err(Error::TypeMismatch {
                context: context.into(),
                expected: DataType::Double,
                actual: actual.to_string(),
            });
        }
        Ok(actual)
    }

    fn attach(&mut self, kind: ExprKind, data_type: DataType) -> Result<ColumnId> {
        self.make_column(ColumnExpression::new(kind, data_type))
    }

    // =========================================================================
    // Untyped constructors
    // =========================================================================

    pub fn constant_expr(&mut self, value: Value, data_type: DataType) -> Result<ColumnId> {
        if !value.conforms_to(data_type) {
            return Err(Error::TypeMismatch {
                context: "constant".into(),
                expected: data_type,
                actual: value.data_type().map_or("NULL".into(), |t| t.to_string()),
            });
        }
        self.attach(ExprKind::Constant(value), data_type)
    }

    pub fn param_expr(
        &mut self,
        value: Value,
        data_type: DataType,
        source: Option<ColumnId>,
    ) -> Result<ColumnId> {
        if !value.conforms_to(data_type) {
            return Err(Error::TypeMismatch {
                context: "param".into(),
                expected: data_type,
                actual: value.data_type().map_or("NULL".into(), |t| t.to_string()),
            });
        }
        if let Some(source) = source {
            self.expect_type(source, data_type, "param source")?;
        }
        self.attach(ExprKind::Param { value, source }, data_type)
    }

    pub fn unary_expr(&mut self, kind: UnaryKind, operand: ColumnId) -> Result<ColumnId> {
        let context = format!("unary {}", kind);
        let data_type = match kind {
            UnaryKind::Negate => self.expect_numeric(operand, &context)?,
            UnaryKind::Not => {
                self.expect_type(operand, DataType::Boolean, &context)?;
                DataType::Boolean
            }
            UnaryKind::OnesComplement => {
                self.expect_type(operand, DataType::Int64, &context)?;
                DataType::Int64
            }
        };
        self.attach(ExprKind::Unary { kind, operand }, data_type)
    }

    pub fn binary_expr(&mut self, kind: BinaryKind, left: ColumnId, right: ColumnId) -> Result<ColumnId> {
        let context = format!("binary {}", kind);
        let operand_type = self.type_of(left)?;
        self.expect_type(right, operand_type, &context)?;

        let data_type = match kind {
            BinaryKind::Add => {
                if operand_type == DataType::Boolean {
                    return Err(Error::TypeMismatch {
                        context,
                        expected: DataType::Int64,
                        actual: operand_type.to_string(),
                    });
                }
                operand_type
            }
            BinaryKind::Subtract | BinaryKind::Multiply | BinaryKind::Divide | BinaryKind::Modulo => {
                self.expect_numeric(left, &context)?
            }
            k if k.is_comparison() => DataType::Boolean,
            k if k.is_logical() => {
                self.expect_type(left, DataType::Boolean, &context)?;
                DataType::Boolean
            }
            _ => {
                if !matches!(operand_type, DataType::Int64 | DataType::Boolean) {
                    return Err(Error::TypeMismatch {
                        context,
                        expected: DataType::Int64,
                        actual: operand_type.to_string(),
                    });
                }
                operand_type
            }
        };
        self.attach(ExprKind::Binary { kind, left, right }, data_type)
    }

    pub fn cast_expr(&mut self, operand: ColumnId, target: DataType) -> Result<ColumnId> {
        let source_type = self.type_of(operand)?;
        self.attach(
            ExprKind::Cast {
                operand,
                source_type,
            },
            target,
        )
    }

    pub fn case_expr(&mut self, when_then: Vec<(ColumnId, ColumnId)>, else_: ColumnId) -> Result<ColumnId> {
        let result_type = self.type_of(else_)?;
        for &(when, then) in &when_then {
            self.expect_type(when, DataType::Boolean, "CASE WHEN condition")?;
            self.expect_type(then, result_type, "CASE THEN value")?;
        }
        self.attach(ExprKind::Case { when_then, else_ }, result_type)
    }

    pub fn case_on_expr(
        &mut self,
        on: ColumnId,
        when_then: Vec<(ColumnId, ColumnId)>,
        else_: ColumnId,
    ) -> Result<ColumnId> {
        let on_type = self.type_of(on)?;
        let result_type = self.type_of(else_)?;
        for &(when, then) in &when_then {
            self.expect_type(when, on_type, "CASE ON WHEN value")?;
            self.expect_type(then, result_type, "CASE ON THEN value")?;
        }
        self.attach(
            ExprKind::CaseOn {
                on,
                when_then,
                else_,
            },
            result_type,
        )
    }

    pub fn function_expr(&mut self, key: FunctionKey, params: Vec<ColumnId>) -> Result<ColumnId> {
        let context = format!("function {}", key);
        if params.len() != key.arity() {
            return Err(Error::InvalidOperation(format!(
                "{} expects {} parameter(s), got {}",
                context,
                key.arity(),
                params.len()
            )));
        }
        let data_type = match key {
            FunctionKey::IsNull | FunctionKey::IsNotNull => {
                self.type_of(params[0])?;
                DataType::Boolean
            }
            FunctionKey::IfNull => {
                let t = self.type_of(params[0])?;
                self.expect_type(params[1], t, &context)?;
                t
            }
            FunctionKey::Length => {
                self.expect_type(params[0], DataType::String, &context)?;
                DataType::Int64
            }
            FunctionKey::Upper | FunctionKey::Lower | FunctionKey::Trim => {
                self.expect_type(params[0], DataType::String, &context)?;
                DataType::String
            }
            FunctionKey::Abs => self.expect_numeric(params[0], &context)?,
            FunctionKey::Contains => {
                self.expect_type(params[0], DataType::String, &context)?;
                self.expect_type(params[1], DataType::String, &context)?;
                DataType::Boolean
            }
        };
        self.attach(ExprKind::Function { key, params }, data_type)
    }

    pub fn aggregate_expr(&mut self, kind: AggregateKind, param: ColumnId) -> Result<ColumnId> {
        let context = format!("aggregate {}", kind);
        let param_type = self.type_of(param)?;
        let data_type = match kind {
            AggregateKind::Sum => self.expect_numeric(param, &context)?,
            AggregateKind::Average => {
                self.expect_numeric(param, &context)?;
                DataType::Double
            }
            AggregateKind::Count => DataType::Int64,
            AggregateKind::Min | AggregateKind::Max | AggregateKind::First | AggregateKind::Last => {
                param_type
            }
        };
        self.attach(ExprKind::Aggregate { kind, param }, data_type)
    }

    // =========================================================================
    // Typed constructors
    // =========================================================================

    pub fn constant<T: ColumnType>(&mut self, value: T) -> Result<Col<T>> {
        self.constant_expr(value.into_value(), T::DATA_TYPE).map(Col::new)
    }

    /// A NULL literal of type `T`.
    pub fn null<T: ColumnType>(&mut self) -> Result<Col<T>> {
        self.constant_expr(Value::Null, T::DATA_TYPE).map(Col::new)
    }

    /// A parameter value, optionally recording the column it came from.
    pub fn param<T: ColumnType>(&mut self, value: Option<T>, source: Option<Col<T>>) -> Result<Col<T>> {
        let value = value.map_or(Value::Null, ColumnType::into_value);
        self.param_expr(value, T::DATA_TYPE, source.map(|c| c.id()))
            .map(Col::new)
    }

    fn unary<T: ColumnType, R: ColumnType>(&mut self, kind: UnaryKind, operand: Col<T>) -> Result<Col<R>> {
        self.unary_expr(kind, operand.id()).map(Col::new)
    }

    fn binary<T: ColumnType, R: ColumnType>(
        &mut self,
        kind: BinaryKind,
        left: Col<T>,
        right: Col<T>,
    ) -> Result<Col<R>> {
        self.binary_expr(kind, left.id(), right.id()).map(Col::new)
    }

    pub fn negate<T: Numeric>(&mut self, operand: Col<T>) -> Result<Col<T>> {
        self.unary(UnaryKind::Negate, operand)
    }

    pub fn not(&mut self, operand: Col<bool>) -> Result<Col<bool>> {
        self.unary(UnaryKind::Not, operand)
    }

    pub fn ones_complement(&mut self, operand: Col<i64>) -> Result<Col<i64>> {
        self.unary(UnaryKind::OnesComplement, operand)
    }

    pub fn add<T: Addable>(&mut self, left: Col<T>, right: Col<T>) -> Result<Col<T>> {
        self.binary(BinaryKind::Add, left, right)
    }

    pub fn subtract<T: Numeric>(&mut self, left: Col<T>, right: Col<T>) -> Result<Col<T>> {
        self.binary(BinaryKind::Subtract, left, right)
    }

    pub fn multiply<T: Numeric>(&mut self, left: Col<T>, right: Col<T>) -> Result<Col<T>> {
        self.binary(BinaryKind::Multiply, left, right)
    }

    pub fn divide<T: Numeric>(&mut self, left: Col<T>, right: Col<T>) -> Result<Col<T>> {
        self.binary(BinaryKind::Divide, left, right)
    }

    pub fn modulo<T: Numeric>(&mut self, left: Col<T>, right: Col<T>) -> Result<Col<T>> {
        self.binary(BinaryKind::Modulo, left, right)
    }

    pub fn eq<T: ColumnType>(&mut self, left: Col<T>, right: Col<T>) -> Result<Col<bool>> {
        self.binary(BinaryKind::Equal, left, right)
    }

    pub fn ne<T: ColumnType>(&mut self, left: Col<T>, right: Col<T>) -> Result<Col<bool>> {
        self.binary(BinaryKind::NotEqual, left, right)
    }

    pub fn lt<T: ColumnType>(&mut self, left: Col<T>, right: Col<T>) -> Result<Col<bool>> {
        self.binary(BinaryKind::LessThan, left, right)
    }

    pub fn le<T: ColumnType>(&mut self, left: Col<T>, right: Col<T>) -> Result<Col<bool>> {
        self.binary(BinaryKind::LessThanOrEqual, left, right)
    }

    pub fn gt<T: ColumnType>(&mut self, left: Col<T>, right: Col<T>) -> Result<Col<bool>> {
        self.binary(BinaryKind::GreaterThan, left, right)
    }

    pub fn ge<T: ColumnType>(&mut self, left: Col<T>, right: Col<T>) -> Result<Col<bool>> {
        self.binary(BinaryKind::GreaterThanOrEqual, left, right)
    }

    pub fn and(&mut self, left: Col<bool>, right: Col<bool>) -> Result<Col<bool>> {
        self.binary(BinaryKind::And, left, right)
    }

    pub fn or(&mut self, left: Col<bool>, right: Col<bool>) -> Result<Col<bool>> {
        self.binary(BinaryKind::Or, left, right)
    }

    pub fn bitwise_and<T: Bitwise>(&mut self, left: Col<T>, right: Col<T>) -> Result<Col<T>> {
        self.binary(BinaryKind::BitwiseAnd, left, right)
    }

    pub fn bitwise_or<T: Bitwise>(&mut self, left: Col<T>, right: Col<T>) -> Result<Col<T>> {
        self.binary(BinaryKind::BitwiseOr, left, right)
    }

    pub fn xor<T: Bitwise>(&mut self, left: Col<T>, right: Col<T>) -> Result<Col<T>> {
        self.binary(BinaryKind::ExclusiveOr, left, right)
    }

    pub fn cast<S: ColumnType, T: ColumnType>(&mut self, operand: Col<S>) -> Result<Col<T>> {
        self.cast_expr(operand.id(), T::DATA_TYPE).map(Col::new)
    }

    pub fn is_null<T: ColumnType>(&mut self, operand: Col<T>) -> Result<Col<bool>> {
        self.function_expr(FunctionKey::IsNull, vec![operand.id()])
            .map(Col::new)
    }

    pub fn is_not_null<T: ColumnType>(&mut self, operand: Col<T>) -> Result<Col<bool>> {
        self.function_expr(FunctionKey::IsNotNull, vec![operand.id()])
            .map(Col::new)
    }

    pub fn if_null<T: ColumnType>(&mut self, operand: Col<T>, replacement: Col<T>) -> Result<Col<T>> {
        self.function_expr(FunctionKey::IfNull, vec![operand.id(), replacement.id()])
            .map(Col::new)
    }

    pub fn length(&mut self, operand: Col<String>) -> Result<Col<i64>> {
        self.function_expr(FunctionKey::Length, vec![operand.id()])
            .map(Col::new)
    }

    pub fn upper(&mut self, operand: Col<String>) -> Result<Col<String>> {
        self.function_expr(FunctionKey::Upper, vec![operand.id()])
            .map(Col::new)
    }

    pub fn lower(&mut self, operand: Col<String>) -> Result<Col<String>> {
        self.function_expr(FunctionKey::Lower, vec![operand.id()])
            .map(Col::new)
    }

    pub fn trim(&mut self, operand: Col<String>) -> Result<Col<String>> {
        self.function_expr(FunctionKey::Trim, vec![operand.id()])
            .map(Col::new)
    }

    pub fn abs<T: Numeric>(&mut self, operand: Col<T>) -> Result<Col<T>> {
        self.function_expr(FunctionKey::Abs, vec![operand.id()])
            .map(Col::new)
    }

    pub fn contains(&mut self, text: Col<String>, pattern: Col<String>) -> Result<Col<bool>> {
        self.function_expr(FunctionKey::Contains, vec![text.id(), pattern.id()])
            .map(Col::new)
    }

    pub fn sum<T: Numeric>(&mut self, param: Col<T>) -> Result<Col<T>> {
        self.aggregate_expr(AggregateKind::Sum, param.id()).map(Col::new)
    }

    pub fn count<T: ColumnType>(&mut self, param: Col<T>) -> Result<Col<i64>> {
        self.aggregate_expr(AggregateKind::Count, param.id())
            .map(Col::new)
    }

    pub fn average<T: Numeric>(&mut self, param: Col<T>) -> Result<Col<f64>> {
        self.aggregate_expr(AggregateKind::Average, param.id())
            .map(Col::new)
    }

    pub fn min<T: ColumnType>(&mut self, param: Col<T>) -> Result<Col<T>> {
        self.aggregate_expr(AggregateKind::Min, param.id()).map(Col::new)
    }

    pub fn max<T: ColumnType>(&mut self, param: Col<T>) -> Result<Col<T>> {
        self.aggregate_expr(AggregateKind::Max, param.id()).map(Col::new)
    }

    pub fn first<T: ColumnType>(&mut self, param: Col<T>) -> Result<Col<T>> {
        self.aggregate_expr(AggregateKind::First, param.id())
            .map(Col::new)
    }

    pub fn last<T: ColumnType>(&mut self, param: Col<T>) -> Result<Col<T>> {
        self.aggregate_expr(AggregateKind::Last, param.id()).map(Col::new)
    }

    /// Start a `CASE WHEN ... THEN ... ELSE ... END` expression.
    pub fn case<R: ColumnType>(&self) -> CaseBuilder<R> {
        CaseBuilder {
            when_then: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Start a `CASE on WHEN ... THEN ... ELSE ... END` expression.
    pub fn case_on<W: ColumnType, R: ColumnType>(&self, on: Col<W>) -> CaseOnBuilder<W, R> {
        CaseOnBuilder {
            on,
            when_then: Vec::new(),
            _marker: PhantomData,
        }
    }
}

// =============================================================================
// Case builders
// =============================================================================

/// Open `CASE` expression. Clauses are appended with [`when`](Self::when);
/// [`otherwise`](Self::otherwise) supplies the ELSE value, consumes the
/// builder and attaches the finished expression, so no clause can follow it.
#[must_use = "a CASE expression is only attached by `otherwise`"]
pub struct CaseBuilder<R> {
    when_then: Vec<(ColumnId, ColumnId)>,
    _marker: PhantomData<fn() -> R>,
}

impl<R: ColumnType> CaseBuilder<R> {
    pub fn when(mut self, condition: Col<bool>, value: Col<R>) -> Self {
        self.when_then.push((condition.id(), value.id()));
        self
    }

    pub fn otherwise(self, schema: &mut Schema, value: Col<R>) -> Result<Col<R>> {
        schema.case_expr(self.when_then, value.id()).map(Col::new)
    }
}

/// Open `CASE on` expression, dispatching by equality with the `on` value.
#[must_use = "a CASE expression is only attached by `otherwise`"]
pub struct CaseOnBuilder<W, R> {
    on: Col<W>,
    when_then: Vec<(ColumnId, ColumnId)>,
    _marker: PhantomData<fn() -> R>,
}

impl<W: ColumnType, R: ColumnType> CaseOnBuilder<W, R> {
    pub fn when(mut self, value: Col<W>, result: Col<R>) -> Self {
        self.when_then.push((value.id(), result.id()));
        self
    }

    pub fn otherwise(self, schema: &mut Schema, value: Col<R>) -> Result<Col<R>> {
        schema
            .case_on_expr(self.on.id(), self.when_then, value.id())
            .map(Col::new)
    }
}
