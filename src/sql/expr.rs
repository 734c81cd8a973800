//! Expression AST - the portable SQL expression tree.
//!
//! A [`DbExpression`] is what a column expression lowers to. It carries
//! enough type information for a dialect renderer to produce literal SQL;
//! rendering itself happens outside this crate.

use crate::expr::{AggregateKind, BinaryKind, FunctionKey, UnaryKind};
use crate::model::{ColumnId, ModelId};
use crate::value::{DataType, Value};

// =============================================================================
// Expression AST
// =============================================================================

/// A reference to a model column.
#[derive(Debug, Clone, PartialEq)]
pub struct DbColumnExpression {
    pub model: ModelId,
    pub column: ColumnId,
    pub ordinal: usize,
    pub name: String,
    pub data_type: DataType,
}

/// Scalar and aggregate SQL functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DbFunctionKey {
    Scalar(FunctionKey),
    Aggregate(AggregateKind),
}

impl DbFunctionKey {
    pub fn is_aggregate(&self) -> bool {
        matches!(self, DbFunctionKey::Aggregate(_))
    }
}

/// A portable SQL expression.
///
/// Every variant must be handled in [`DbExpression::accept`] - the compiler
/// enforces this.
#[derive(Debug, Clone, PartialEq)]
pub enum DbExpression {
    /// Column reference.
    Column(DbColumnExpression),

    /// Literal value.
    Constant { value: Value, data_type: DataType },

    /// Bound parameter, optionally remembering the column it was taken from.
    Param {
        value: Value,
        data_type: DataType,
        source: Option<ColumnId>,
    },

    /// Unary operation: op operand
    Unary {
        kind: UnaryKind,
        operand: Box<DbExpression>,
        data_type: DataType,
    },

    /// Binary operation: left op right
    Binary {
        kind: BinaryKind,
        left: Box<DbExpression>,
        right: Box<DbExpression>,
        data_type: DataType,
    },

    /// CAST(operand AS target)
    Cast {
        operand: Box<DbExpression>,
        source_type: DataType,
        target_type: DataType,
    },

    /// CASE [on] WHEN... THEN... ELSE... END
    Case {
        on: Option<Box<DbExpression>>,
        when_then: Vec<(DbExpression, DbExpression)>,
        else_: Box<DbExpression>,
        data_type: DataType,
    },

    /// Function call: key(params...)
    Function {
        key: DbFunctionKey,
        params: Vec<DbExpression>,
        data_type: DataType,
    },
}

impl DbExpression {
    /// Result type of the expression.
    pub fn data_type(&self) -> DataType {
        match self {
            DbExpression::Column(c) => c.data_type,
            DbExpression::Constant { data_type, .. }
            | DbExpression::Param { data_type, .. }
            | DbExpression::Unary { data_type, .. }
            | DbExpression::Binary { data_type, .. }
            | DbExpression::Case { data_type, .. }
            | DbExpression::Function { data_type, .. } => *data_type,
            DbExpression::Cast { target_type, .. } => *target_type,
        }
    }

    /// Double-dispatch into `visitor`.
    pub fn accept<V: DbExpressionVisitor>(&self, visitor: &mut V) -> V::Output {
        match self {
            DbExpression::Column(c) => visitor.visit_column(c),
            DbExpression::Constant { value, data_type } => visitor.visit_constant(value, *data_type),
            DbExpression::Param {
                value,
                data_type,
                source,
            } => visitor.visit_param(value, *data_type, *source),
            DbExpression::Unary {
                kind,
                operand,
                data_type,
            } => visitor.visit_unary(*kind, operand, *data_type),
            DbExpression::Binary {
                kind,
                left,
                right,
                data_type,
            } => visitor.visit_binary(*kind, left, right, *data_type),
            DbExpression::Cast {
                operand,
                source_type,
                target_type,
            } => visitor.visit_cast(operand, *source_type, *target_type),
            DbExpression::Case {
                on,
                when_then,
                else_,
                data_type,
            } => visitor.visit_case(on.as_deref(), when_then, else_, *data_type),
            DbExpression::Function {
                key,
                params,
                data_type,
            } => visitor.visit_function(*key, params, *data_type),
        }
    }

    /// True when an aggregate function appears anywhere in the tree.
    pub fn contains_aggregate(&self) -> bool {
        match self {
            DbExpression::Column(_) | DbExpression::Constant { .. } | DbExpression::Param { .. } => false,
            DbExpression::Unary { operand, .. } | DbExpression::Cast { operand, .. } => operand.contains_aggregate(),
            DbExpression::Binary { left, right, .. } => left.contains_aggregate() || right.contains_aggregate(),
            DbExpression::Case {
                on, when_then, else_, ..
            } => {
                on.as_ref().is_some_and(|o| o.contains_aggregate())
                    || when_then
                        .iter()
                        .any(|(w, t)| w.contains_aggregate() || t.contains_aggregate())
                    || else_.contains_aggregate()
            }
            DbExpression::Function { key, params, .. } => {
                key.is_aggregate() || params.iter().any(DbExpression::contains_aggregate)
            }
        }
    }

    /// Models referenced by column nodes, in first-seen order.
    pub fn referenced_models(&self) -> Vec<ModelId> {
        let mut models = Vec::new();
        self.collect_models(&mut models);
        models
    }

    fn collect_models(&self, models: &mut Vec<ModelId>) {
        match self {
            DbExpression::Column(c) => {
                if !models.contains(&c.model) {
                    models.push(c.model);
                }
            }
            DbExpression::Constant { .. } | DbExpression::Param { .. } => {}
            DbExpression::Unary { operand, .. } | DbExpression::Cast { operand, .. } => operand.collect_models(models),
            DbExpression::Binary { left, right, .. } => {
                left.collect_models(models);
                right.collect_models(models);
            }
            DbExpression::Case {
                on, when_then, else_, ..
            } => {
                if let Some(on) = on {
                    on.collect_models(models);
                }
                for (w, t) in when_then {
                    w.collect_models(models);
                    t.collect_models(models);
                }
                else_.collect_models(models);
            }
            DbExpression::Function { params, .. } => {
                for p in params {
                    p.collect_models(models);
                }
            }
        }
    }
}

impl From<DbColumnExpression> for DbExpression {
    fn from(column: DbColumnExpression) -> Self {
        DbExpression::Column(column)
    }
}

// =============================================================================
// Visitor
// =============================================================================

/// Double-dispatch over [`DbExpression`] nodes.
pub trait DbExpressionVisitor {
    type Output;

    fn visit_column(&mut self, column: &DbColumnExpression) -> Self::Output;

    fn visit_constant(&mut self, value: &Value, data_type: DataType) -> Self::Output;

    fn visit_param(&mut self, value: &Value, data_type: DataType, source: Option<ColumnId>) -> Self::Output;

    fn visit_unary(&mut self, kind: UnaryKind, operand: &DbExpression, data_type: DataType) -> Self::Output;

    fn visit_binary(
        &mut self,
        kind: BinaryKind,
        left: &DbExpression,
        right: &DbExpression,
        data_type: DataType,
    ) -> Self::Output;

    fn visit_cast(&mut self, operand: &DbExpression, source_type: DataType, target_type: DataType) -> Self::Output;

    fn visit_case(
        &mut self,
        on: Option<&DbExpression>,
        when_then: &[(DbExpression, DbExpression)],
        else_: &DbExpression,
        data_type: DataType,
    ) -> Self::Output;

    fn visit_function(&mut self, key: DbFunctionKey, params: &[DbExpression], data_type: DataType) -> Self::Output;
}

// =============================================================================
// Tests
// =============================================================================
