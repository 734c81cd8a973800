//! Sub-query elimination.
//!
//! For a simple statement `S` projecting `{a AS x, b + 1 AS y}` into model
//! `M`, an outer expression `M.x + M.y` rewrites to `a + (b + 1)`: every
//! column of `M` is replaced by the source expression `S` projects into it.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::expr::{BinaryKind, UnaryKind};
use crate::model::{ColumnId, ModelId};
use crate::value::{DataType, Value};

use super::expr::{DbColumnExpression, DbExpression, DbExpressionVisitor, DbFunctionKey};
use super::statement::DbSelectStatement;

/// Inlines the projection of one statement.
#[derive(Debug, Clone, PartialEq)]
pub struct SubQueryEliminator {
    model: ModelId,
    /// Projected source expression by target ordinal.
    sources: HashMap<usize, DbExpression>,
}

impl SubQueryEliminator {
    pub fn new(statement: &DbSelectStatement) -> Self {
        Self {
            model: statement.model(),
            sources: statement
                .select()
                .iter()
                .map(|m| (m.target.ordinal, m.source.clone()))
                .collect(),
        }
    }

    /// The model whose columns are substituted.
    pub fn model(&self) -> ModelId {
        self.model
    }

    /// Rewrite `expression`, substituting columns of the statement's model.
    pub fn eliminate(&self, expression: &DbExpression) -> Result<DbExpression> {
        let mut visitor = self;
        expression.accept(&mut visitor)
    }

    fn boxed(&self, expression: &DbExpression) -> Result<Box<DbExpression>> {
        self.eliminate(expression).map(Box::new)
    }
}

impl DbExpressionVisitor for &SubQueryEliminator {
    type Output = Result<DbExpression>;

    fn visit_column(&mut self, column: &DbColumnExpression) -> Self::Output {
        if column.model != self.model {
            return Ok(DbExpression::Column(column.clone()));
        }
        self.sources.get(&column.ordinal).cloned().ok_or_else(|| {
            Error::InvalidOperation(format!(
                "column '{}' is not projected by the inlined select",
                column.name
            ))
        })
    }

    fn visit_constant(&mut self, value: &Value, data_type: DataType) -> Self::Output {
        Ok(DbExpression::Constant {
            value: value.clone(),
            data_type,
        })
    }

    fn visit_param(&mut self, value: &Value, data_type: DataType, source: Option<ColumnId>) -> Self::Output {
        Ok(DbExpression::Param {
            value: value.clone(),
            data_type,
            source,
        })
    }

    fn visit_unary(&mut self, kind: UnaryKind, operand: &DbExpression, data_type: DataType) -> Self::Output {
        Ok(DbExpression::Unary {
            kind,
            operand: self.boxed(operand)?,
            data_type,
        })
    }

    fn visit_binary(
        &mut self,
        kind: BinaryKind,
        left: &DbExpression,
        right: &DbExpression,
        data_type: DataType,
    ) -> Self::Output {
        Ok(DbExpression::Binary {
            kind,
            left: self.boxed(left)?,
            right: self.boxed(right)?,
            data_type,
        })
    }

    fn visit_cast(&mut self, operand: &DbExpression, source_type: DataType, target_type: DataType) -> Self::Output {
        Ok(DbExpression::Cast {
            operand: self.boxed(operand)?,
            source_type,
            target_type,
        })
    }

    fn visit_case(
        &mut self,
        on: Option<&DbExpression>,
        when_then: &[(DbExpression, DbExpression)],
        else_: &DbExpression,
        data_type: DataType,
    ) -> Self::Output {
        Ok(DbExpression::Case {
            on: on.map(|o| self.boxed(o)).transpose()?,
            when_then: when_then
                .iter()
                .map(|(w, t)| Ok((self.eliminate(w)?, self.eliminate(t)?)))
                .collect::<Result<_>>()?,
            else_: self.boxed(else_)?,
            data_type,
        })
    }

    fn visit_function(&mut self, key: DbFunctionKey, params: &[DbExpression], data_type: DataType) -> Self::Output {
        Ok(DbExpression::Function {
            key,
            params: params.iter().map(|p| self.eliminate(p)).collect::<Result<_>>()?,
            data_type,
        })
    }
}
