//! SQL lowering.

use crate::error::{Error, Result};
use crate::model::{ColumnId, Schema};
use crate::sql::{DbColumnExpression, DbExpression, DbFunctionKey};

use super::ExprKind;

impl Schema {
    /// Lower a column to a portable SQL expression.
    ///
    /// A model column becomes a column reference; an expression column is
    /// lowered node by node.
    pub fn db_expression(&self, column: impl Into<ColumnId>) -> Result<DbExpression> {
        let id = column.into();
        let column = self.column(id)?;
        let Some(expression) = column.column_expression() else {
            let (Some(model), Some(ordinal)) = (column.model(), column.ordinal()) else {
                return Err(Error::InvalidOperation(format!(
                    "column '{}' has neither a model nor an expression",
                    column.name()
                )));
            };
            return Ok(DbExpression::Column(DbColumnExpression {
                model,
                column: id,
                ordinal,
                name: column.name().to_string(),
                data_type: column.data_type(),
            }));
        };

        let data_type = expression.data_type();
        let lowered = match expression.kind() {
            ExprKind::Constant(value) => DbExpression::Constant {
                value: value.clone(),
                data_type,
            },
            ExprKind::Param { value, source } => DbExpression::Param {
                value: value.clone(),
                data_type,
                source: *source,
            },
            ExprKind::Unary { kind, operand } => DbExpression::Unary {
                kind: *kind,
                operand: Box::new(self.db_expression(*operand)?),
                data_type,
            },
            ExprKind::Binary { kind, left, right } => DbExpression::Binary {
                kind: *kind,
                left: Box::new(self.db_expression(*left)?),
                right: Box::new(self.db_expression(*right)?),
                data_type,
            },
            ExprKind::Cast {
                operand,
                source_type,
            } => DbExpression::Cast {
                operand: Box::new(self.db_expression(*operand)?),
                source_type: *source_type,
                target_type: data_type,
            },
            ExprKind::Case { when_then, else_ } => DbExpression::Case {
                on: None,
                when_then: self.lower_pairs(when_then)?,
                else_: Box::new(self.db_expression(*else_)?),
                data_type,
            },
            ExprKind::CaseOn {
                on,
                when_then,
                else_,
            } => DbExpression::Case {
                on: Some(Box::new(self.db_expression(*on)?)),
                when_then: self.lower_pairs(when_then)?,
                else_: Box::new(self.db_expression(*else_)?),
                data_type,
            },
            ExprKind::Function { key, params } => DbExpression::Function {
                key: DbFunctionKey::Scalar(*key),
                params: params
                    .iter()
                    .map(|p| self.db_expression(*p))
                    .collect::<Result<_>>()?,
                data_type,
            },
            ExprKind::Aggregate { kind, param } => DbExpression::Function {
                key: DbFunctionKey::Aggregate(*kind),
                params: vec![self.db_expression(*param)?],
                data_type,
            },
        };
        Ok(lowered)
    }

    fn lower_pairs(&self, pairs: &[(ColumnId, ColumnId)]) -> Result<Vec<(DbExpression, DbExpression)>> {
        pairs
            .iter()
            .map(|(w, t)| Ok((self.db_expression(*w)?, self.db_expression(*t)?)))
            .collect()
    }
}
