//! Fluent construction of statements against a schema.
//!
//! ```text
//! SelectBuilder::new(&schema, summary)
//!     .from(order)?
//!     .left_join(line, on)?
//!     .select(order_id, summary_id)?
//!     .where_(is_open)?
//!     .build()?
//! ```

use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{Col, Column, ColumnId, ModelId, Schema};
use crate::value::DataType;

use super::expr::DbExpression;
use super::from::{DbFromClause, DbJoinClause, DbJoinKind, DbTableClause};
use super::statement::{
    ColumnMapping, DbQueryStatement, DbSelectStatement, DbSortExpression, DbUnionStatement, SortDirection,
    UnionKind,
};

/// Builds a [`DbSelectStatement`] producing rows of one model.
#[derive(Debug, Clone)]
#[must_use = "builders have no effect until built"]
pub struct SelectBuilder<'s> {
    schema: &'s Schema,
    model: ModelId,
    select: Vec<ColumnMapping>,
    from: Option<DbFromClause>,
    where_: Option<DbExpression>,
    group_by: Vec<DbExpression>,
    having: Option<DbExpression>,
    order_by: Vec<DbSortExpression>,
    offset: Option<u64>,
    fetch: Option<u64>,
}

impl<'s> SelectBuilder<'s> {
    /// Start a statement whose rows belong to `model`.
    pub fn new(schema: &'s Schema, model: ModelId) -> Self {
        Self {
            schema,
            model,
            select: Vec::new(),
            from: None,
            where_: None,
            group_by: Vec::new(),
            having: None,
            order_by: Vec::new(),
            offset: None,
            fetch: None,
        }
    }

    /// Read from the table of `model`. Replaces any previous FROM clause.
    pub fn from(mut self, model: ModelId) -> Result<Self> {
        self.from = Some(DbTableClause::for_model(self.schema, model)?.into());
        Ok(self)
    }

    /// Read from a nested statement.
    pub fn from_query(mut self, query: impl Into<DbQueryStatement>) -> Self {
        self.from = Some(DbFromClause::sub_query(query.into()));
        self
    }

    pub fn inner_join(self, model: ModelId, on: Col<bool>) -> Result<Self> {
        self.join(DbJoinKind::Inner, model, Some(on))
    }

    pub fn left_join(self, model: ModelId, on: Col<bool>) -> Result<Self> {
        self.join(DbJoinKind::Left, model, Some(on))
    }

    pub fn right_join(self, model: ModelId, on: Col<bool>) -> Result<Self> {
        self.join(DbJoinKind::Right, model, Some(on))
    }

    pub fn cross_join(self, model: ModelId) -> Result<Self> {
        self.join(DbJoinKind::Cross, model, None)
    }

    fn join(mut self, kind: DbJoinKind, model: ModelId, on: Option<Col<bool>>) -> Result<Self> {
        let left = self
            .from
            .take()
            .ok_or_else(|| Error::InvalidOperation("join requires a FROM clause".into()))?;
        let right = DbTableClause::for_model(self.schema, model)?.into();
        let on = on.map(|c| self.schema.db_expression(c)).transpose()?;
        self.from = Some(DbFromClause::Join(Box::new(DbJoinClause { kind, left, right, on })));
        Ok(self)
    }

    /// Project `source` into the target model column `target`.
    pub fn select(mut self, source: impl Into<ColumnId>, target: impl Into<ColumnId>) -> Result<Self> {
        let target = target.into();
        self.schema.ensure_in_model(target, self.model)?;
        self.select
            .push(ColumnMapping::from_columns(self.schema, source, target)?);
        Ok(self)
    }

    /// Project every non-system column of the target model from the column
    /// of `source` with the same identity (or, failing that, the same name)
    /// and type. Target columns already projected are skipped.
    pub fn auto_select(mut self, source: ModelId) -> Result<Self> {
        let schema = self.schema;
        let source_columns = schema.model(source)?.columns();
        let mut matched = 0usize;
        for &target in schema.model(self.model)?.columns() {
            let target_column = schema.column(target)?;
            if target_column.is_system() || self.select.iter().any(|m| m.target.column == target) {
                continue;
            }
            let mut candidates = source_columns.iter().copied().filter_map(|c| schema.column(c).ok());
            let same_type = |c: &&Column| c.data_type() == target_column.data_type();
            let found = candidates
                .clone()
                .find(|c| same_type(c) && c.original_id() == target_column.original_id())
                .or_else(|| candidates.find(|c| same_type(c) && c.name() == target_column.name()));
            if let Some(column) = found {
                self.select
                    .push(ColumnMapping::from_columns(schema, column.id(), target)?);
                matched += 1;
            }
        }
        debug!(matched, "auto select");
        Ok(self)
    }

    pub fn where_(mut self, condition: Col<bool>) -> Result<Self> {
        self.where_ = Some(self.schema.db_expression(condition)?);
        Ok(self)
    }

    /// Add a grouping expression. Any grouping makes the statement an
    /// aggregate.
    pub fn group_by(mut self, column: impl Into<ColumnId>) -> Result<Self> {
        self.group_by.push(self.schema.db_expression(column)?);
        Ok(self)
    }

    pub fn having(mut self, condition: Col<bool>) -> Result<Self> {
        self.having = Some(self.schema.db_expression(condition)?);
        Ok(self)
    }

    pub fn order_by(mut self, column: impl Into<ColumnId>, direction: SortDirection) -> Result<Self> {
        let expression = self.schema.db_expression(column)?;
        self.order_by.push(DbSortExpression::new(expression, direction));
        Ok(self)
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn fetch(mut self, fetch: u64) -> Self {
        self.fetch = Some(fetch);
        self
    }

    /// Finish the statement.
    ///
    /// A statement with grouping, a HAVING clause or an aggregate in its
    /// projection is built as an aggregate; with no grouping it reduces all
    /// rows into one.
    pub fn build(self) -> Result<DbSelectStatement> {
        if self.select.is_empty() {
            return Err(Error::InvalidOperation(format!(
                "select into '{}' projects no columns",
                self.schema.model(self.model)?.name()
            )));
        }
        let aggregate = !self.group_by.is_empty()
            || self.having.is_some()
            || self.select.iter().any(|m| m.source.contains_aggregate());
        if aggregate {
            Ok(DbSelectStatement::new_aggregate(
                self.model,
                self.select,
                self.from,
                self.where_,
                self.group_by,
                self.having,
                self.order_by,
                self.offset,
                self.fetch,
            ))
        } else {
            Ok(DbSelectStatement::new(
                self.model,
                self.select,
                self.from,
                self.where_,
                self.order_by,
                self.offset,
                self.fetch,
            ))
        }
    }

    /// Combine two statements whose models have the same column types in
    /// the same order. The union produces rows of the left model.
    pub fn union(
        schema: &Schema,
        left: impl Into<DbQueryStatement>,
        right: impl Into<DbQueryStatement>,
        kind: UnionKind,
    ) -> Result<DbUnionStatement> {
        let (left, right) = (left.into(), right.into());
        let left_types = column_types(schema, left.model())?;
        let right_types = column_types(schema, right.model())?;
        if left_types != right_types {
            return Err(Error::InvalidOperation(format!(
                "cannot union '{}' with '{}': column types differ",
                schema.model(left.model())?.name(),
                schema.model(right.model())?.name()
            )));
        }
        Ok(DbUnionStatement::new(left.model(), left, right, kind))
    }
}

fn column_types(schema: &Schema, model: ModelId) -> Result<Vec<DataType>> {
    schema
        .model(model)?
        .columns()
        .iter()
        .map(|&c| schema.column(c).map(|c| c.data_type()))
        .collect()
}
