//! Statement model - SELECT and UNION statements over models.
//!
//! Every statement produces rows of one model: `select` maps source
//! expressions onto that model's columns. A non-aggregate statement without
//! paging is *simple* and can be inlined into an outer statement instead of
//! being nested as a derived table.

use std::sync::OnceLock;

use tracing::debug;

use crate::config::QuerySettings;
use crate::error::{Error, Result};
use crate::model::{ColumnId, ModelId, ModelKind, Schema};

use super::eliminator::SubQueryEliminator;
use super::expr::{DbColumnExpression, DbExpression};
use super::from::{DbFromClause, DbTableClause};

// =============================================================================
// Projection and ordering
// =============================================================================

/// A SELECT list item: source expression projected into a model column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMapping {
    pub source: DbExpression,
    pub target: DbColumnExpression,
}

impl ColumnMapping {
    pub fn new(source: DbExpression, target: DbColumnExpression) -> Self {
        Self { source, target }
    }

    /// Map `source` onto the model column `target`.
    pub fn from_columns(schema: &Schema, source: impl Into<ColumnId>, target: ColumnId) -> Result<Self> {
        let target_column = schema.column(target)?;
        let source = schema.db_expression(source)?;
        if source.data_type() != target_column.data_type() {
            return Err(Error::TypeMismatch {
                context: format!("projection into '{}'", schema.qualified_name(target)?),
                expected: target_column.data_type(),
                actual: source.data_type().to_string(),
            });
        }
        match schema.db_expression(target)? {
            DbExpression::Column(target) => Ok(Self { source, target }),
            _ => Err(Error::InvalidOperation(format!(
                "projection target '{}' is not a model column",
                target_column.name()
            ))),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// An ORDER BY expression.
#[derive(Debug, Clone, PartialEq)]
pub struct DbSortExpression {
    pub expression: DbExpression,
    pub direction: SortDirection,
}

impl DbSortExpression {
    pub fn new(expression: DbExpression, direction: SortDirection) -> Self {
        Self {
            expression,
            direction,
        }
    }
}

// =============================================================================
// SELECT
// =============================================================================

/// A SELECT statement.
#[derive(Debug, Clone)]
pub struct DbSelectStatement {
    model: ModelId,
    select: Vec<ColumnMapping>,
    from: Option<DbFromClause>,
    where_: Option<DbExpression>,
    group_by: Option<Vec<DbExpression>>,
    having: Option<DbExpression>,
    order_by: Vec<DbSortExpression>,
    offset: Option<u64>,
    fetch: Option<u64>,
    eliminator: OnceLock<SubQueryEliminator>,
}

impl DbSelectStatement {
    /// A non-aggregate statement.
    pub fn new(
        model: ModelId,
        select: Vec<ColumnMapping>,
        from: Option<DbFromClause>,
        where_: Option<DbExpression>,
        order_by: Vec<DbSortExpression>,
        offset: Option<u64>,
        fetch: Option<u64>,
    ) -> Self {
        Self {
            model,
            select,
            from,
            where_,
            group_by: None,
            having: None,
            order_by,
            offset,
            fetch,
            eliminator: OnceLock::new(),
        }
    }

    /// An aggregate statement. An empty `group_by` aggregates all rows into one.
    #[allow(clippy::too_many_arguments)]
    pub fn new_aggregate(
        model: ModelId,
        select: Vec<ColumnMapping>,
        from: Option<DbFromClause>,
        where_: Option<DbExpression>,
        group_by: Vec<DbExpression>,
        having: Option<DbExpression>,
        order_by: Vec<DbSortExpression>,
        offset: Option<u64>,
        fetch: Option<u64>,
    ) -> Self {
        Self {
            model,
            select,
            from,
            where_,
            group_by: Some(group_by),
            having,
            order_by,
            offset,
            fetch,
            eliminator: OnceLock::new(),
        }
    }

    pub fn model(&self) -> ModelId {
        self.model
    }

    pub fn select(&self) -> &[ColumnMapping] {
        &self.select
    }

    pub fn from(&self) -> Option<&DbFromClause> {
        self.from.as_ref()
    }

    pub fn where_(&self) -> Option<&DbExpression> {
        self.where_.as_ref()
    }

    pub fn group_by(&self) -> Option<&[DbExpression]> {
        self.group_by.as_deref()
    }

    pub fn having(&self) -> Option<&DbExpression> {
        self.having.as_ref()
    }

    pub fn order_by(&self) -> &[DbSortExpression] {
        &self.order_by
    }

    pub fn offset(&self) -> Option<u64> {
        self.offset
    }

    pub fn fetch(&self) -> Option<u64> {
        self.fetch
    }

    pub fn is_aggregate(&self) -> bool {
        self.group_by.is_some()
    }

    /// Non-aggregate and unpaged.
    pub fn is_simple(&self) -> bool {
        !self.is_aggregate() && self.offset.is_none() && self.fetch.is_none()
    }

    /// The source expression projected into `column`, if any.
    pub fn source_of(&self, column: ColumnId) -> Option<&DbExpression> {
        self.select
            .iter()
            .find(|m| m.target.column == column)
            .map(|m| &m.source)
    }

    /// The eliminator for this statement, built on first use.
    pub fn eliminator(&self) -> &SubQueryEliminator {
        self.eliminator.get_or_init(|| SubQueryEliminator::new(self))
    }

    /// Rewrite each mapping's source through this statement's projection.
    pub fn transform_simple_select(&self, mappings: &[ColumnMapping]) -> Result<Vec<ColumnMapping>> {
        let eliminator = self.eliminator();
        mappings
            .iter()
            .map(|m| {
                Ok(ColumnMapping {
                    source: eliminator.eliminate(&m.source)?,
                    target: m.target.clone(),
                })
            })
            .collect()
    }

    /// Inline this statement into a projection onto `target`.
    ///
    /// `mappings` read columns of this statement's model and write columns
    /// of the target's model. Returns `None` when the statement is not
    /// simple or already reads from `target`.
    pub fn try_build_simple_select(
        &self,
        target: &DbTableClause,
        mappings: &[ColumnMapping],
    ) -> Result<Option<DbSelectStatement>> {
        if !self.is_simple() {
            debug!(aggregate = self.is_aggregate(), "select is not simple; keeping sub-query");
            return Ok(None);
        }
        if self.from.as_ref().is_some_and(|f| f.contains_table(target)) {
            debug!(table = %target.name, "select reads its target table; keeping sub-query");
            return Ok(None);
        }
        let select = self.transform_simple_select(mappings)?;
        debug!(table = %target.name, columns = select.len(), "eliminated sub-query");
        Ok(Some(DbSelectStatement::new(
            target.model,
            select,
            self.from.clone(),
            self.where_.clone(),
            self.order_by.clone(),
            self.offset,
            self.fetch,
        )))
    }

    /// Drop mappings into system columns.
    ///
    /// Aggregate statements are returned unchanged.
    pub fn remove_system_columns(&self, schema: &Schema) -> Result<DbSelectStatement> {
        if self.is_aggregate() {
            return Ok(self.clone());
        }
        let mut select = Vec::with_capacity(self.select.len());
        for mapping in &self.select {
            if !schema.column(mapping.target.column)?.is_system() {
                select.push(mapping.clone());
            }
        }
        if select.len() == self.select.len() {
            return Ok(self.clone());
        }
        Ok(DbSelectStatement::new(
            self.model,
            select,
            self.from.clone(),
            self.where_.clone(),
            self.order_by.clone(),
            self.offset,
            self.fetch,
        ))
    }

    /// The statement that fills `target` from this statement.
    ///
    /// Inlines the projection when elimination is enabled and allowed;
    /// otherwise nests this statement as a derived table.
    pub fn build_insert_select(
        &self,
        target: &DbTableClause,
        mappings: &[ColumnMapping],
        settings: &QuerySettings,
    ) -> Result<DbSelectStatement> {
        if settings.eliminate_subqueries {
            if let Some(statement) = self.try_build_simple_select(target, mappings)? {
                return Ok(statement);
            }
        }
        Ok(DbSelectStatement::new(
            target.model,
            mappings.to_vec(),
            Some(DbFromClause::Select(Box::new(self.clone()))),
            None,
            Vec::new(),
            None,
            None,
        ))
    }
}

/// Structural equality; the cached eliminator is not part of a statement's value.
impl PartialEq for DbSelectStatement {
    fn eq(&self, other: &Self) -> bool {
        self.model == other.model
            && self.select == other.select
            && self.from == other.from
            && self.where_ == other.where_
            && self.group_by == other.group_by
            && self.having == other.having
            && self.order_by == other.order_by
            && self.offset == other.offset
            && self.fetch == other.fetch
    }
}

// =============================================================================
// UNION
// =============================================================================

/// Union semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnionKind {
    /// Duplicates removed.
    Union,
    /// Duplicates kept.
    UnionAll,
}

/// Two statements combined into rows of one model.
#[derive(Debug, Clone, PartialEq)]
pub struct DbUnionStatement {
    model: ModelId,
    left: DbQueryStatement,
    right: DbQueryStatement,
    kind: UnionKind,
}

impl DbUnionStatement {
    pub fn new(model: ModelId, left: DbQueryStatement, right: DbQueryStatement, kind: UnionKind) -> Self {
        Self {
            model,
            left,
            right,
            kind,
        }
    }

    pub fn model(&self) -> ModelId {
        self.model
    }

    pub fn left(&self) -> &DbQueryStatement {
        &self.left
    }

    pub fn right(&self) -> &DbQueryStatement {
        &self.right
    }

    pub fn kind(&self) -> UnionKind {
        self.kind
    }
}

// =============================================================================
// Query statements
// =============================================================================

/// Either kind of query statement.
#[derive(Debug, Clone, PartialEq)]
pub enum DbQueryStatement {
    Select(DbSelectStatement),
    Union(Box<DbUnionStatement>),
}

impl From<DbSelectStatement> for DbQueryStatement {
    fn from(select: DbSelectStatement) -> Self {
        DbQueryStatement::Select(select)
    }
}

impl From<DbUnionStatement> for DbQueryStatement {
    fn from(union: DbUnionStatement) -> Self {
        DbQueryStatement::Union(Box::new(union))
    }
}

impl DbQueryStatement {
    pub fn model(&self) -> ModelId {
        match self {
            DbQueryStatement::Select(select) => select.model(),
            DbQueryStatement::Union(union) => union.model(),
        }
    }

    /// Project the primary key of this statement's rows into a new
    /// sequential key table.
    ///
    /// The key table parallels the model's primary key columns and adds a
    /// system identity column named by `settings.sequential_key_column`.
    /// A simple select is inlined; anything else is nested.
    pub fn sequential_key_select_statement(
        &self,
        schema: &mut Schema,
        settings: &QuerySettings,
    ) -> Result<DbSelectStatement> {
        let model = self.model();
        let key = schema.model(model)?.primary_key().to_vec();
        if key.is_empty() {
            return Err(Error::InvalidOperation(format!(
                "model '{}' has no primary key",
                schema.model(model)?.name()
            )));
        }

        let name = unique_model_name(schema, &settings.temp_table_prefix, schema.model(model)?.name(), "SequentialKey");
        let key_model = schema.add_model_of_kind(&name, ModelKind::SequentialKey)?;
        let mut key_columns = Vec::with_capacity(key.len());
        for &column in &key {
            let source = schema.column(column)?;
            let (column_name, data_type) = (source.name().to_string(), source.data_type());
            key_columns.push(schema.add_column_of_type(key_model, &column_name, data_type)?);
        }
        schema.set_primary_key(key_model, &key_columns)?;
        schema.add_system_column::<i64>(key_model, &settings.sequential_key_column)?;

        let mappings = key
            .iter()
            .zip(&key_columns)
            .map(|(&source, &target)| ColumnMapping::from_columns(schema, source, target))
            .collect::<Result<Vec<_>>>()?;
        let target = DbTableClause::for_model(schema, key_model)?;
        debug!(table = %target.name, "sequential key statement");

        match self {
            DbQueryStatement::Select(select) if select.is_simple() => Ok(DbSelectStatement::new(
                key_model,
                select.transform_simple_select(&mappings)?,
                select.from.clone(),
                select.where_.clone(),
                select.order_by.clone(),
                None,
                None,
            )),
            _ => Ok(self.nest(key_model, mappings)),
        }
    }

    /// Materialize this statement into a new temporary table parallel to
    /// its model. Returns the statement that fills the table; its model is
    /// the temporary table's model.
    pub fn build_to_temp_table_statement(
        &self,
        schema: &mut Schema,
        settings: &QuerySettings,
    ) -> Result<DbSelectStatement> {
        let model = self.model();
        let name = unique_model_name(schema, &settings.temp_table_prefix, schema.model(model)?.name(), "Temp");
        let temp = schema.clone_model(model, &name, ModelKind::TempTable)?;

        let mut mappings = Vec::new();
        for &column in schema.model(model)?.columns() {
            if schema.column(column)?.is_system() {
                continue;
            }
            let target = schema.parallel_column(column, temp)?;
            mappings.push(ColumnMapping::from_columns(schema, column, target)?);
        }
        let target = DbTableClause::for_model(schema, temp)?;
        debug!(table = %target.name, columns = mappings.len(), "temp table statement");

        match self {
            DbQueryStatement::Select(select) => select.build_insert_select(&target, &mappings, settings),
            DbQueryStatement::Union(_) => Ok(self.nest(temp, mappings)),
        }
    }

    fn nest(&self, model: ModelId, mappings: Vec<ColumnMapping>) -> DbSelectStatement {
        DbSelectStatement::new(
            model,
            mappings,
            Some(DbFromClause::sub_query(self.clone())),
            None,
            Vec::new(),
            None,
            None,
        )
    }
}

fn unique_model_name(schema: &Schema, prefix: &str, base: &str, suffix: &str) -> String {
    let name = format!("{}{}_{}", prefix, base, suffix);
    if schema.model_by_name(&name).is_none() {
        return name;
    }
    (2..)
        .map(|n| format!("{}{}", name, n))
        .find(|candidate| schema.model_by_name(candidate).is_none())
        .unwrap_or(name)
}
