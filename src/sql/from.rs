//! FROM clause trees.

use crate::error::Result;
use crate::model::{ModelId, Schema};

use super::expr::DbExpression;
use super::statement::{DbQueryStatement, DbSelectStatement, DbUnionStatement};

// =============================================================================
// Clauses
// =============================================================================

/// A table reference bound to the model it stores.
#[derive(Debug, Clone, PartialEq)]
pub struct DbTableClause {
    pub name: String,
    pub alias: String,
    pub model: ModelId,
}

impl DbTableClause {
    pub fn new(name: &str, alias: &str, model: ModelId) -> Self {
        Self {
            name: name.into(),
            alias: alias.into(),
            model,
        }
    }

    /// The table of `model`, aliased by its model name.
    pub fn for_model(schema: &Schema, model: ModelId) -> Result<Self> {
        let name = schema.model(model)?.name();
        Ok(Self::new(name, name, model))
    }
}

/// Type of join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbJoinKind {
    Inner,
    Left,
    Right,
    Cross,
}

/// A JOIN between two clause trees.
#[derive(Debug, Clone, PartialEq)]
pub struct DbJoinClause {
    pub kind: DbJoinKind,
    pub left: DbFromClause,
    pub right: DbFromClause,
    pub on: Option<DbExpression>,
}

/// A FROM clause tree.
///
/// Every variant must be handled in [`DbFromClause::accept`] - the compiler
/// enforces this.
#[derive(Debug, Clone, PartialEq)]
pub enum DbFromClause {
    Table(DbTableClause),
    Join(Box<DbJoinClause>),
    /// Nested select used as a derived table.
    Select(Box<DbSelectStatement>),
    /// Nested union used as a derived table.
    Union(Box<DbUnionStatement>),
}

impl DbFromClause {
    /// Double-dispatch into `visitor`.
    pub fn accept<V: DbFromClauseVisitor>(&self, visitor: &mut V) -> V::Output {
        match self {
            DbFromClause::Table(table) => visitor.visit_table(table),
            DbFromClause::Join(join) => visitor.visit_join(join),
            DbFromClause::Select(select) => visitor.visit_select(select),
            DbFromClause::Union(union) => visitor.visit_union(union),
        }
    }

    /// True when `table` appears anywhere in the tree, including nested
    /// selects and unions. Tables match by name.
    pub fn contains_table(&self, table: &DbTableClause) -> bool {
        self.accept(&mut TableFinder { target: table })
    }

    /// A derived table over `statement`.
    pub fn sub_query(statement: DbQueryStatement) -> Self {
        match statement {
            DbQueryStatement::Select(select) => DbFromClause::Select(Box::new(select)),
            DbQueryStatement::Union(union) => DbFromClause::Union(union),
        }
    }
}

impl From<DbTableClause> for DbFromClause {
    fn from(table: DbTableClause) -> Self {
        DbFromClause::Table(table)
    }
}

// =============================================================================
// Visitor
// =============================================================================

/// Double-dispatch over [`DbFromClause`] nodes.
pub trait DbFromClauseVisitor {
    type Output;

    fn visit_table(&mut self, table: &DbTableClause) -> Self::Output;

    fn visit_join(&mut self, join: &DbJoinClause) -> Self::Output;

    fn visit_select(&mut self, select: &DbSelectStatement) -> Self::Output;

    fn visit_union(&mut self, union: &DbUnionStatement) -> Self::Output;
}

struct TableFinder<'a> {
    target: &'a DbTableClause,
}

impl TableFinder<'_> {
    fn query(&mut self, query: &DbQueryStatement) -> bool {
        match query {
            DbQueryStatement::Select(select) => self.visit_select(select),
            DbQueryStatement::Union(union) => self.visit_union(union),
        }
    }
}

impl DbFromClauseVisitor for TableFinder<'_> {
    type Output = bool;

    fn visit_table(&mut self, table: &DbTableClause) -> bool {
        table.name == self.target.name
    }

    fn visit_join(&mut self, join: &DbJoinClause) -> bool {
        join.left.accept(self) || join.right.accept(self)
    }

    fn visit_select(&mut self, select: &DbSelectStatement) -> bool {
        select.from().is_some_and(|from| from.accept(self))
    }

    fn visit_union(&mut self, union: &DbUnionStatement) -> bool {
        self.query(union.left()) || self.query(union.right())
    }
}
