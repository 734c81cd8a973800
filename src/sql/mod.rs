//! Portable SQL statement model.
//!
//! Column expressions lower into [`DbExpression`] trees; statements combine
//! them into SELECT and UNION statements over models. Nothing here renders
//! SQL text: the trees are the interface to a dialect-specific emitter.
//!
//! - [`expr`] - expression trees and their visitor
//! - [`from`] - FROM clause trees and their visitor
//! - [`DbSelectStatement`] / [`DbUnionStatement`] - statements
//! - [`SubQueryEliminator`] - inlining of simple nested selects
//! - [`SelectBuilder`] - fluent construction against a schema

mod builder;
mod eliminator;
pub mod expr;
pub mod from;
mod statement;

pub use builder::SelectBuilder;
pub use eliminator::SubQueryEliminator;
pub use expr::{DbColumnExpression, DbExpression, DbExpressionVisitor, DbFunctionKey};
pub use from::{DbFromClause, DbFromClauseVisitor, DbJoinClause, DbJoinKind, DbTableClause};
pub use statement::{
    ColumnMapping, DbQueryStatement, DbSelectStatement, DbSortExpression, DbUnionStatement, SortDirection,
    UnionKind,
};
