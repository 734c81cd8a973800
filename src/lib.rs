//! # Tessera
//!
//! Typed relational models with a column expression engine that evaluates
//! both in memory and as portable SQL statement trees.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │        Schema (models, columns, typed Col<T> handles)    │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [expr builders]
//! ┌─────────────────────────────────────────────────────────┐
//! │          Column expressions (owned by free columns)      │
//! └─────────────────────────────────────────────────────────┘
//!            │                                   │
//!            ▼ [compute + merge]                 ▼ [lowering]
//! ┌──────────────────────────┐      ┌──────────────────────────┐
//! │   ComputationManager     │      │   DbExpression trees     │
//! │   (dependency index)     │      │   + SELECT / UNION       │
//! └──────────────────────────┘      └──────────────────────────┘
//!            │                                   │
//!            ▼ [refresh cascade]                 ▼ [sub-query elimination]
//! ┌──────────────────────────┐      ┌──────────────────────────┐
//! │   DataSet rows           │      │   inlined statements     │
//! └──────────────────────────┘      └──────────────────────────┘
//! ```
//!
//! Columns and expressions persist as JSON through the [`json`] module.

pub mod computation;
pub mod config;
pub mod data;
pub mod error;
pub mod expr;
pub mod json;
pub mod logging;
pub mod model;
pub mod sql;
pub mod value;

pub use error::{Error, JsonError, Result};

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::computation::ComputationManager;
    pub use crate::config::{QuerySettings, Settings};
    pub use crate::data::{DataSet, DataSetChain, RowId};
    pub use crate::error::{Error, Result};
    pub use crate::expr::{AggregateKind, BinaryKind, FunctionKey, UnaryKind};
    pub use crate::model::{Col, ColumnId, ColumnSet, ModelId, ModelKind, ModelSet, Schema};
    pub use crate::sql::{
        ColumnMapping, DbExpression, DbFromClause, DbQueryStatement, DbSelectStatement, DbTableClause,
        DbUnionStatement, SelectBuilder, SortDirection, SubQueryEliminator, UnionKind,
    };
    pub use crate::value::{ColumnType, DataType, Value};
}
