//! Error types for the expression, computation and statement engine.
//!
//! Every failure in the core is local and deterministic: a contract
//! violation at construction time, a modeling error found while merging
//! computations, or an evaluation error against materialized rows. None of
//! them are retryable.

use thiserror::Error;

use crate::model::{ColumnId, ModelId};
use crate::value::DataType;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the engine.
#[derive(Debug, Error)]
pub enum Error {
    /// A model handle that does not belong to the schema.
    #[error("unknown model: {0}")]
    UnknownModel(ModelId),

    /// A column handle that does not belong to the schema.
    #[error("unknown column: {0}")]
    UnknownColumn(ColumnId),

    /// A model or column name lookup that found nothing.
    #[error("unknown name: '{0}'")]
    UnknownName(String),

    /// A model name that is already taken.
    #[error("duplicate model: '{0}'")]
    DuplicateModel(String),

    /// A column name that is already taken within its model.
    #[error("duplicate column '{column}' on model '{model}'")]
    DuplicateColumn { model: String, column: String },

    /// An operand or typed handle had the wrong type.
    #[error("type mismatch in {context}: expected {expected}, found {actual}")]
    TypeMismatch {
        context: String,
        expected: DataType,
        actual: String,
    },

    /// Attaching an expression that is already owned by a column.
    #[error("expression is already owned by column {owner}")]
    ExpressionAlreadyOwned { owner: ColumnId },

    /// A column that was expected to belong to a specific model.
    #[error("column '{column}' does not belong to model '{model}'")]
    ColumnNotInModel { column: String, model: String },

    /// A computation that cannot be attached to its column.
    #[error("invalid computation for column '{column}': {reason}")]
    InvalidComputation { column: String, reason: String },

    /// A column computed from itself, directly or through other computations.
    #[error("circular computation detected for column '{column}'")]
    CircularComputation { column: String },

    /// The aggregated column's model is not a descendant of the row's model.
    #[error("cannot aggregate column '{column}' from a row of model '{model}'")]
    AggregateScope { column: String, model: String },

    /// An operation that is not valid in the current context.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// A row handle that does not belong to the data set.
    #[error("unknown row: {0}")]
    UnknownRow(usize),

    /// A column that cannot be read from the given row.
    #[error("column '{column}' is not reachable from a row of model '{model}'")]
    RowModelMismatch { column: String, model: String },

    #[error("division by zero")]
    DivideByZero,

    #[error("cannot cast '{value}' to {target}")]
    InvalidCast { value: String, target: DataType },

    /// Mutating a sealed model or column set.
    #[error("set is sealed")]
    SealedSet,

    #[error(transparent)]
    Json(#[from] JsonError),
}

/// Errors raised while reading or writing persisted expressions.
#[derive(Debug, Error)]
pub enum JsonError {
    #[error("malformed JSON: {0}")]
    Syntax(#[from] serde_json::Error),

    #[error("unknown type id '{type_id}' at {path}")]
    UnknownTypeId { type_id: String, path: String },

    #[error("type id '{type_id}' at {path} expects {expected} argument type id(s), found {found}")]
    ArityMismatch {
        type_id: String,
        path: String,
        expected: usize,
        found: usize,
    },

    #[error("unexpected token at {path}: expected {expected}, found {found}")]
    UnexpectedToken {
        path: String,
        expected: String,
        found: String,
    },

    #[error("unknown column name '{name}' at {path}")]
    UnknownColumnName { name: String, path: String },

    #[error("value cannot be written as JSON: {0}")]
    Unrepresentable(String),
}
