//! Schema definitions: models, columns and typed column handles.
//!
//! A [`Schema`] is an arena. Models and columns are addressed by stable
//! indices ([`ModelId`], [`ColumnId`]), and everything derived from them
//! (computation dependencies, cached model sets) is keyed by those indices
//! and lives exactly as long as the schema.
//!
//! ```text
//!   Schema
//!   ├── Model "Order"            depth 0
//!   │   ├── Column Id            (primary key)
//!   │   ├── Column Total         (computed: SUM(OrderLine.Amount))
//!   │   └── Model "OrderLine"    depth 1
//!   │       └── Column Amount
//!   └── free expression columns  (model = None)
//! ```

mod column;
mod schema;
pub mod set;

use std::fmt;
use std::marker::PhantomData;

use crate::error::{Error, Result};
use crate::value::ColumnType;

pub use column::Column;
pub use schema::{Model, ModelKind, Schema};
pub use set::{ColumnSet, ModelSet, SealedSet};

/// Stable index of a model within its schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelId(pub(crate) u32);

/// Stable index of a column within its schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnId(pub(crate) u32);

impl ModelId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl ColumnId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "model#{}", self.0)
    }
}

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "column#{}", self.0)
    }
}

/// A typed handle to a column.
///
/// The handle is only a `ColumnId` plus a type marker; the schema remains
/// the owner of the column itself.
pub struct Col<T> {
    id: ColumnId,
    _marker: PhantomData<fn() -> T>,
}

impl<T: ColumnType> Col<T> {
    pub(crate) fn new(id: ColumnId) -> Self {
        Self {
            id,
            _marker: PhantomData,
        }
    }

    /// Wrap an untyped id, checking its type against `T`.
    pub fn from_id(schema: &Schema, id: ColumnId) -> Result<Self> {
        let column = schema.column(id)?;
        if column.data_type() != T::DATA_TYPE {
            return Err(Error::TypeMismatch {
                context: format!("typed handle for '{}'", column.name()),
                expected: T::DATA_TYPE,
                actual: column.data_type().to_string(),
            });
        }
        Ok(Self::new(id))
    }

    pub fn id(&self) -> ColumnId {
        self.id
    }
}

impl<T> Clone for Col<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Col<T> {}

impl<T> PartialEq for Col<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Col<T> {}

impl<T> fmt::Debug for Col<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Col({})", self.id)
    }
}

impl<T> From<Col<T>> for ColumnId {
    fn from(col: Col<T>) -> Self {
        col.id
    }
}
