//! Materialized rows.
//!
//! A [`DataSet`] instantiates one root model of a frozen [`Schema`]. Rows live
//! in an arena addressed by [`RowId`]; each row keeps one value slot per
//! model column and an ordered list of child rows per child model.
//!
//! ```text
//! Order#0 ── OrderLine ── [row 1, row 2]
//! Order#3 ── OrderLine ── [row 4]
//! ```
//!
//! Computed slots are maintained by the refresh cascade in [`refresh`]; they
//! cannot be written directly.

mod chain;
mod refresh;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::config::ComputationSettings;
use crate::error::{Error, Result};
use crate::expr::Evaluator;
use crate::model::{Col, ColumnId, ModelId, Schema};
use crate::value::{ColumnType, Value};

pub use chain::DataSetChain;

/// Handle to a row of a [`DataSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RowId(pub(crate) usize);

impl RowId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row#{}", self.0)
    }
}

#[derive(Debug, Clone)]
struct RowData {
    model: ModelId,
    parent: Option<RowId>,
    values: Vec<Value>,
    children: BTreeMap<ModelId, Vec<RowId>>,
}

/// Rows of one root model and their descendants.
#[derive(Debug, Clone)]
pub struct DataSet {
    schema: Arc<Schema>,
    model: ModelId,
    settings: ComputationSettings,
    /// Removed rows leave a `None` slot; ids are never reused.
    rows: Vec<Option<RowData>>,
    roots: Vec<RowId>,
}

impl DataSet {
    pub fn new(schema: Arc<Schema>, model: ModelId) -> Result<Self> {
        Self::with_settings(schema, model, ComputationSettings::default())
    }

    pub fn with_settings(schema: Arc<Schema>, model: ModelId, settings: ComputationSettings) -> Result<Self> {
        if let Some(parent) = schema.model(model)?.parent() {
            return Err(Error::InvalidOperation(format!(
                "data sets are rooted at a root model; '{}' is nested under '{}'",
                schema.model(model)?.name(),
                schema.model(parent)?.name()
            )));
        }
        Ok(Self {
            schema,
            model,
            settings,
            rows: Vec::new(),
            roots: Vec::new(),
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The root model.
    pub fn model(&self) -> ModelId {
        self.model
    }

    pub fn settings(&self) -> &ComputationSettings {
        &self.settings
    }

    /// Top-level rows in insertion order.
    pub fn rows(&self) -> &[RowId] {
        &self.roots
    }

    /// Number of live rows at every level.
    pub fn len(&self) -> usize {
        self.rows.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    fn row(&self, row: RowId) -> Result<&RowData> {
        self.rows
            .get(row.0)
            .and_then(Option::as_ref)
            .ok_or(Error::UnknownRow(row.0))
    }

    fn row_mut(&mut self, row: RowId) -> Result<&mut RowData> {
        self.rows
            .get_mut(row.0)
            .and_then(Option::as_mut)
            .ok_or(Error::UnknownRow(row.0))
    }

    pub fn contains(&self, row: RowId) -> bool {
        self.row(row).is_ok()
    }

    pub fn row_model(&self, row: RowId) -> Result<ModelId> {
        Ok(self.row(row)?.model)
    }

    pub fn parent_row(&self, row: RowId) -> Result<Option<RowId>> {
        Ok(self.row(row)?.parent)
    }

    /// Child rows of `row` that belong to `child_model`, in insertion order.
    pub fn child_rows(&self, row: RowId, child_model: ModelId) -> Result<&[RowId]> {
        Ok(self
            .row(row)?
            .children
            .get(&child_model)
            .map_or(&[][..], Vec::as_slice))
    }

    /// `row` itself or its nearest ancestor whose model is `model`.
    pub(crate) fn ancestor_row(&self, row: RowId, model: ModelId) -> Result<Option<RowId>> {
        let mut current = Some(row);
        while let Some(r) = current {
            let data = self.row(r)?;
            if data.model == model {
                return Ok(Some(r));
            }
            current = data.parent;
        }
        Ok(None)
    }

    /// Every row of `model` at or below `row`, depth first.
    pub(crate) fn descendant_rows(&self, row: RowId, model: ModelId) -> Result<Vec<RowId>> {
        let mut found = Vec::new();
        let mut stack = vec![row];
        while let Some(r) = stack.pop() {
            let data = self.row(r)?;
            if data.model == model {
                found.push(r);
                continue;
            }
            for children in data.children.values().rev() {
                stack.extend(children.iter().rev());
            }
        }
        Ok(found)
    }

    pub(crate) fn stored(&self, row: RowId, ordinal: usize) -> Result<&Value> {
        let data = self.row(row)?;
        data.values.get(ordinal).ok_or_else(|| {
            Error::InvalidOperation(format!("{} has no slot at ordinal {}", row, ordinal))
        })
    }

    fn store(&mut self, row: RowId, ordinal: usize, value: Value) -> Result<()> {
        let data = self.row_mut(row)?;
        let slot = data.values.get_mut(ordinal).ok_or_else(|| {
            Error::InvalidOperation(format!("{} has no slot at ordinal {}", row, ordinal))
        })?;
        *slot = value;
        Ok(())
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    fn push_row(&mut self, model: ModelId, parent: Option<RowId>) -> Result<RowId> {
        let width = self.schema.model(model)?.columns().len();
        let id = RowId(self.rows.len());
        self.rows.push(Some(RowData {
            model,
            parent,
            values: vec![Value::Null; width],
            children: BTreeMap::new(),
        }));
        Ok(id)
    }

    /// Append a top-level row.
    pub fn add_row(&mut self) -> Result<RowId> {
        let row = self.push_row(self.model, None)?;
        self.roots.push(row);
        trace!(%row, "added row");
        if self.settings.auto_refresh {
            self.refresh_computations(row)?;
        }
        Ok(row)
    }

    /// Append a row of `child_model` under `parent`.
    pub fn add_child_row(&mut self, parent: RowId, child_model: ModelId) -> Result<RowId> {
        let parent_model = self.row_model(parent)?;
        if self.schema.model(child_model)?.parent() != Some(parent_model) {
            return Err(Error::InvalidOperation(format!(
                "'{}' is not a child model of '{}'",
                self.schema.model(child_model)?.name(),
                self.schema.model(parent_model)?.name()
            )));
        }
        let row = self.push_row(child_model, Some(parent))?;
        self.row_mut(parent)?.children.entry(child_model).or_default().push(row);
        trace!(%row, %parent, "added child row");
        if self.settings.auto_refresh {
            self.refresh_computations(row)?;
        }
        Ok(row)
    }

    /// Remove `row` and everything below it.
    pub fn remove_row(&mut self, row: RowId) -> Result<()> {
        let model = self.row_model(row)?;
        let parent = self.parent_row(row)?;

        let mut removed_models = Vec::new();
        let mut stack = vec![row];
        while let Some(r) = stack.pop() {
            if let Some(data) = self.rows.get_mut(r.0).and_then(Option::take) {
                if !removed_models.contains(&data.model) {
                    removed_models.push(data.model);
                }
                stack.extend(data.children.into_values().flatten());
            }
        }

        match parent {
            Some(p) => {
                if let Some(siblings) = self.row_mut(p)?.children.get_mut(&model) {
                    siblings.retain(|r| *r != row);
                }
                trace!(%row, parent = %p, "removed row");
                if self.settings.auto_refresh {
                    self.refresh_ancestor_aggregates(p, &removed_models)?;
                }
            }
            None => {
                self.roots.retain(|r| *r != row);
                trace!(%row, "removed row");
            }
        }
        Ok(())
    }

    /// Write a stored column of `row`.
    ///
    /// Computed columns are rejected; with auto refresh on, every computed
    /// column that depends on `column` is re-evaluated.
    pub fn set_value(&mut self, row: RowId, column: impl Into<ColumnId>, value: impl Into<Value>) -> Result<()> {
        let column = column.into();
        let value = value.into();
        let model = self.row_model(row)?;
        self.schema.ensure_in_model(column, model)?;

        let def = self.schema.column(column)?;
        if def.is_computed() {
            return Err(Error::InvalidOperation(format!(
                "'{}' is computed and cannot be set",
                self.schema.qualified_name(column)?
            )));
        }
        if !value.conforms_to(def.data_type()) {
            return Err(Error::TypeMismatch {
                context: format!("value of '{}'", self.schema.qualified_name(column)?),
                expected: def.data_type(),
                actual: value.data_type().map_or("NULL".into(), |t| t.to_string()),
            });
        }
        let ordinal = def.ordinal().ok_or_else(|| {
            Error::InvalidOperation(format!("'{}' has no ordinal", def.name()))
        })?;

        self.store(row, ordinal, value)?;
        if self.settings.auto_refresh {
            self.cascade(row, column)?;
        }
        Ok(())
    }

    /// Typed form of [`set_value`](Self::set_value).
    pub fn set<T: ColumnType>(&mut self, row: RowId, column: Col<T>, value: Option<T>) -> Result<()> {
        self.set_value(row, column, value.map_or(Value::Null, T::into_value))
    }

    // =========================================================================
    // Evaluation
    // =========================================================================

    /// Value of `column` in the context of `row`.
    pub fn eval(&self, row: RowId, column: impl Into<ColumnId>) -> Result<Value> {
        self.row(row)?;
        Evaluator::in_row(self, row).column(column.into())
    }

    /// Typed form of [`eval`](Self::eval).
    pub fn get<T: ColumnType>(&self, row: RowId, column: Col<T>) -> Result<Option<T>> {
        T::from_value(&self.eval(row, column)?)
    }
}
