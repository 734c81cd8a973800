//! The schema arena.

use std::collections::HashMap;

use tracing::debug;

use crate::computation::ComputationManager;
use crate::error::{Error, Result};
use crate::expr::ColumnExpression;
use crate::value::{ColumnType, DataType};

use super::column::Column;
use super::{Col, ColumnId, ColumnSet, ModelId, ModelSet};

/// What a model stands for in generated statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    /// A permanent table.
    Table,
    /// A temporary table materialized from a query.
    TempTable,
    /// A temporary table holding a stable row-ordering key.
    SequentialKey,
}

/// A schema node: a flat list of columns plus its place in the hierarchy.
#[derive(Debug, Clone)]
pub struct Model {
    pub(crate) id: ModelId,
    pub(crate) name: String,
    pub(crate) kind: ModelKind,
    pub(crate) parent: Option<ModelId>,
    pub(crate) depth: usize,
    pub(crate) children: Vec<ModelId>,
    pub(crate) columns: Vec<ColumnId>,
    pub(crate) primary_key: Vec<ColumnId>,
    pub(crate) computation_columns: ColumnSet,
}

impl Model {
    pub fn id(&self) -> ModelId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn parent(&self) -> Option<ModelId> {
        self.parent
    }

    /// Distance from the root model (root = 0).
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn children(&self) -> &[ModelId] {
        &self.children
    }

    /// Columns in ordinal order.
    pub fn columns(&self) -> &[ColumnId] {
        &self.columns
    }

    pub fn primary_key(&self) -> &[ColumnId] {
        &self.primary_key
    }

    pub fn computation_columns(&self) -> &ColumnSet {
        &self.computation_columns
    }
}

/// Arena of models and columns plus the computation dependency index.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    models: Vec<Model>,
    columns: Vec<Column>,
    model_names: HashMap<String, ModelId>,
    computations: ComputationManager,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Models
    // =========================================================================

    /// Add a root model.
    pub fn add_model(&mut self, name: &str) -> Result<ModelId> {
        self.push_model(name, None, ModelKind::Table)
    }

    /// Add a model nested under `parent` (e.g. order lines under an order).
    pub fn add_child_model(&mut self, parent: ModelId, name: &str) -> Result<ModelId> {
        self.model(parent)?;
        self.push_model(name, Some(parent), ModelKind::Table)
    }

    /// Add a root model of a generated kind (temp or key tables).
    pub fn add_model_of_kind(&mut self, name: &str, kind: ModelKind) -> Result<ModelId> {
        self.push_model(name, None, kind)
    }

    fn push_model(&mut self, name: &str, parent: Option<ModelId>, kind: ModelKind) -> Result<ModelId> {
        if self.model_names.contains_key(name) {
            return Err(Error::DuplicateModel(name.into()));
        }
        let id = ModelId(self.models.len() as u32);
        let depth = match parent {
            Some(p) => self.model(p)?.depth + 1,
            None => 0,
        };
        self.models.push(Model {
            id,
            name: name.into(),
            kind,
            parent,
            depth,
            children: Vec::new(),
            columns: Vec::new(),
            primary_key: Vec::new(),
            computation_columns: ColumnSet::empty(),
        });
        if let Some(p) = parent {
            self.models[p.index()].children.push(id);
        }
        self.model_names.insert(name.into(), id);
        Ok(id)
    }

    pub fn model(&self, id: ModelId) -> Result<&Model> {
        self.models.get(id.index()).ok_or(Error::UnknownModel(id))
    }

    pub fn models(&self) -> impl Iterator<Item = &Model> {
        self.models.iter()
    }

    pub fn model_by_name(&self, name: &str) -> Option<ModelId> {
        self.model_names.get(name).copied()
    }

    /// True when `ancestor` is a strict ancestor of `descendant`.
    pub fn is_ancestor(&self, ancestor: ModelId, descendant: ModelId) -> Result<bool> {
        let mut current = self.model(descendant)?.parent;
        while let Some(m) = current {
            if m == ancestor {
                return Ok(true);
            }
            current = self.model(m)?.parent;
        }
        Ok(false)
    }

    // =========================================================================
    // Columns
    // =========================================================================

    /// Add a stored field to a model.
    pub fn add_column<T: ColumnType>(&mut self, model: ModelId, name: &str) -> Result<Col<T>> {
        self.add_column_of_type(model, name, T::DATA_TYPE).map(Col::new)
    }

    /// Add a bookkeeping column (row ids and the like) that is never
    /// projected for external consumption.
    pub fn add_system_column<T: ColumnType>(&mut self, model: ModelId, name: &str) -> Result<Col<T>> {
        let id = self.add_column_of_type(model, name, T::DATA_TYPE)?;
        self.columns[id.index()].is_system = true;
        Ok(Col::new(id))
    }

    /// Untyped form of [`add_column`](Self::add_column).
    pub fn add_column_of_type(&mut self, model: ModelId, name: &str, data_type: DataType) -> Result<ColumnId> {
        let model_def = self.model(model)?;
        if self.column_by_name(model, name).is_some() {
            return Err(Error::DuplicateColumn {
                model: model_def.name.clone(),
                column: name.into(),
            });
        }
        let id = ColumnId(self.columns.len() as u32);
        let ordinal = model_def.columns.len();
        let column = Column::field(id, model, &model_def.name, name, ordinal, data_type);
        self.columns.push(column);
        self.models[model.index()].columns.push(id);
        Ok(id)
    }

    pub fn set_primary_key(&mut self, model: ModelId, key: &[ColumnId]) -> Result<()> {
        for &c in key {
            self.ensure_in_model(c, model)?;
        }
        self.models[model.index()].primary_key = key.to_vec();
        Ok(())
    }

    pub fn column(&self, id: ColumnId) -> Result<&Column> {
        self.columns.get(id.index()).ok_or(Error::UnknownColumn(id))
    }

    pub fn column_by_name(&self, model: ModelId, name: &str) -> Option<ColumnId> {
        let model = self.models.get(model.index())?;
        model
            .columns
            .iter()
            .copied()
            .find(|c| self.columns[c.index()].name == name)
    }

    /// Resolve `"<Model>.<Column>"`.
    pub fn resolve_qualified(&self, qualified: &str) -> Result<ColumnId> {
        let (model, column) = qualified
            .split_once('.')
            .ok_or_else(|| Error::UnknownName(qualified.into()))?;
        let model = self
            .model_by_name(model)
            .ok_or_else(|| Error::UnknownName(qualified.into()))?;
        self.column_by_name(model, column)
            .ok_or_else(|| Error::UnknownName(qualified.into()))
    }

    /// `"<Model>.<Column>"` for model columns, the generated name otherwise.
    pub fn qualified_name(&self, id: ColumnId) -> Result<String> {
        let column = self.column(id)?;
        Ok(match column.model {
            Some(m) => format!("{}.{}", self.model(m)?.name, column.name),
            None => column.name.clone(),
        })
    }

    pub(crate) fn ensure_in_model(&self, column: ColumnId, model: ModelId) -> Result<()> {
        let c = self.column(column)?;
        if c.model != Some(model) {
            return Err(Error::ColumnNotInModel {
                column: c.name.clone(),
                model: self.model(model)?.name.clone(),
            });
        }
        Ok(())
    }

    /// Attach an expression to a new free column.
    ///
    /// Fails if the expression already has an owner: an expression belongs
    /// to exactly one column.
    pub fn make_column(&mut self, expression: ColumnExpression) -> Result<ColumnId> {
        if let Some(owner) = expression.owner() {
            return Err(Error::ExpressionAlreadyOwned { owner });
        }
        for operand in expression.operands() {
            self.column(operand)?;
        }
        if let crate::expr::ExprKind::Param {
            source: Some(source),
            ..
        } = expression.kind()
        {
            self.column(*source)?;
        }
        let id = ColumnId(self.columns.len() as u32);
        expression
            .set_owner(id)
            .map_err(|owner| Error::ExpressionAlreadyOwned { owner })?;
        self.columns.push(Column::free(id, expression));
        Ok(id)
    }

    /// The expression owned by a column, if any.
    pub fn expression(&self, id: ColumnId) -> Result<Option<&ColumnExpression>> {
        Ok(self.column(id)?.expression.as_ref())
    }

    // =========================================================================
    // Structural queries
    // =========================================================================

    /// Models needed to evaluate `id` against a row.
    pub fn parent_model_set(&self, id: ColumnId) -> Result<ModelSet> {
        let column = self.column(id)?;
        match (&column.expression, column.model) {
            (Some(expr), _) => expr.parent_model_set(self),
            (None, Some(model)) => Ok(ModelSet::of(model).sealed()),
            (None, None) => Ok(ModelSet::empty().sealed()),
        }
    }

    /// Models `id` aggregates over.
    pub fn aggregate_model_set(&self, id: ColumnId) -> Result<ModelSet> {
        match &self.column(id)?.expression {
            Some(expr) => expr.aggregate_model_set(self),
            None => Ok(ModelSet::empty().sealed()),
        }
    }

    /// Model columns `id` reads, looking through free expressions. Cached.
    pub fn base_columns(&self, id: ColumnId) -> Result<ColumnSet> {
        let column = self.column(id)?;
        if let Some(set) = column.base_columns.get() {
            return Ok(set.clone());
        }
        let set = match (&column.expression, column.model) {
            (None, Some(_)) => ColumnSet::of(id),
            (None, None) => ColumnSet::empty(),
            (Some(expr), _) => {
                let mut set = ColumnSet::empty();
                for operand in expr.operands() {
                    set = set.union(&self.base_columns(operand)?);
                }
                set
            }
        }
        .sealed();
        Ok(column.base_columns.get_or_init(|| set).clone())
    }

    // =========================================================================
    // Computations
    // =========================================================================

    pub fn computations(&self) -> &ComputationManager {
        &self.computations
    }

    /// Compute a model column from an expression column.
    pub fn compute<T: ColumnType>(&mut self, column: Col<T>, expression: Col<T>) -> Result<()> {
        self.compute_all(&[(column.id(), expression.id())])
    }

    /// Register several computations at once. Either all of them are
    /// merged or, on error, none.
    pub fn compute_all(&mut self, pairs: &[(ColumnId, ColumnId)]) -> Result<()> {
        for &(column, expression) in pairs {
            self.validate_computation(column, expression)?;
        }

        let saved: Vec<_> = pairs
            .iter()
            .map(|&(c, _)| (c, self.columns[c.index()].computation))
            .collect();
        for &(column, expression) in pairs {
            self.columns[column.index()].computation = Some(expression);
        }

        let merged: ColumnSet = pairs.iter().map(|&(c, _)| c).collect();
        match self.computations.merge(self, &merged) {
            Ok(manager) => {
                self.computations = manager;
                for &(column, _) in pairs {
                    if let Some(model) = self.columns[column.index()].model {
                        let set = self.models[model.index()].computation_columns.add(column);
                        self.models[model.index()].computation_columns = set.sealed();
                    }
                }
                debug!(count = pairs.len(), "registered computations");
                Ok(())
            }
            Err(err) => {
                for (column, previous) in saved {
                    self.columns[column.index()].computation = previous;
                }
                Err(err)
            }
        }
    }

    fn validate_computation(&self, column: ColumnId, expression: ColumnId) -> Result<()> {
        let target = self.column(column)?;
        let invalid = |reason: String| Error::InvalidComputation {
            column: target.name.clone(),
            reason,
        };
        let model = target
            .model
            .ok_or_else(|| invalid("only model columns can be computed".into()))?;
        let source = self.column(expression)?;
        if source.data_type != target.data_type {
            return Err(Error::TypeMismatch {
                context: format!("computation of '{}'", target.name),
                expected: target.data_type,
                actual: source.data_type.to_string(),
            });
        }
        for m in self.parent_model_set(expression)?.iter() {
            if m != model && !self.is_ancestor(m, model)? {
                return Err(invalid(format!(
                    "expression reads model '{}', which is not '{}' or one of its ancestors",
                    self.model(m)?.name,
                    self.model(model)?.name
                )));
            }
        }
        for m in self.aggregate_model_set(expression)?.iter() {
            if !self.is_ancestor(model, m)? {
                return Err(invalid(format!(
                    "expression aggregates model '{}', which is not a descendant of '{}'",
                    self.model(m)?.name,
                    self.model(model)?.name
                )));
            }
        }
        Ok(())
    }

    // =========================================================================
    // Parallel models
    // =========================================================================

    /// Create a root model parallel to `source`: same column names,
    /// ordinals, original ids and primary key, with computations re-targeted.
    pub fn clone_model(&mut self, source: ModelId, name: &str, kind: ModelKind) -> Result<ModelId> {
        let source_model = self.model(source)?;
        let source_columns = source_model.columns.clone();
        let source_key = source_model.primary_key.clone();
        let target = self.push_model(name, None, kind)?;

        let mut mapping = HashMap::new();
        for &c in &source_columns {
            let column = self.column(c)?.clone();
            let id = self.add_column_of_type(target, &column.name, column.data_type)?;
            let new_column = &mut self.columns[id.index()];
            new_column.original_id = column.original_id;
            new_column.is_system = column.is_system;
            mapping.insert(c, id);
        }

        let key = source_key.iter().map(|c| mapping[c]).collect::<Vec<_>>();
        self.models[target.index()].primary_key = key;

        let mut computations = Vec::new();
        for &c in &source_columns {
            if let Some(expression) = self.column(c)?.computation {
                let translated = self.counterpart(expression, &mapping)?;
                // Aggregates over the source's child models have no
                // counterpart; the clone stores those values as plain fields.
                if self.validate_computation(mapping[&c], translated).is_ok() {
                    computations.push((mapping[&c], translated));
                } else {
                    debug!(column = %self.qualified_name(c)?, "computation not carried to clone");
                }
            }
        }
        if !computations.is_empty() {
            self.compute_all(&computations)?;
        }
        debug!(source = %self.model(source)?.name, target = name, "cloned model");
        Ok(target)
    }

    /// The column of `target` with the same ordinal as `column`.
    pub fn parallel_column(&self, column: ColumnId, target: ModelId) -> Result<ColumnId> {
        let c = self.column(column)?;
        let ordinal = c.ordinal.ok_or_else(|| {
            Error::InvalidOperation(format!("'{}' is not a model column", c.name))
        })?;
        let target_model = self.model(target)?;
        target_model
            .columns
            .get(ordinal)
            .copied()
            .filter(|p| self.columns[p.index()].data_type == c.data_type)
            .ok_or_else(|| Error::ColumnNotInModel {
                column: c.name.clone(),
                model: target_model.name.clone(),
            })
    }
}
