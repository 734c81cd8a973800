//! Column definitions.

use std::sync::OnceLock;

use crate::expr::ColumnExpression;
use crate::value::DataType;

use super::{ColumnId, ColumnSet, ModelId};

/// A column: either a stored field of a model or the owner of an expression.
#[derive(Debug, Clone)]
pub struct Column {
    pub(crate) id: ColumnId,
    pub(crate) name: String,
    /// Identity used to match columns across parallel models.
    pub(crate) original_id: String,
    /// `None` for a free expression column.
    pub(crate) model: Option<ModelId>,
    pub(crate) ordinal: Option<usize>,
    pub(crate) data_type: DataType,
    pub(crate) is_system: bool,
    pub(crate) expression: Option<ColumnExpression>,
    /// Expression column this model column is computed from.
    pub(crate) computation: Option<ColumnId>,
    pub(crate) base_columns: OnceLock<ColumnSet>,
}

impl Column {
    pub(crate) fn field(
        id: ColumnId,
        model: ModelId,
        model_name: &str,
        name: &str,
        ordinal: usize,
        data_type: DataType,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            original_id: format!("{}.{}", model_name, name),
            model: Some(model),
            ordinal: Some(ordinal),
            data_type,
            is_system: false,
            expression: None,
            computation: None,
            base_columns: OnceLock::new(),
        }
    }

    pub(crate) fn free(id: ColumnId, expression: ColumnExpression) -> Self {
        let name = format!("expr{}", id.0);
        Self {
            id,
            original_id: name.clone(),
            name,
            model: None,
            ordinal: None,
            data_type: expression.data_type(),
            is_system: false,
            expression: Some(expression),
            computation: None,
            base_columns: OnceLock::new(),
        }
    }

    pub fn id(&self) -> ColumnId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn original_id(&self) -> &str {
        &self.original_id
    }

    /// The owning model, or `None` for a free expression.
    pub fn model(&self) -> Option<ModelId> {
        self.model
    }

    pub fn ordinal(&self) -> Option<usize> {
        self.ordinal
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn is_system(&self) -> bool {
        self.is_system
    }

    /// True for columns that own an expression rather than referencing a field.
    pub fn is_expression(&self) -> bool {
        self.expression.is_some()
    }

    pub fn column_expression(&self) -> Option<&ColumnExpression> {
        self.expression.as_ref()
    }

    /// True for model columns whose value is computed from an expression.
    pub fn is_computed(&self) -> bool {
        self.computation.is_some()
    }

    pub fn computation(&self) -> Option<ColumnId> {
        self.computation
    }
}
