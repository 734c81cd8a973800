//! Re-targeting expressions onto parallel models.

use std::collections::HashMap;

use crate::error::Result;
use crate::model::{ColumnId, Schema};

impl Schema {
    /// Rebuild `column` with every model column replaced through `mapping`.
    ///
    /// Model columns absent from the mapping are kept, as are expression
    /// subtrees that reach no mapped column. Every rebuilt node is attached
    /// to a fresh expression column.
    pub fn counterpart(&mut self, column: ColumnId, mapping: &HashMap<ColumnId, ColumnId>) -> Result<ColumnId> {
        if let Some(&mapped) = mapping.get(&column) {
            return Ok(mapped);
        }
        let Some(expression) = self.expression(column)?.cloned() else {
            return Ok(column);
        };

        let mut changed = false;
        let rebuilt = expression.map_operands(|operand| {
            let mapped = self.counterpart(operand, mapping)?;
            changed |= mapped != operand;
            Ok(mapped)
        })?;
        if !changed {
            return Ok(column);
        }
        self.make_column(rebuilt)
    }
}
