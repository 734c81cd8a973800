//! Traversal from a row down a chain of child models.

use crate::error::Result;
use crate::model::ModelId;

use super::{DataSet, RowId};

/// The rows reached from `row` by descending through `chain`, one child
/// model per level.
///
/// With `chain = [OrderLine, Shipment]` and an `Order` row, the leaves are
/// every shipment of every line of that order, in child order.
#[derive(Debug, Clone, Copy)]
pub struct DataSetChain<'a> {
    data: &'a DataSet,
    row: RowId,
    chain: &'a [ModelId],
}

impl<'a> DataSetChain<'a> {
    pub fn new(data: &'a DataSet, row: RowId, chain: &'a [ModelId]) -> Self {
        Self { data, row, chain }
    }

    /// Visit every leaf row depth first.
    pub fn for_each_leaf<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(RowId) -> Result<()>,
    {
        self.walk(self.row, self.chain, &mut f)
    }

    fn walk<F>(&self, row: RowId, chain: &[ModelId], f: &mut F) -> Result<()>
    where
        F: FnMut(RowId) -> Result<()>,
    {
        let Some((&next, rest)) = chain.split_first() else {
            return f(row);
        };
        for &child in self.data.child_rows(row, next)? {
            self.walk(child, rest, f)?;
        }
        Ok(())
    }

    /// Leaf rows in visiting order.
    pub fn rows(&self) -> Result<Vec<RowId>> {
        let mut rows = Vec::new();
        self.for_each_leaf(|r| {
            rows.push(r);
            Ok(())
        })?;
        Ok(rows)
    }
}
