//! Computation refresh.
//!
//! Refresh is a work-list cascade over rows. Each pending row carries the
//! computed columns that must be re-evaluated (`dirty`) and the stored
//! columns that were written (`changed`). Processing a row:
//!
//! 1. closes `dirty` over sibling dependents of `dirty ∪ changed`,
//! 2. queues dependents on ancestor rows,
//! 3. evaluates the closure in dependency order, deferring columns that
//!    read a value still pending on an ancestor row,
//! 4. queues dependents of the settled columns on descendant rows.
//!
//! A row that is queued twice before being processed is merged into one
//! entry. The computation index rejects cycles, so the cascade terminates.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::Result;
use crate::expr::Evaluator;
use crate::model::{ColumnId, ColumnSet, ModelId, Schema};

use super::{DataSet, RowId};

#[derive(Default)]
struct Cascade {
    queue: VecDeque<RowId>,
    pending: HashMap<RowId, (ColumnSet, ColumnSet)>,
}

impl Cascade {
    fn enqueue(&mut self, row: RowId, dirty: &ColumnSet, changed: &ColumnSet) {
        match self.pending.get_mut(&row) {
            Some((d, c)) => {
                *d = d.union(dirty);
                *c = c.union(changed);
            }
            None => {
                self.pending.insert(row, (dirty.clone(), changed.clone()));
                self.queue.push_back(row);
            }
        }
    }

    fn pop(&mut self) -> Option<(RowId, ColumnSet, ColumnSet)> {
        let row = self.queue.pop_front()?;
        let (dirty, changed) = self.pending.remove(&row).unwrap_or_default();
        Some((row, dirty, changed))
    }
}

/// `dirty` plus every computed column on the same model that depends on
/// `dirty ∪ changed`, transitively.
fn sibling_closure(schema: &Schema, dirty: &ColumnSet, changed: &ColumnSet) -> ColumnSet {
    let manager = schema.computations();
    let mut closure = dirty.clone();
    let mut frontier = dirty.union(changed);
    loop {
        let next: ColumnSet = manager
            .sibling_computation_columns(&frontier)
            .iter()
            .filter(|c| !closure.contains(c))
            .collect();
        if next.is_empty() {
            return closure;
        }
        closure = closure.union(&next);
        frontier = next;
    }
}

impl DataSet {
    /// Re-evaluate every computed column of `row` and its descendants, then
    /// the ancestor aggregates that read them.
    pub fn refresh_computations(&mut self, row: RowId) -> Result<()> {
        let schema = Arc::clone(&self.schema);
        let mut cascade = Cascade::default();
        let empty = ColumnSet::empty();

        let subtree = self.subtree_post_order(row)?;
        let mut models = Vec::new();
        for &r in &subtree {
            let model = self.row_model(r)?;
            if !models.contains(&model) {
                models.push(model);
            }
            cascade.enqueue(r, schema.model(model)?.computation_columns(), &empty);
        }
        if let Some(parent) = self.parent_row(row)? {
            self.queue_ancestor_aggregates(&schema, &mut cascade, parent, &models)?;
        }
        self.run(&schema, cascade)
    }

    /// Refresh aggregates on `row` and its ancestors that read any of `models`.
    pub(crate) fn refresh_ancestor_aggregates(&mut self, row: RowId, models: &[ModelId]) -> Result<()> {
        let schema = Arc::clone(&self.schema);
        let mut cascade = Cascade::default();
        self.queue_ancestor_aggregates(&schema, &mut cascade, row, models)?;
        self.run(&schema, cascade)
    }

    /// Propagate a write of `column` on `row`.
    pub(crate) fn cascade(&mut self, row: RowId, column: ColumnId) -> Result<()> {
        let schema = Arc::clone(&self.schema);
        let mut cascade = Cascade::default();
        cascade.enqueue(row, &ColumnSet::empty(), &ColumnSet::of(column));
        self.run(&schema, cascade)
    }

    fn queue_ancestor_aggregates(
        &self,
        schema: &Schema,
        cascade: &mut Cascade,
        row: RowId,
        models: &[ModelId],
    ) -> Result<()> {
        let empty = ColumnSet::empty();
        for &model in models {
            for (ancestor, columns) in schema.computations().aggregate_computation_columns(schema, model)? {
                if let Some(target) = self.ancestor_row(row, ancestor)? {
                    cascade.enqueue(target, &columns, &empty);
                }
            }
        }
        Ok(())
    }

    fn run(&mut self, schema: &Schema, mut cascade: Cascade) -> Result<()> {
        let manager = schema.computations();
        let empty = ColumnSet::empty();
        let mut evaluated = 0usize;

        while let Some((row, dirty, changed)) = cascade.pop() {
            if !self.contains(row) {
                continue;
            }
            let model = self.row_model(row)?;
            let closure = sibling_closure(schema, &dirty, &changed);

            // Ancestors first, so that columns reading a stale ancestor
            // value can wait for it below.
            let touched = changed.union(&closure);
            let dependents = manager.non_sibling_computation_columns(&touched);
            for (dependent_model, columns) in &dependents {
                if schema.is_ancestor(*dependent_model, model)? {
                    if let Some(target) = self.ancestor_row(row, *dependent_model)? {
                        cascade.enqueue(target, columns, &empty);
                    }
                }
            }

            let mut deferred = ColumnSet::empty();
            for column in manager.computation_order(schema, model, &closure)? {
                if self.waits_on_ancestor(schema, &cascade, row, column, &deferred)? {
                    deferred = deferred.add(column);
                    continue;
                }
                self.evaluate_computation(schema, row, column)?;
                evaluated += 1;
            }
            trace!(%row, columns = closure.len(), deferred = deferred.len(), "refreshed row");

            let settled: ColumnSet = touched.iter().filter(|c| !deferred.contains(c)).collect();
            for (dependent_model, columns) in manager.non_sibling_computation_columns(&settled) {
                if schema.is_ancestor(model, dependent_model)? {
                    for target in self.descendant_rows(row, dependent_model)? {
                        cascade.enqueue(target, &columns, &empty);
                    }
                }
            }
        }

        if evaluated > 0 {
            debug!(evaluated, "refresh cascade finished");
        }
        Ok(())
    }

    /// True when `column` reads a column that is still pending on an
    /// ancestor row, or a sibling already deferred on this row. The ancestor's
    /// refresh queues `column` again once the value is current.
    fn waits_on_ancestor(
        &self,
        schema: &Schema,
        cascade: &Cascade,
        row: RowId,
        column: ColumnId,
        deferred: &ColumnSet,
    ) -> Result<bool> {
        let Some(expression) = schema.column(column)?.computation() else {
            return Ok(false);
        };
        for base in schema.base_columns(expression)?.iter() {
            if deferred.contains(&base) {
                return Ok(true);
            }
            let Some(base_model) = schema.column(base)?.model() else {
                continue;
            };
            let Some(target) = self.ancestor_row(row, base_model)? else {
                continue;
            };
            if target == row {
                continue;
            }
            if let Some((dirty, changed)) = cascade.pending.get(&target) {
                if sibling_closure(schema, dirty, changed).contains(&base) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    fn evaluate_computation(&mut self, schema: &Schema, row: RowId, column: ColumnId) -> Result<()> {
        let def = schema.column(column)?;
        let (Some(expression), Some(ordinal)) = (def.computation(), def.ordinal()) else {
            return Ok(());
        };
        let value = Evaluator::in_row(self, row).column(expression)?;
        self.store(row, ordinal, value)
    }

    fn subtree_post_order(&self, row: RowId) -> Result<Vec<RowId>> {
        let mut order = Vec::new();
        let mut stack = vec![(row, false)];
        while let Some((r, expanded)) = stack.pop() {
            if expanded {
                order.push(r);
                continue;
            }
            stack.push((r, true));
            for children in self.row(r)?.children.values().rev() {
                stack.extend(children.iter().rev().map(|c| (*c, false)));
            }
        }
        Ok(order)
    }
}
