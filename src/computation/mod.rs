//! Computation dependency index.
//!
//! Maps every base column read by a computation to the computed columns that
//! depend on it, grouped by the dependent's model. The index answers three
//! questions that drive row refresh:
//!
//! - which computed columns on the *same* model depend on a set of columns
//!   ([`sibling_computation_columns`](ComputationManager::sibling_computation_columns)),
//! - which computed columns on *other* models depend on them
//!   ([`non_sibling_computation_columns`](ComputationManager::non_sibling_computation_columns)),
//! - which ancestor aggregates a descendant model feeds
//!   ([`aggregate_computation_columns`](ComputationManager::aggregate_computation_columns)).
//!
//! Edges are recorded at the first hop only: for `c = f(b)` the edge is
//! `b → c` even when `b` is itself computed. Recursion through computed base
//! columns exists to detect cycles, not to close the relation transitively.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::model::{ColumnId, ColumnSet, ModelId, Schema};

/// Dependents of one base column.
#[derive(Debug, Clone)]
struct BaseEntry {
    /// Model owning the base column.
    model: ModelId,
    /// Computed dependents keyed by their model.
    dependents: BTreeMap<ModelId, ColumnSet>,
}

#[derive(Debug, Clone, Default)]
pub struct ComputationIndex {
    dependents: BTreeMap<ColumnId, BaseEntry>,
    base_columns: BTreeMap<ModelId, ColumnSet>,
}

/// Copy-on-write dependency index.
///
/// `Empty` is the shared starting point; the first merge promotes it to a
/// populated index. Every merge produces a new manager and leaves the
/// receiver untouched.
#[derive(Debug, Clone, Default)]
pub enum ComputationManager {
    #[default]
    Empty,
    Populated(Box<ComputationIndex>),
}

impl ComputationManager {
    fn index(&self) -> Option<&ComputationIndex> {
        match self {
            ComputationManager::Empty => None,
            ComputationManager::Populated(index) => Some(index),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.index().map_or(true, |i| i.dependents.is_empty())
    }

    /// Merge the computations of `columns` into a new manager.
    ///
    /// Each column must be a model column with a computation registered on
    /// the schema. Fails with `CircularComputation` when a column depends on
    /// itself through any chain of computed base columns.
    pub fn merge(&self, schema: &Schema, columns: &ColumnSet) -> Result<ComputationManager> {
        let mut index = self.index().cloned().unwrap_or_default();

        for computed in columns.iter() {
            let column = schema.column(computed)?;
            let invalid = |reason: &str| Error::InvalidComputation {
                column: column.name().to_string(),
                reason: reason.into(),
            };
            let model = column.model().ok_or_else(|| invalid("not a model column"))?;
            let expression = column.computation().ok_or_else(|| invalid("no computation registered"))?;

            index.forget(computed);
            let mut visited = BTreeSet::new();
            index.add_computation(schema, computed, model, expression, true, &mut visited)?;
            trace!(column = %schema.qualified_name(computed)?, "merged computation");
        }

        index.seal();
        debug!(
            merged = columns.len(),
            base_columns = index.dependents.len(),
            "computation index rebuilt"
        );
        Ok(ComputationManager::Populated(Box::new(index)))
    }

    /// Computed columns on the same model as each of `columns`.
    pub fn sibling_computation_columns(&self, columns: &ColumnSet) -> ColumnSet {
        let Some(index) = self.index() else {
            return ColumnSet::empty().sealed();
        };
        let mut result = ColumnSet::empty();
        for base in columns.iter() {
            if let Some(entry) = index.dependents.get(&base) {
                if let Some(set) = entry.dependents.get(&entry.model) {
                    result = result.union(set);
                }
            }
        }
        result.sealed()
    }

    /// Computed columns on other models than each of `columns`, by model.
    pub fn non_sibling_computation_columns(&self, columns: &ColumnSet) -> BTreeMap<ModelId, ColumnSet> {
        let mut result: BTreeMap<ModelId, ColumnSet> = BTreeMap::new();
        let Some(index) = self.index() else {
            return result;
        };
        for base in columns.iter() {
            let Some(entry) = index.dependents.get(&base) else {
                continue;
            };
            for (&model, set) in &entry.dependents {
                if model != entry.model {
                    let merged = result.get(&model).map_or_else(|| set.clone(), |s| s.union(set));
                    result.insert(model, merged);
                }
            }
        }
        seal_all(&mut result);
        result
    }

    /// Computed columns on strict ancestors of `model` that read a column of
    /// `model`, by ancestor.
    pub fn aggregate_computation_columns(
        &self,
        schema: &Schema,
        model: ModelId,
    ) -> Result<BTreeMap<ModelId, ColumnSet>> {
        let mut result: BTreeMap<ModelId, ColumnSet> = BTreeMap::new();
        let Some(index) = self.index() else {
            return Ok(result);
        };
        let Some(bases) = index.base_columns.get(&model) else {
            return Ok(result);
        };
        for base in bases.iter() {
            let Some(entry) = index.dependents.get(&base) else {
                continue;
            };
            for (&dependent_model, set) in &entry.dependents {
                if schema.is_ancestor(dependent_model, model)? {
                    let merged = result
                        .get(&dependent_model)
                        .map_or_else(|| set.clone(), |s| s.union(set));
                    result.insert(dependent_model, merged);
                }
            }
        }
        seal_all(&mut result);
        Ok(result)
    }

    /// Order `columns` of `model` so that every computed column comes after
    /// the sibling computed columns it reads.
    pub fn computation_order(&self, schema: &Schema, model: ModelId, columns: &ColumnSet) -> Result<Vec<ColumnId>> {
        let Some(index) = self.index() else {
            return Ok(columns.iter().collect());
        };

        let mut graph: DiGraph<ColumnId, ()> = DiGraph::new();
        let nodes: HashMap<ColumnId, NodeIndex> = columns.iter().map(|c| (c, graph.add_node(c))).collect();
        for base in columns.iter() {
            let Some(set) = index.dependents.get(&base).and_then(|e| e.dependents.get(&model)) else {
                continue;
            };
            for dependent in set.iter() {
                if let Some(&to) = nodes.get(&dependent) {
                    graph.add_edge(nodes[&base], to, ());
                }
            }
        }

        match toposort(&graph, None) {
            Ok(order) => Ok(order.into_iter().map(|n| graph[n]).collect()),
            Err(cycle) => {
                let column = graph[cycle.node_id()];
                warn!(column = %schema.qualified_name(column)?, "cycle in computation order");
                Err(Error::CircularComputation {
                    column: schema.qualified_name(column)?,
                })
            }
        }
    }

    /// Computed columns that read `base` directly, by model.
    pub fn dependents_of(&self, base: ColumnId) -> Option<&BTreeMap<ModelId, ColumnSet>> {
        self.index()?.dependents.get(&base).map(|e| &e.dependents)
    }

    /// Base columns of `model` that feed any computation.
    pub fn base_columns(&self, model: ModelId) -> Option<&ColumnSet> {
        self.index()?.base_columns.get(&model)
    }
}

impl ComputationIndex {
    fn add_computation(
        &mut self,
        schema: &Schema,
        computed: ColumnId,
        model: ModelId,
        expression: ColumnId,
        add_dependency: bool,
        visited: &mut BTreeSet<ColumnId>,
    ) -> Result<()> {
        for base in schema.base_columns(expression)?.iter() {
            if base == computed {
                warn!(column = %schema.qualified_name(computed)?, "circular computation");
                return Err(Error::CircularComputation {
                    column: schema.qualified_name(computed)?,
                });
            }
            let base_column = schema.column(base)?;
            if add_dependency {
                if let Some(base_model) = base_column.model() {
                    self.add_edge(base, base_model, computed, model);
                }
            }
            if !visited.insert(base) {
                continue;
            }
            if let Some(next) = base_column.computation() {
                self.add_computation(schema, computed, model, next, false, visited)?;
            }
        }
        Ok(())
    }

    fn add_edge(&mut self, base: ColumnId, base_model: ModelId, computed: ColumnId, model: ModelId) {
        let entry = self.dependents.entry(base).or_insert_with(|| BaseEntry {
            model: base_model,
            dependents: BTreeMap::new(),
        });
        let set = entry.dependents.entry(model).or_default();
        *set = set.add(computed);

        let bases = self.base_columns.entry(base_model).or_default();
        *bases = bases.add(base);
    }

    /// Drop every edge into `computed` before its computation is re-merged.
    fn forget(&mut self, computed: ColumnId) {
        for entry in self.dependents.values_mut() {
            for set in entry.dependents.values_mut() {
                if set.contains(&computed) {
                    *set = set.iter().filter(|c| *c != computed).collect();
                }
            }
            entry.dependents.retain(|_, set| !set.is_empty());
        }
        self.dependents.retain(|_, entry| !entry.dependents.is_empty());
        let live: BTreeSet<ColumnId> = self.dependents.keys().copied().collect();
        for bases in self.base_columns.values_mut() {
            if bases.iter().any(|b| !live.contains(&b)) {
                *bases = bases.iter().filter(|b| live.contains(b)).collect();
            }
        }
        self.base_columns.retain(|_, bases| !bases.is_empty());
    }

    fn seal(&mut self) {
        for entry in self.dependents.values_mut() {
            for set in entry.dependents.values_mut() {
                set.seal();
            }
        }
        for bases in self.base_columns.values_mut() {
            bases.seal();
        }
    }
}

fn seal_all(map: &mut BTreeMap<ModelId, ColumnSet>) {
    for set in map.values_mut() {
        set.seal();
    }
}
