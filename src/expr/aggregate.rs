//! Aggregate functions over a parent row's descendant rows.
//!
//! Evaluation is a three-phase protocol on an [`Accumulator`]:
//! `init`, one `accumulate` per leaf row in scope, then `finish`. The scope
//! is the chain of models between the evaluating row's model and the model
//! that owns the aggregated column.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::data::DataSetChain;
use crate::error::{Error, Result};
use crate::model::{ColumnId, ModelId, Schema};
use crate::value::{DataType, Value};

use super::Evaluator;

/// Aggregate functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregateKind {
    Sum,
    Count,
    Average,
    Min,
    Max,
    First,
    Last,
}

/// Running state of one aggregate evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum Accumulator {
    Sum(Value),
    Count(i64),
    Average { total: f64, count: i64 },
    Min(Value),
    Max(Value),
    First(Value),
    Last(Value),
}

impl Accumulator {
    /// Reset state for `kind` over values of `data_type`.
    pub fn init(kind: AggregateKind, data_type: DataType) -> Self {
        match kind {
            AggregateKind::Sum => Accumulator::Sum(match data_type {
                DataType::Double => Value::Double(0.0),
                _ => Value::Int64(0),
            }),
            AggregateKind::Count => Accumulator::Count(0),
            AggregateKind::Average => Accumulator::Average { total: 0.0, count: 0 },
            AggregateKind::Min => Accumulator::Min(Value::Null),
            AggregateKind::Max => Accumulator::Max(Value::Null),
            AggregateKind::First => Accumulator::First(Value::Null),
            AggregateKind::Last => Accumulator::Last(Value::Null),
        }
    }

    /// Fold one value in. Nulls are skipped.
    pub fn accumulate(&mut self, value: Value) -> Result<()> {
        if value.is_null() {
            return Ok(());
        }
        match self {
            Accumulator::Sum(total) => {
                *total = match (&*total, &value) {
                    (Value::Int64(a), Value::Int64(b)) => Value::Int64(a.checked_add(*b).ok_or_else(|| {
                        Error::InvalidOperation("integer overflow in Sum".into())
                    })?),
                    (a, b) => Value::Double(a.as_f64().unwrap_or(0.0) + b.as_f64().unwrap_or(0.0)),
                };
            }
            Accumulator::Count(n) => *n += 1,
            Accumulator::Average { total, count } => {
                *total += value.as_f64().ok_or_else(|| Error::InvalidOperation(format!(
                    "cannot average non-numeric value '{}'",
                    value
                )))?;
                *count += 1;
            }
            Accumulator::Min(current) => {
                if current.is_null() || compare(&value, current)? == Ordering::Less {
                    *current = value;
                }
            }
            Accumulator::Max(current) => {
                if current.is_null() || compare(&value, current)? == Ordering::Greater {
                    *current = value;
                }
            }
            Accumulator::First(current) => {
                if current.is_null() {
                    *current = value;
                }
            }
            Accumulator::Last(current) => *current = value,
        }
        Ok(())
    }

    /// Produce the final value.
    pub fn finish(self) -> Value {
        match self {
            Accumulator::Sum(v)
            | Accumulator::Min(v)
            | Accumulator::Max(v)
            | Accumulator::First(v)
            | Accumulator::Last(v) => v,
            Accumulator::Count(n) => Value::Int64(n),
            Accumulator::Average { total, count } => {
                if count == 0 {
                    Value::Null
                } else {
                    Value::Double(total / count as f64)
                }
            }
        }
    }
}

/// Order over non-null values of the same type. Doubles compare as SQL does:
/// `-0.0` equals `0.0`, and NaN is not comparable.
pub(crate) fn compare(a: &Value, b: &Value) -> Result<Ordering> {
    let ordering = match (a, b) {
        (Value::Boolean(x), Value::Boolean(y)) => x.cmp(y),
        (Value::Int64(x), Value::Int64(y)) => x.cmp(y),
        (Value::Double(x), Value::Double(y)) => x.partial_cmp(y).ok_or_else(|| {
            Error::InvalidOperation(format!("cannot compare '{}' with '{}'", a, b))
        })?,
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => {
            return Err(Error::InvalidOperation(format!(
                "cannot compare '{}' with '{}'",
                a, b
            )))
        }
    };
    Ok(ordering)
}

/// Models between `row_model` (exclusive) and the aggregated column's model
/// (inclusive), ordered from the shallowest down.
pub(crate) fn resolve_chain(
    schema: &Schema,
    aggregate: ColumnId,
    param: ColumnId,
    row_model: ModelId,
) -> Result<Vec<ModelId>> {
    let scope_error = || -> Result<Error> {
        Ok(Error::AggregateScope {
            column: schema.qualified_name(aggregate)?,
            model: schema.model(row_model)?.name().to_string(),
        })
    };

    let mut deepest: Option<(usize, ModelId)> = None;
    for m in schema.parent_model_set(param)?.iter() {
        let depth = schema.model(m)?.depth();
        if deepest.map_or(true, |(d, _)| depth > d) {
            deepest = Some((depth, m));
        }
    }
    let leaf = match deepest {
        Some((_, leaf)) if leaf != row_model => leaf,
        _ => return Err(scope_error()?),
    };

    let mut chain = Vec::new();
    let mut current = Some(leaf);
    while let Some(m) = current {
        if m == row_model {
            chain.reverse();
            return Ok(chain);
        }
        chain.push(m);
        current = schema.model(m)?.parent();
    }
    Err(scope_error()?)
}

impl Evaluator<'_> {
    /// Evaluate `kind(param)` for the current row's descendants.
    pub(crate) fn aggregate(
        &self,
        owner: ColumnId,
        kind: AggregateKind,
        param: ColumnId,
    ) -> Result<Value> {
        let Some(scope) = self.scope() else {
            return Err(Error::InvalidOperation(format!(
                "aggregate '{}' requires materialized data rows",
                self.schema().qualified_name(owner)?
            )));
        };
        let row_model = scope.data.row_model(scope.row)?;
        let chain = resolve_chain(self.schema(), owner, param, row_model)?;

        let param_type = self.schema().column(param)?.data_type();
        let mut accumulator = Accumulator::init(kind, param_type);
        for leaf in DataSetChain::new(scope.data, scope.row, &chain).rows()? {
            let value = self.with_row(leaf).column(param)?;
            accumulator.accumulate(value)?;
        }
        Ok(accumulator.finish())
    }
}
