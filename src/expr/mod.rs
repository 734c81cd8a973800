//! Column expression AST.
//!
//! Every expression node is owned by exactly one free expression column and
//! refers to its operands by [`ColumnId`]. A node supports two evaluation
//! strategies that must stay observably consistent:
//!
//! - **In-memory**: [`Schema::eval`] (no row) and
//!   [`DataSet::eval`](crate::data::DataSet::eval) (against a row).
//! - **SQL lowering**: [`Schema::db_expression`] produces a portable
//!   [`DbExpression`](crate::sql::DbExpression) tree.
//!
//! Nodes are immutable after construction. Re-targeting an expression to a
//! parallel model goes through [`ColumnExpression::map_operands`], which
//! rebuilds the node explicitly for each variant.

pub mod aggregate;
mod builder;
mod counterpart;
mod eval;
mod lower;

use std::fmt;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{ColumnId, ModelSet, Schema};
use crate::value::{DataType, Value};

pub use aggregate::{Accumulator, AggregateKind};
pub use builder::{CaseBuilder, CaseOnBuilder};
pub(crate) use eval::Evaluator;

// =============================================================================
// Node kinds
// =============================================================================

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryKind {
    Negate,
    Not,
    OnesComplement,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryKind {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    // Comparison
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    // Logical
    And,
    Or,
    // Bitwise
    BitwiseAnd,
    BitwiseOr,
    ExclusiveOr,
}

impl BinaryKind {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryKind::Equal
                | BinaryKind::NotEqual
                | BinaryKind::LessThan
                | BinaryKind::LessThanOrEqual
                | BinaryKind::GreaterThan
                | BinaryKind::GreaterThanOrEqual
        )
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryKind::And | BinaryKind::Or)
    }

    pub fn is_bitwise(&self) -> bool {
        matches!(
            self,
            BinaryKind::BitwiseAnd | BinaryKind::BitwiseOr | BinaryKind::ExclusiveOr
        )
    }
}

/// Scalar functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FunctionKey {
    IsNull,
    IsNotNull,
    IfNull,
    Length,
    Upper,
    Lower,
    Trim,
    Abs,
    Contains,
}

impl FunctionKey {
    pub fn arity(&self) -> usize {
        match self {
            FunctionKey::IfNull | FunctionKey::Contains => 2,
            _ => 1,
        }
    }
}

macro_rules! name_table {
    ($ty:ty { $($variant:ident),* $(,)? }) => {
        impl $ty {
            /// Stable name used for persistence.
            pub fn name(&self) -> &'static str {
                match self {
                    $(Self::$variant => stringify!($variant),)*
                }
            }

            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $(stringify!($variant) => Some(Self::$variant),)*
                    _ => None,
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

name_table!(UnaryKind { Negate, Not, OnesComplement });
name_table!(BinaryKind {
    Add, Subtract, Multiply, Divide, Modulo, Equal, NotEqual, LessThan, LessThanOrEqual,
    GreaterThan, GreaterThanOrEqual, And, Or, BitwiseAnd, BitwiseOr, ExclusiveOr,
});
name_table!(FunctionKey { IsNull, IsNotNull, IfNull, Length, Upper, Lower, Trim, Abs, Contains });
name_table!(AggregateKind { Sum, Count, Average, Min, Max, First, Last });

/// The shape of an expression node.
///
/// Every variant must be handled in evaluation, lowering, operand mapping
/// and JSON conversion - the compiler enforces this.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Embedded literal.
    Constant(Value),

    /// Literal plus the column it was taken from.
    Param {
        value: Value,
        source: Option<ColumnId>,
    },

    Unary {
        kind: UnaryKind,
        operand: ColumnId,
    },

    Binary {
        kind: BinaryKind,
        left: ColumnId,
        right: ColumnId,
    },

    /// Conversion to the node's data type.
    Cast {
        operand: ColumnId,
        source_type: DataType,
    },

    /// CASE WHEN cond THEN value ... ELSE value END. First match wins.
    Case {
        when_then: Vec<(ColumnId, ColumnId)>,
        else_: ColumnId,
    },

    /// CASE on WHEN value THEN value ... ELSE value END, by equality.
    CaseOn {
        on: ColumnId,
        when_then: Vec<(ColumnId, ColumnId)>,
        else_: ColumnId,
    },

    Function {
        key: FunctionKey,
        params: Vec<ColumnId>,
    },

    Aggregate {
        kind: AggregateKind,
        param: ColumnId,
    },
}

// =============================================================================
// Expression node
// =============================================================================

/// A typed expression node.
#[derive(Debug, Clone)]
pub struct ColumnExpression {
    kind: ExprKind,
    data_type: DataType,
    owner: OnceLock<ColumnId>,
    parent_models: OnceLock<ModelSet>,
    aggregate_models: OnceLock<ModelSet>,
}

impl ColumnExpression {
    /// Create an unowned node. Type rules are enforced by the schema
    /// builders, which are the only public way to attach a node.
    pub(crate) fn new(kind: ExprKind, data_type: DataType) -> Self {
        Self {
            kind,
            data_type,
            owner: OnceLock::new(),
            parent_models: OnceLock::new(),
            aggregate_models: OnceLock::new(),
        }
    }

    pub fn kind(&self) -> &ExprKind {
        &self.kind
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// The column that owns this node, once attached.
    pub fn owner(&self) -> Option<ColumnId> {
        self.owner.get().copied()
    }

    /// Record the owning column. Returns the existing owner on failure.
    pub(crate) fn set_owner(&self, owner: ColumnId) -> std::result::Result<(), ColumnId> {
        self.owner.set(owner).map_err(|_| self.owner().unwrap_or(owner))
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self.kind, ExprKind::Aggregate { .. })
    }

    /// Operand columns in declaration order.
    pub fn operands(&self) -> Vec<ColumnId> {
        match &self.kind {
            ExprKind::Constant(_) => Vec::new(),
            ExprKind::Param { .. } => Vec::new(),
            ExprKind::Unary { operand, .. } | ExprKind::Cast { operand, .. } => vec![*operand],
            ExprKind::Binary { left, right, .. } => vec![*left, *right],
            ExprKind::Case { when_then, else_ } => when_then
                .iter()
                .flat_map(|(w, t)| [*w, *t])
                .chain(std::iter::once(*else_))
                .collect(),
            ExprKind::CaseOn {
                on,
                when_then,
                else_,
            } => std::iter::once(*on)
                .chain(when_then.iter().flat_map(|(w, t)| [*w, *t]))
                .chain(std::iter::once(*else_))
                .collect(),
            ExprKind::Function { params, .. } => params.clone(),
            ExprKind::Aggregate { param, .. } => vec![*param],
        }
    }

    /// Rebuild this node with every operand passed through `f`.
    ///
    /// The result is a fresh, unowned node. A param's provenance column is
    /// not an operand and is kept as is.
    pub fn map_operands<F>(&self, mut f: F) -> Result<ColumnExpression>
    where
        F: FnMut(ColumnId) -> Result<ColumnId>,
    {
        let kind = match &self.kind {
            ExprKind::Constant(value) => ExprKind::Constant(value.clone()),
            ExprKind::Param { value, source } => ExprKind::Param {
                value: value.clone(),
                source: *source,
            },
            ExprKind::Unary { kind, operand } => ExprKind::Unary {
                kind: *kind,
                operand: f(*operand)?,
            },
            ExprKind::Binary { kind, left, right } => {
                let left = f(*left)?;
                ExprKind::Binary {
                    kind: *kind,
                    left,
                    right: f(*right)?,
                }
            }
            ExprKind::Cast {
                operand,
                source_type,
            } => ExprKind::Cast {
                operand: f(*operand)?,
                source_type: *source_type,
            },
            ExprKind::Case { when_then, else_ } => {
                let when_then = map_pairs(when_then, &mut f)?;
                ExprKind::Case {
                    when_then,
                    else_: f(*else_)?,
                }
            }
            ExprKind::CaseOn {
                on,
                when_then,
                else_,
            } => {
                let on = f(*on)?;
                let when_then = map_pairs(when_then, &mut f)?;
                ExprKind::CaseOn {
                    on,
                    when_then,
                    else_: f(*else_)?,
                }
            }
            ExprKind::Function { key, params } => ExprKind::Function {
                key: *key,
                params: params.iter().map(|p| f(*p)).collect::<Result<_>>()?,
            },
            ExprKind::Aggregate { kind, param } => ExprKind::Aggregate {
                kind: *kind,
                param: f(*param)?,
            },
        };
        Ok(ColumnExpression::new(kind, self.data_type))
    }

    /// Models required to evaluate this node per row. Computed once.
    pub fn parent_model_set(&self, schema: &Schema) -> Result<ModelSet> {
        if let Some(set) = self.parent_models.get() {
            return Ok(set.clone());
        }
        let set = match &self.kind {
            // An aggregate is never evaluated per row; it reduces over its param.
            ExprKind::Aggregate { .. } => ModelSet::empty(),
            _ => {
                let mut set = ModelSet::empty();
                for operand in self.operands() {
                    set = set.union(&schema.parent_model_set(operand)?);
                }
                set
            }
        }
        .sealed();
        Ok(self.parent_models.get_or_init(|| set).clone())
    }

    /// Models this node aggregates over. Computed once.
    pub fn aggregate_model_set(&self, schema: &Schema) -> Result<ModelSet> {
        if let Some(set) = self.aggregate_models.get() {
            return Ok(set.clone());
        }
        let set = match &self.kind {
            ExprKind::Aggregate { param, .. } => schema.parent_model_set(*param)?,
            _ => {
                let mut set = ModelSet::empty();
                for operand in self.operands() {
                    set = set.union(&schema.aggregate_model_set(operand)?);
                }
                set
            }
        }
        .sealed();
        Ok(self.aggregate_models.get_or_init(|| set).clone())
    }
}

fn map_pairs<F>(pairs: &[(ColumnId, ColumnId)], f: &mut F) -> Result<Vec<(ColumnId, ColumnId)>>
where
    F: FnMut(ColumnId) -> Result<ColumnId>,
{
    pairs.iter().map(|(w, t)| Ok((f(*w)?, f(*t)?))).collect()
}

/// Structural equality; ownership and caches are not part of a node's value.
impl PartialEq for ColumnExpression {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.data_type == other.data_type
    }
}
