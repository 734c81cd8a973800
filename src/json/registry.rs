//! Type-id converter registry.
//!
//! Every persisted node carries a `TypeId`. Parsing looks the id up here
//! and hands the node to the registered converter. Ids default to the
//! converter's type name without its module path; column ids are explicit
//! (`Int64Column` and friends).

use std::any::type_name;
use std::sync::{Arc, LazyLock, Once};

use dashmap::DashMap;
use tracing::debug;

use crate::error::Result;
use crate::model::ColumnId;
use crate::value::DataType;

use super::converters::{
    AggregateFunctionExpression, BinaryExpression, CaseExpression, CaseOnExpression, CastExpression,
    ConstantExpression, FunctionExpression, ParamExpression, UnaryExpression,
};
use super::reader::{Node, Reader};

/// Rebuilds one kind of expression node.
pub trait ExpressionConverter: Send + Sync {
    /// Number of entries expected in `ArgTypeIds`.
    fn arity(&self) -> usize;

    /// Rebuild the node. `node.args` already has `arity()` entries.
    fn read(&self, reader: &mut Reader<'_>, node: &Node<'_>) -> Result<ColumnId>;
}

/// What a type id resolves to.
#[derive(Clone)]
pub enum ConverterEntry {
    /// A column of the given type.
    Column(DataType),
    Expression(Arc<dyn ExpressionConverter>),
}

impl std::fmt::Debug for ConverterEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConverterEntry::Column(data_type) => write!(f, "Column({})", data_type),
            ConverterEntry::Expression(converter) => write!(f, "Expression(arity {})", converter.arity()),
        }
    }
}

/// Process-wide map from type id to converter.
pub struct ConverterRegistry {
    entries: DashMap<String, ConverterEntry>,
}

static REGISTRY: LazyLock<ConverterRegistry> = LazyLock::new(|| ConverterRegistry {
    entries: DashMap::new(),
});

static DEFAULTS: Once = Once::new();

impl ConverterRegistry {
    /// The global registry.
    pub fn global() -> &'static ConverterRegistry {
        &REGISTRY
    }

    /// Register `entry` under `type_id`, replacing any previous entry.
    pub fn register(&self, type_id: impl Into<String>, entry: ConverterEntry) {
        let type_id = type_id.into();
        debug!(type_id = %type_id, ?entry, "registered converter");
        self.entries.insert(type_id, entry);
    }

    /// Register a converter under its type name.
    pub fn register_type<C>(&self, converter: C)
    where
        C: ExpressionConverter + 'static,
    {
        self.register(type_id_of::<C>(), ConverterEntry::Expression(Arc::new(converter)));
    }

    /// The entry for `type_id`. The returned entry is detached from the map.
    pub fn lookup(&self, type_id: &str) -> Option<ConverterEntry> {
        self.entries.get(type_id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Register the built-in column and expression converters.
///
/// Call once at startup; repeated calls are no-ops.
pub fn register_defaults() {
    DEFAULTS.call_once(|| {
        let registry = ConverterRegistry::global();
        for data_type in [DataType::Boolean, DataType::Int64, DataType::Double, DataType::String] {
            registry.register(column_type_id(data_type), ConverterEntry::Column(data_type));
        }
        registry.register_type(ConstantExpression);
        registry.register_type(ParamExpression);
        registry.register_type(UnaryExpression);
        registry.register_type(BinaryExpression);
        registry.register_type(CastExpression);
        registry.register_type(CaseExpression);
        registry.register_type(CaseOnExpression);
        registry.register_type(FunctionExpression);
        registry.register_type(AggregateFunctionExpression);
        debug!(entries = registry.len(), "default converters registered");
    });
}

/// The type id of `T`: its type name without module path or generics.
pub fn type_id_of<T: ?Sized>() -> &'static str {
    let name = type_name::<T>();
    let name = name.split('<').next().unwrap_or(name);
    name.rsplit("::").next().unwrap_or(name)
}

/// `Int64Column` for [`DataType::Int64`], and so on.
pub fn column_type_id(data_type: DataType) -> String {
    format!("{}Column", data_type.type_id())
}
