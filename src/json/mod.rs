//! JSON persistence for columns and expression trees.
//!
//! ```json
//! {"TypeId": "Int64Column", "Expression": {
//!     "TypeId": "BinaryExpression", "ArgTypeIds": ["Int64", "Int64"],
//!     "Kind": "Add",
//!     "Left":  {"TypeId": "Int64Column", "Name": "Order.Amount"},
//!     "Right": {"TypeId": "Int64Column", "Expression": {
//!         "TypeId": "ConstantExpression", "ArgTypeIds": ["Int64"], "Value": 1}}}}
//! ```
//!
//! Model columns persist by qualified name and must exist in the schema
//! that parses them. Expression columns persist their whole tree, which is
//! rebuilt bottom-up through the typed constructors on parse. Writing a
//! parsed column yields the original text.

mod converters;
mod reader;
mod registry;
mod writer;

use serde_json::Value as JsonValue;

use crate::config::JsonSettings;
use crate::error::{JsonError, Result};
use crate::model::{Col, ColumnId, Schema};
use crate::value::ColumnType;

pub use converters::{
    AggregateFunctionExpression, BinaryExpression, CaseExpression, CaseOnExpression, CastExpression,
    ConstantExpression, FunctionExpression, ParamExpression, UnaryExpression,
};
pub use reader::{JsonPath, Node, Reader};
pub use registry::{column_type_id, register_defaults, type_id_of, ConverterEntry, ConverterRegistry, ExpressionConverter};

/// Serialize `column` to a JSON value.
pub fn to_json_value(schema: &Schema, column: impl Into<ColumnId>) -> Result<JsonValue> {
    writer::write_column(schema, column.into())
}

/// Serialize `column` to JSON text.
pub fn to_json(schema: &Schema, column: impl Into<ColumnId>, pretty: bool) -> Result<String> {
    let value = to_json_value(schema, column)?;
    let text = if pretty {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    };
    Ok(text.map_err(JsonError::from)?)
}

/// Serialize `column` using the configured layout.
pub fn to_json_with(schema: &Schema, column: impl Into<ColumnId>, settings: &JsonSettings) -> Result<String> {
    to_json(schema, column, settings.pretty)
}

/// Parse a column from JSON text, adding any expression columns to
/// `schema`. Registers the default converters on first use.
pub fn parse_column(schema: &mut Schema, text: &str) -> Result<ColumnId> {
    let value: JsonValue = serde_json::from_str(text).map_err(JsonError::from)?;
    parse_column_value(schema, &value)
}

/// Parse a column from an already decoded JSON value.
pub fn parse_column_value(schema: &mut Schema, value: &JsonValue) -> Result<ColumnId> {
    register_defaults();
    Reader::new(schema).column(value, &JsonPath::root())
}

/// Parse a column and check it against `T`.
pub fn parse<T: ColumnType>(schema: &mut Schema, text: &str) -> Result<Col<T>> {
    let id = parse_column(schema, text)?;
    Col::from_id(schema, id)
}
