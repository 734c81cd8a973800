//! Rebuilding columns and expressions from parsed JSON.

use std::fmt;

use serde_json::{Map, Value as JsonValue};

use crate::error::{Error, JsonError, Result};
use crate::model::{ColumnId, Schema};
use crate::value::{DataType, Value};

use super::registry::{ConverterEntry, ConverterRegistry};

/// Location of a node within the document, e.g. `$.Expression.Left`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPath(String);

impl JsonPath {
    pub fn root() -> Self {
        JsonPath("$".into())
    }

    pub fn field(&self, name: &str) -> Self {
        JsonPath(format!("{}.{}", self.0, name))
    }

    pub fn index(&self, index: usize) -> Self {
        JsonPath(format!("{}[{}]", self.0, index))
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub(crate) fn unexpected(path: &JsonPath, expected: impl Into<String>, found: impl Into<String>) -> Error {
    Error::Json(JsonError::UnexpectedToken {
        path: path.to_string(),
        expected: expected.into(),
        found: found.into(),
    })
}

/// Short description of a JSON token for error messages.
pub(crate) fn describe(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => "null".into(),
        JsonValue::Bool(b) => format!("boolean {}", b),
        JsonValue::Number(n) => format!("number {}", n),
        JsonValue::String(s) => format!("string \"{}\"", s),
        JsonValue::Array(_) => "array".into(),
        JsonValue::Object(_) => "object".into(),
    }
}

/// Decode a scalar of `data_type`. JSON `null` is [`Value::Null`].
pub(crate) fn value_from_json(json: &JsonValue, data_type: DataType, path: &JsonPath) -> Result<Value> {
    let value = match (json, data_type) {
        (JsonValue::Null, _) => Some(Value::Null),
        (JsonValue::Bool(b), DataType::Boolean) => Some(Value::Boolean(*b)),
        (JsonValue::Number(n), DataType::Int64) => n.as_i64().map(Value::Int64),
        (JsonValue::Number(n), DataType::Double) => n.as_f64().map(Value::Double),
        (JsonValue::String(s), DataType::String) => Some(Value::String(s.clone())),
        _ => None,
    };
    value.ok_or_else(|| unexpected(path, format!("{} value", data_type), describe(json)))
}

/// Rebuilds nodes into a schema.
pub struct Reader<'s> {
    schema: &'s mut Schema,
    registry: &'static ConverterRegistry,
}

impl<'s> Reader<'s> {
    pub fn new(schema: &'s mut Schema) -> Self {
        Self {
            schema,
            registry: ConverterRegistry::global(),
        }
    }

    pub fn schema(&mut self) -> &mut Schema {
        self.schema
    }

    /// Read a column node: a model column by `Name` or an expression column
    /// by `Expression`.
    pub fn column(&mut self, json: &JsonValue, path: &JsonPath) -> Result<ColumnId> {
        let object = as_object(json, path)?;
        let type_id = type_id(object, path)?;
        let data_type = match self.registry.lookup(type_id) {
            Some(ConverterEntry::Column(data_type)) => data_type,
            Some(ConverterEntry::Expression(_)) => {
                return Err(unexpected(path, "column type id", type_id));
            }
            None => {
                return Err(JsonError::UnknownTypeId {
                    type_id: type_id.into(),
                    path: path.to_string(),
                }
                .into());
            }
        };

        let id = if let Some(name) = object.get("Name") {
            let name_path = path.field("Name");
            let name = name
                .as_str()
                .ok_or_else(|| unexpected(&name_path, "string", describe(name)))?;
            self.schema
                .resolve_qualified(name)
                .map_err(|_| JsonError::UnknownColumnName {
                    name: name.into(),
                    path: name_path.to_string(),
                })?
        } else if let Some(expression) = object.get("Expression") {
            self.expression(expression, &path.field("Expression"))?
        } else {
            return Err(unexpected(path, "field 'Name' or 'Expression'", "neither"));
        };
        self.expect_type(id, data_type, path, "column")?;
        Ok(id)
    }

    /// Read an expression node through its registered converter.
    pub fn expression(&mut self, json: &JsonValue, path: &JsonPath) -> Result<ColumnId> {
        let object = as_object(json, path)?;
        let type_id = type_id(object, path)?;
        let converter = match self.registry.lookup(type_id) {
            Some(ConverterEntry::Expression(converter)) => converter,
            Some(ConverterEntry::Column(_)) => {
                return Err(unexpected(path, "expression type id", type_id));
            }
            None => {
                return Err(JsonError::UnknownTypeId {
                    type_id: type_id.into(),
                    path: path.to_string(),
                }
                .into());
            }
        };

        let args_path = path.field("ArgTypeIds");
        let args_json = object
            .get("ArgTypeIds")
            .and_then(JsonValue::as_array)
            .ok_or_else(|| unexpected(&args_path, "array of type ids", "nothing"))?;
        if args_json.len() != converter.arity() {
            return Err(JsonError::ArityMismatch {
                type_id: type_id.into(),
                path: args_path.to_string(),
                expected: converter.arity(),
                found: args_json.len(),
            }
            .into());
        }
        let args = args_json
            .iter()
            .enumerate()
            .map(|(i, arg)| {
                arg.as_str()
                    .and_then(DataType::from_type_id)
                    .ok_or_else(|| unexpected(&args_path.index(i), "type id", describe(arg)))
            })
            .collect::<Result<Vec<_>>>()?;

        let node = Node {
            type_id,
            object,
            args,
            path: path.clone(),
        };
        converter.read(self, &node)
    }

    /// Fail unless `id` has type `expected`.
    pub fn expect_type(&self, id: ColumnId, expected: DataType, path: &JsonPath, what: &str) -> Result<()> {
        let actual = self.schema.column(id)?.data_type();
        if actual != expected {
            return Err(unexpected(path, format!("{} of type {}", what, expected), actual.to_string()));
        }
        Ok(())
    }
}

fn as_object<'a>(json: &'a JsonValue, path: &JsonPath) -> Result<&'a Map<String, JsonValue>> {
    json.as_object()
        .ok_or_else(|| unexpected(path, "object", describe(json)))
}

fn type_id<'a>(object: &'a Map<String, JsonValue>, path: &JsonPath) -> Result<&'a str> {
    let path = path.field("TypeId");
    match object.get("TypeId") {
        Some(JsonValue::String(s)) => Ok(s),
        Some(other) => Err(unexpected(&path, "string", describe(other))),
        None => Err(unexpected(&path, "type id", "nothing")),
    }
}

/// One expression object handed to a converter.
pub struct Node<'a> {
    pub type_id: &'a str,
    pub object: &'a Map<String, JsonValue>,
    /// Decoded `ArgTypeIds`.
    pub args: Vec<DataType>,
    pub path: JsonPath,
}

impl<'a> Node<'a> {
    pub fn arg(&self, index: usize) -> DataType {
        self.args[index]
    }

    pub fn field(&self, name: &str) -> Result<&'a JsonValue> {
        self.object
            .get(name)
            .ok_or_else(|| unexpected(&self.path.field(name), format!("field '{}'", name), "nothing"))
    }

    pub fn str_field(&self, name: &str) -> Result<&'a str> {
        let value = self.field(name)?;
        value
            .as_str()
            .ok_or_else(|| unexpected(&self.path.field(name), "string", describe(value)))
    }

    pub fn array_field(&self, name: &str) -> Result<&'a [JsonValue]> {
        let value = self.field(name)?;
        value
            .as_array()
            .map(Vec::as_slice)
            .ok_or_else(|| unexpected(&self.path.field(name), "array", describe(value)))
    }

    /// A scalar of `data_type`.
    pub fn value(&self, name: &str, data_type: DataType) -> Result<Value> {
        value_from_json(self.field(name)?, data_type, &self.path.field(name))
    }

    /// An operand column.
    pub fn column(&self, reader: &mut Reader<'_>, name: &str) -> Result<ColumnId> {
        reader.column(self.field(name)?, &self.path.field(name))
    }

    /// An operand column of a declared type.
    pub fn typed_column(&self, reader: &mut Reader<'_>, name: &str, data_type: DataType) -> Result<ColumnId> {
        let id = self.column(reader, name)?;
        reader.expect_type(id, data_type, &self.path.field(name), "operand")?;
        Ok(id)
    }

    /// A `WhenThen` list of `{"When", "Then"}` objects.
    pub fn when_then(&self, reader: &mut Reader<'_>) -> Result<Vec<(ColumnId, ColumnId)>> {
        let path = self.path.field("WhenThen");
        self.array_field("WhenThen")?
            .iter()
            .enumerate()
            .map(|(i, pair)| -> Result<(ColumnId, ColumnId)> {
                let pair_path = path.index(i);
                let object = as_object(pair, &pair_path)?;
                let when = object
                    .get("When")
                    .ok_or_else(|| unexpected(&pair_path.field("When"), "field 'When'", "nothing"))?;
                let then = object
                    .get("Then")
                    .ok_or_else(|| unexpected(&pair_path.field("Then"), "field 'Then'", "nothing"))?;
                Ok((
                    reader.column(when, &pair_path.field("When"))?,
                    reader.column(then, &pair_path.field("Then"))?,
                ))
            })
            .collect()
    }

    /// Check the rebuilt node against the declared result type.
    pub fn finish(&self, reader: &Reader<'_>, id: ColumnId, result: DataType) -> Result<ColumnId> {
        reader.expect_type(id, result, &self.path, self.type_id)?;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_path_formatting() {
        let path = JsonPath::root().field("Expression").field("WhenThen").index(2).field("When");
        assert_eq!(path.to_string(), "$.Expression.WhenThen[2].When");
    }

    #[test]
    fn test_value_from_json_checks_type() {
        let path = JsonPath::root();
        assert_eq!(value_from_json(&json!(5), DataType::Int64, &path).unwrap(), Value::Int64(5));
        assert_eq!(value_from_json(&json!(5), DataType::Double, &path).unwrap(), Value::Double(5.0));
        assert_eq!(value_from_json(&json!(null), DataType::String, &path).unwrap(), Value::Null);
        assert!(value_from_json(&json!(1.5), DataType::Int64, &path).is_err());
        assert!(value_from_json(&json!("x"), DataType::Boolean, &path).is_err());
    }
}
