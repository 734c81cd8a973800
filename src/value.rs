//! Scalar values and the Rust types that map onto them.
//!
//! Expressions are stored untyped (a [`DataType`] tag on every node) and
//! surfaced through typed [`Col<T>`](crate::model::Col) handles. The
//! [`ColumnType`] trait is the bridge between the two.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// =============================================================================
// Data types
// =============================================================================

/// The type tag carried by every column and expression node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DataType {
    Boolean,
    Int64,
    Double,
    String,
}

impl DataType {
    /// Stable identifier used in JSON `ArgTypeIds`.
    pub fn type_id(&self) -> &'static str {
        match self {
            DataType::Boolean => "Boolean",
            DataType::Int64 => "Int64",
            DataType::Double => "Double",
            DataType::String => "String",
        }
    }

    pub fn from_type_id(id: &str) -> Option<Self> {
        match id {
            "Boolean" => Some(DataType::Boolean),
            "Int64" => Some(DataType::Int64),
            "Double" => Some(DataType::Double),
            "String" => Some(DataType::String),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Int64 | DataType::Double)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_id())
    }
}

// =============================================================================
// Values
// =============================================================================

/// A dynamically typed scalar.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Boolean(bool),
    Int64(i64),
    Double(f64),
    String(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The type of a non-null value.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Value::Null => None,
            Value::Boolean(_) => Some(DataType::Boolean),
            Value::Int64(_) => Some(DataType::Int64),
            Value::Double(_) => Some(DataType::Double),
            Value::String(_) => Some(DataType::String),
        }
    }

    /// Whether this value may be stored in a slot of `data_type`.
    pub fn conforms_to(&self, data_type: DataType) -> bool {
        self.data_type().map_or(true, |t| t == data_type)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(f) => Some(*f),
            Value::Int64(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Convert this value to `target`, following SQL `CAST` rules.
    pub fn cast(&self, target: DataType) -> Result<Value> {
        let invalid = || Error::InvalidCast {
            value: self.to_string(),
            target,
        };
        let cast = match (self, target) {
            (Value::Null, _) => Value::Null,
            (Value::Boolean(b), DataType::Boolean) => Value::Boolean(*b),
            (Value::Boolean(b), DataType::Int64) => Value::Int64(i64::from(*b)),
            (Value::Boolean(b), DataType::Double) => Value::Double(if *b { 1.0 } else { 0.0 }),
            (Value::Int64(n), DataType::Boolean) => Value::Boolean(*n != 0),
            (Value::Int64(n), DataType::Int64) => Value::Int64(*n),
            (Value::Int64(n), DataType::Double) => Value::Double(*n as f64),
            (Value::Double(f), DataType::Boolean) => Value::Boolean(*f != 0.0),
            (Value::Double(f), DataType::Int64) => {
                // i64::MIN is exactly -2^63; 2^63 itself is already out of range.
                let t = f.trunc();
                if !(-9_223_372_036_854_775_808.0..9_223_372_036_854_775_808.0).contains(&t) {
                    return Err(invalid());
                }
                Value::Int64(t as i64)
            }
            (Value::Double(f), DataType::Double) => Value::Double(*f),
            (Value::String(s), DataType::Boolean) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Value::Boolean(true),
                "false" | "0" => Value::Boolean(false),
                _ => return Err(invalid()),
            },
            (Value::String(s), DataType::Int64) => {
                Value::Int64(s.trim().parse().map_err(|_| invalid())?)
            }
            (Value::String(s), DataType::Double) => {
                Value::Double(s.trim().parse().map_err(|_| invalid())?)
            }
            (v, DataType::String) => Value::String(v.to_string()),
        };
        Ok(cast)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Int64(n) => write!(f, "{}", n),
            Value::Double(d) => write!(f, "{}", d),
            Value::String(s) => f.write_str(s),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int64(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int64(n as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Double(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

// =============================================================================
// Typed mapping
// =============================================================================

/// A Rust type that a typed column handle can carry.
pub trait ColumnType: Clone + PartialEq + fmt::Debug + 'static {
    const DATA_TYPE: DataType;

    fn into_value(self) -> Value;

    /// `None` for `Value::Null`; values of another type are a mismatch.
    fn from_value(value: &Value) -> Result<Option<Self>>;
}

fn mismatch<T>(expected: DataType, value: &Value) -> Result<T> {
    Err(Error::TypeMismatch {
        context: "value conversion".into(),
        expected,
        actual: value.data_type().map_or_else(|| "NULL".to_string(), |t| t.to_string()),
    })
}

impl ColumnType for bool {
    const DATA_TYPE: DataType = DataType::Boolean;

    fn into_value(self) -> Value {
        Value::Boolean(self)
    }

    fn from_value(value: &Value) -> Result<Option<Self>> {
        match value {
            Value::Null => Ok(None),
            Value::Boolean(b) => Ok(Some(*b)),
            other => mismatch(Self::DATA_TYPE, other),
        }
    }
}

impl ColumnType for i64 {
    const DATA_TYPE: DataType = DataType::Int64;

    fn into_value(self) -> Value {
        Value::Int64(self)
    }

    fn from_value(value: &Value) -> Result<Option<Self>> {
        match value {
            Value::Null => Ok(None),
            Value::Int64(n) => Ok(Some(*n)),
            other => mismatch(Self::DATA_TYPE, other),
        }
    }
}

impl ColumnType for f64 {
    const DATA_TYPE: DataType = DataType::Double;

    fn into_value(self) -> Value {
        Value::Double(self)
    }

    fn from_value(value: &Value) -> Result<Option<Self>> {
        match value {
            Value::Null => Ok(None),
            Value::Double(f) => Ok(Some(*f)),
            other => mismatch(Self::DATA_TYPE, other),
        }
    }
}

impl ColumnType for String {
    const DATA_TYPE: DataType = DataType::String;

    fn into_value(self) -> Value {
        Value::String(self)
    }

    fn from_value(value: &Value) -> Result<Option<Self>> {
        match value {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(s.clone())),
            other => mismatch(Self::DATA_TYPE, other),
        }
    }
}

/// Types supporting arithmetic (`-`, `*`, `/`, `%`, negation, `ABS`).
pub trait Numeric: ColumnType {}
impl Numeric for i64 {}
impl Numeric for f64 {}

/// Types supporting `+` (string `+` concatenates).
pub trait Addable: ColumnType {}
impl Addable for i64 {}
impl Addable for f64 {}
impl Addable for String {}

/// Types supporting `&`, `|` and `^`.
pub trait Bitwise: ColumnType {}
impl Bitwise for i64 {}
impl Bitwise for bool {}
