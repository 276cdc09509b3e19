//! Scalar types, values and declared field definitions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Physical type of a single column element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarType {
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// 32-bit float.
    Float32,
    /// 64-bit float.
    Float64,
    /// Fixed-width UTF-8 text of the given byte length, zero padded.
    Text(usize),
}

impl ScalarType {
    /// Encoded width of one element in bytes.
    pub fn width(&self) -> usize {
        match self {
            ScalarType::Int32 | ScalarType::Float32 => 4,
            ScalarType::Int64 | ScalarType::Float64 => 8,
            ScalarType::Text(n) => *n,
        }
    }

    /// Returns true for integer types.
    pub fn is_integer(&self) -> bool {
        matches!(self, ScalarType::Int32 | ScalarType::Int64)
    }

    /// Returns true if a scalar value can be stored in this type.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (ScalarType::Int32, Value::Int(v)) => i32::try_from(*v).is_ok(),
            (ScalarType::Int64, Value::Int(_)) => true,
            (ScalarType::Float32 | ScalarType::Float64, Value::Int(_) | Value::Float(_)) => true,
            (ScalarType::Text(n), Value::Text(s)) => s.len() <= *n,
            _ => false,
        }
    }

    /// One-byte tag used when fingerprinting a layout.
    pub(crate) fn tag(&self) -> u8 {
        match self {
            ScalarType::Int32 => 1,
            ScalarType::Int64 => 2,
            ScalarType::Float32 => 3,
            ScalarType::Float64 => 4,
            ScalarType::Text(_) => 5,
        }
    }
}

/// A single field value, either read from a raw record or stored in a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Integer value.
    Int(i64),
    /// Floating point value.
    Float(f64),
    /// Text value.
    Text(String),
    /// Fixed-length array value, used by columns declared with a length > 1.
    Array(Vec<Value>),
}

impl Value {
    /// Returns the integer payload, if any.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value as a float; integers are widened.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the text payload, if any.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the array elements, if any.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Equality used by search filters: integers and floats compare by
    /// numeric value, everything else structurally.
    pub fn matches(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => *a as f64 == *b,
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.matches(y))
            }
            _ => self == other,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(s) => write!(f, "{:?}", s),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v as f64)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}

/// A flat, fixed-width row. The last value is the domain id.
pub type Row = Vec<Value>;

/// A decoded input record as supplied by the input collaborator.
pub type RawRecord = Vec<Value>;

/// One element of a declared (possibly nested) record schema.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldDef {
    /// A column sourced from the raw record. `len > 1` declares a
    /// fixed-length array column consuming `len` consecutive positions.
    Scalar {
        /// Column name.
        name: String,
        /// Element type.
        ty: ScalarType,
        /// Number of elements.
        len: usize,
    },
    /// A column never sourced from input; `value` is copied into every row.
    Constant {
        /// Column name.
        name: String,
        /// Column type.
        ty: ScalarType,
        /// Value written to every row.
        value: Value,
    },
    /// A sub-block of fields repeated `repeat` times.
    Block {
        /// Block name.
        name: String,
        /// Fields of one repetition.
        fields: Vec<FieldDef>,
        /// Fan-out count.
        repeat: usize,
    },
}

impl FieldDef {
    /// A single-element column.
    pub fn scalar(name: impl Into<String>, ty: ScalarType) -> Self {
        FieldDef::Scalar { name: name.into(), ty, len: 1 }
    }

    /// A fixed-length array column.
    pub fn array(name: impl Into<String>, ty: ScalarType, len: usize) -> Self {
        FieldDef::Scalar { name: name.into(), ty, len }
    }

    /// A constant column.
    pub fn constant(name: impl Into<String>, ty: ScalarType, value: impl Into<Value>) -> Self {
        FieldDef::Constant { name: name.into(), ty, value: value.into() }
    }

    /// A repeated sub-block.
    pub fn block(name: impl Into<String>, fields: Vec<FieldDef>, repeat: usize) -> Self {
        FieldDef::Block { name: name.into(), fields, repeat }
    }

    /// The declared name.
    pub fn name(&self) -> &str {
        match self {
            FieldDef::Scalar { name, .. }
            | FieldDef::Constant { name, .. }
            | FieldDef::Block { name, .. } => name,
        }
    }
}
