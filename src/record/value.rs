//! Typed field values.

use std::fmt;

use chrono::NaiveDateTime;

use crate::lob::locator::LobLocator;
use crate::record::field::FieldType;

/// A value held by one record field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Logical null. The wire slot still carries placeholder bytes.
    Null,
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Text(String),
    Bytes(Vec<u8>),
    Timestamp(NaiveDateTime),
    Array(Vec<FieldValue>),
    /// Locator standing in for a large object value.
    Lob(LobLocator),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Text contents, if this is a text value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Binary contents, if this is a bytes value.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            FieldValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Integer contents widened to i64. Used to resolve field dependencies.
    pub fn to_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Int16(n) => Some(*n as i64),
            FieldValue::Int32(n) => Some(*n as i64),
            FieldValue::Int64(n) => Some(*n),
            _ => None,
        }
    }

    /// Numeric contents as f64, accepting integer and float values.
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Int16(n) => Some(*n as f64),
            FieldValue::Int32(n) => Some(*n as f64),
            FieldValue::Int64(n) => Some(*n as f64),
            FieldValue::Float32(x) => Some(*x as f64),
            FieldValue::Float64(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            FieldValue::Timestamp(dt) => Some(*dt),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[FieldValue]> {
        match self {
            FieldValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_lob(&self) -> Option<&LobLocator> {
        match self {
            FieldValue::Lob(locator) => Some(locator),
            _ => None,
        }
    }

    /// Whether this value kind can be stored in a field of the given type.
    ///
    /// Null is storable anywhere; integers are accepted by any integer or
    /// float field, with range checking left to conversion.
    pub fn matches_type(&self, field_type: &FieldType) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::Int16(_) | FieldValue::Int32(_) | FieldValue::Int64(_) => {
                field_type.is_integer()
                    || matches!(field_type, FieldType::Float32 | FieldType::Float64)
            }
            FieldValue::Float32(_) | FieldValue::Float64(_) => {
                matches!(field_type, FieldType::Float32 | FieldType::Float64)
            }
            FieldValue::Text(_) => matches!(field_type, FieldType::Text),
            FieldValue::Bytes(_) => matches!(field_type, FieldType::Bytes),
            FieldValue::Timestamp(_) => matches!(field_type, FieldType::Timestamp),
            FieldValue::Array(_) => matches!(field_type, FieldType::Array { .. }),
            FieldValue::Lob(_) => field_type.is_lob(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => write!(f, "NULL"),
            FieldValue::Int16(n) => write!(f, "{n}"),
            FieldValue::Int32(n) => write!(f, "{n}"),
            FieldValue::Int64(n) => write!(f, "{n}"),
            FieldValue::Float32(x) => write!(f, "{x}"),
            FieldValue::Float64(x) => write!(f, "{x}"),
            FieldValue::Text(s) => write!(f, "{s}"),
            FieldValue::Bytes(b) => {
                for byte in b {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
            FieldValue::Timestamp(dt) => write!(f, "{dt}"),
            FieldValue::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            FieldValue::Lob(locator) => match locator.handle() {
                Some(handle) => write!(f, "LOB:{handle}"),
                None => write!(f, "LOB:unbound"),
            },
        }
    }
}
