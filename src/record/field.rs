//! Field types and per-field layout descriptions.

use std::fmt;

use crate::record::value::FieldValue;

/// Data type of a record field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    /// 16-bit signed integer.
    Int16,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// 32-bit IEEE float.
    Float32,
    /// 64-bit IEEE float.
    Float64,
    /// Timestamp, 8 bytes of microseconds since the Unix epoch.
    Timestamp,
    /// Character data; width comes from the layout.
    Text,
    /// Binary data; width comes from the layout.
    Bytes,
    /// Fixed count of a fixed-width element type.
    Array { elem: Box<FieldType>, count: usize },
    /// Binary large object, carried on the wire as a 4-byte locator handle.
    Blob,
    /// Character large object, carried on the wire as a 4-byte locator handle.
    Clob,
}

impl FieldType {
    /// Intrinsic wire width, or `None` for types sized by the layout.
    pub fn fixed_width(&self) -> Option<usize> {
        match self {
            FieldType::Int16 => Some(2),
            FieldType::Int32 => Some(4),
            FieldType::Int64 => Some(8),
            FieldType::Float32 => Some(4),
            FieldType::Float64 => Some(8),
            FieldType::Timestamp => Some(8),
            FieldType::Text | FieldType::Bytes => None,
            FieldType::Array { elem, count } => elem.fixed_width().map(|w| w * count),
            FieldType::Blob | FieldType::Clob => Some(4),
        }
    }

    /// True for the integer types that may serve as dependency sources.
    pub fn is_integer(&self) -> bool {
        matches!(self, FieldType::Int16 | FieldType::Int32 | FieldType::Int64)
    }

    /// True for locator-backed large object types.
    pub fn is_lob(&self) -> bool {
        matches!(self, FieldType::Blob | FieldType::Clob)
    }

    /// Byte used to pad short values to their slot width.
    pub fn pad_byte(&self) -> u8 {
        match self {
            FieldType::Text => 0x20,
            _ => 0x00,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Int16 => write!(f, "INT16"),
            FieldType::Int32 => write!(f, "INT32"),
            FieldType::Int64 => write!(f, "INT64"),
            FieldType::Float32 => write!(f, "FLOAT32"),
            FieldType::Float64 => write!(f, "FLOAT64"),
            FieldType::Timestamp => write!(f, "TIMESTAMP"),
            FieldType::Text => write!(f, "TEXT"),
            FieldType::Bytes => write!(f, "BYTES"),
            FieldType::Array { elem, count } => write!(f, "{elem}[{count}]"),
            FieldType::Blob => write!(f, "BLOB"),
            FieldType::Clob => write!(f, "CLOB"),
        }
    }
}

/// Default applied by `initialize_defaults` when the field has one.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    /// A fixed value, validated against the field type when applied.
    Value(FieldValue),
    /// The current UTC timestamp, computed when the record is initialized.
    CurrentTimestamp,
}

/// Layout of a single field within a record format.
///
/// `byte_length` is the declared maximum data width for [`FieldType::Text`]
/// and [`FieldType::Bytes`] fields and the maximum object length for LOB
/// fields (0 meaning sized by the server); intrinsic-width types ignore it.
#[derive(Debug, Clone)]
pub struct FieldLayout {
    pub name: String,
    pub field_type: FieldType,
    pub byte_length: usize,
    /// Whether the slot starts with a 2-byte significant-length prefix.
    pub variable_length: bool,
    pub default: Option<DefaultValue>,
    /// Index of an earlier integer field holding this field's data length.
    pub length_depends_on: Option<usize>,
    /// Index of an earlier integer field holding this field's record offset.
    pub offset_depends_on: Option<usize>,
}

impl FieldLayout {
    /// Layout for a type with an intrinsic width.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            byte_length: 0,
            variable_length: false,
            default: None,
            length_depends_on: None,
            offset_depends_on: None,
        }
    }

    /// Fixed-width layout for layout-sized types, or a LOB maximum length.
    pub fn sized(name: impl Into<String>, field_type: FieldType, byte_length: usize) -> Self {
        Self {
            byte_length,
            ..Self::new(name, field_type)
        }
    }

    /// Variable-length layout: a 2-byte prefix followed by up to
    /// `byte_length` data bytes, in a slot of constant total width.
    pub fn variable(name: impl Into<String>, field_type: FieldType, byte_length: usize) -> Self {
        Self {
            byte_length,
            variable_length: true,
            ..Self::new(name, field_type)
        }
    }

    pub fn with_default(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    /// Size this field's data by the value of an earlier integer field.
    ///
    /// A length-dependent slot carries no 2-byte prefix; its width is
    /// exactly the dependency value, for decode and encode alike.
    pub fn with_length_dependency(mut self, field_index: usize) -> Self {
        self.length_depends_on = Some(field_index);
        self
    }

    /// Position this field at the offset held by an earlier integer field.
    pub fn with_offset_dependency(mut self, field_index: usize) -> Self {
        self.offset_depends_on = Some(field_index);
        self
    }

    /// Declared maximum data width (prefix excluded).
    pub fn data_width(&self) -> usize {
        self.field_type.fixed_width().unwrap_or(self.byte_length)
    }

    /// Total slot width when it is statically known.
    ///
    /// `None` for length-dependent fields, whose width is resolved per
    /// record.
    pub fn slot_width(&self) -> Option<usize> {
        if self.length_depends_on.is_some() {
            return None;
        }
        if let Some(w) = self.field_type.fixed_width() {
            return Some(w);
        }
        if self.variable_length {
            Some(2 + self.byte_length)
        } else {
            Some(self.byte_length)
        }
    }

    /// True when this field's width or position comes from another field.
    pub fn is_dependent(&self) -> bool {
        self.length_depends_on.is_some() || self.offset_depends_on.is_some()
    }
}
