//! Conversion between typed field values and their wire byte forms.
//!
//! [`DataConverter`] is the seam between field layouts and raw bytes. The
//! shipped [`WireConverter`] encodes scalars in a configurable byte order,
//! text as strict UTF-8, and timestamps as microseconds since the Unix
//! epoch. Conversions work on natural widths; slot padding and length
//! prefixes are applied by the record codec, not here.

use chrono::DateTime;

use crate::error::{Error, Result};
use crate::record::field::FieldType;
use crate::record::value::FieldValue;

/// Byte order for scalar fields, length prefixes, and locator handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    BigEndian,
    LittleEndian,
}

/// Converts field values to and from their byte representation.
///
/// Locator fields are rebuilt by the record from their slot handle (a
/// locator needs its column position, which a converter does not have), so
/// `from_bytes` rejects LOB types.
pub trait DataConverter: Send + Sync {
    /// Byte order used for scalars and for the codec's prefixes and handles.
    fn byte_order(&self) -> ByteOrder;

    /// Encode a value at its natural width.
    fn to_bytes(&self, field_type: &FieldType, value: &FieldValue) -> Result<Vec<u8>>;

    /// Decode a value from exactly the bytes of its field.
    fn from_bytes(&self, field_type: &FieldType, bytes: &[u8]) -> Result<FieldValue>;

    /// The type-native zero value used for default placeholders.
    fn default_value(&self, field_type: &FieldType) -> FieldValue;
}

/// Standard converter for the record wire format.
#[derive(Debug, Clone, Copy)]
pub struct WireConverter {
    order: ByteOrder,
}

impl WireConverter {
    pub fn new(order: ByteOrder) -> Self {
        Self { order }
    }

    pub fn big_endian() -> Self {
        Self::new(ByteOrder::BigEndian)
    }

    pub fn little_endian() -> Self {
        Self::new(ByteOrder::LittleEndian)
    }

    fn require_i64(&self, field_type: &FieldType, value: &FieldValue) -> Result<i64> {
        value.to_i64().ok_or_else(|| {
            Error::type_mismatch(format!("cannot store {value} in a {field_type} field"))
        })
    }

    fn require_f64(&self, field_type: &FieldType, value: &FieldValue) -> Result<f64> {
        value.to_f64().ok_or_else(|| {
            Error::type_mismatch(format!("cannot store {value} in a {field_type} field"))
        })
    }

    fn exact<const N: usize>(&self, field_type: &FieldType, bytes: &[u8]) -> Result<[u8; N]> {
        <[u8; N]>::try_from(bytes).map_err(|_| {
            Error::structural(format!(
                "{field_type} field expects {N} bytes, got {}",
                bytes.len()
            ))
        })
    }
}

impl Default for WireConverter {
    fn default() -> Self {
        Self::big_endian()
    }
}

impl DataConverter for WireConverter {
    fn byte_order(&self) -> ByteOrder {
        self.order
    }

    fn to_bytes(&self, field_type: &FieldType, value: &FieldValue) -> Result<Vec<u8>> {
        match field_type {
            FieldType::Int16 => {
                let n = self.require_i64(field_type, value)?;
                let n = i16::try_from(n).map_err(|_| {
                    Error::type_mismatch(format!("value {n} out of range for {field_type}"))
                })?;
                Ok(match self.order {
                    ByteOrder::BigEndian => n.to_be_bytes().to_vec(),
                    ByteOrder::LittleEndian => n.to_le_bytes().to_vec(),
                })
            }
            FieldType::Int32 => {
                let n = self.require_i64(field_type, value)?;
                let n = i32::try_from(n).map_err(|_| {
                    Error::type_mismatch(format!("value {n} out of range for {field_type}"))
                })?;
                Ok(match self.order {
                    ByteOrder::BigEndian => n.to_be_bytes().to_vec(),
                    ByteOrder::LittleEndian => n.to_le_bytes().to_vec(),
                })
            }
            FieldType::Int64 => {
                let n = self.require_i64(field_type, value)?;
                Ok(match self.order {
                    ByteOrder::BigEndian => n.to_be_bytes().to_vec(),
                    ByteOrder::LittleEndian => n.to_le_bytes().to_vec(),
                })
            }
            FieldType::Float32 => {
                let f = self.require_f64(field_type, value)? as f32;
                Ok(match self.order {
                    ByteOrder::BigEndian => f.to_be_bytes().to_vec(),
                    ByteOrder::LittleEndian => f.to_le_bytes().to_vec(),
                })
            }
            FieldType::Float64 => {
                let f = self.require_f64(field_type, value)?;
                Ok(match self.order {
                    ByteOrder::BigEndian => f.to_be_bytes().to_vec(),
                    ByteOrder::LittleEndian => f.to_le_bytes().to_vec(),
                })
            }
            FieldType::Timestamp => {
                let dt = match value {
                    FieldValue::Timestamp(dt) => dt,
                    other => {
                        return Err(Error::type_mismatch(format!(
                            "cannot store {other} in a {field_type} field"
                        )))
                    }
                };
                let micros = dt.and_utc().timestamp_micros();
                Ok(match self.order {
                    ByteOrder::BigEndian => micros.to_be_bytes().to_vec(),
                    ByteOrder::LittleEndian => micros.to_le_bytes().to_vec(),
                })
            }
            FieldType::Text => match value {
                FieldValue::Text(s) => Ok(s.as_bytes().to_vec()),
                other => Err(Error::type_mismatch(format!(
                    "cannot store {other} in a {field_type} field"
                ))),
            },
            FieldType::Bytes => match value {
                FieldValue::Bytes(b) => Ok(b.clone()),
                other => Err(Error::type_mismatch(format!(
                    "cannot store {other} in a {field_type} field"
                ))),
            },
            FieldType::Array { elem, count } => {
                let items = match value {
                    FieldValue::Array(items) => items,
                    other => {
                        return Err(Error::type_mismatch(format!(
                            "cannot store {other} in a {field_type} field"
                        )))
                    }
                };
                if items.len() != *count {
                    return Err(Error::type_mismatch(format!(
                        "array field expects {count} elements, got {}",
                        items.len()
                    )));
                }
                let elem_width = elem.fixed_width().ok_or_else(|| {
                    Error::structural(format!("array element type {elem} is not fixed-width"))
                })?;
                let mut out = Vec::with_capacity(elem_width * count);
                for item in items {
                    let encoded = self.to_bytes(elem, item)?;
                    if encoded.len() != elem_width {
                        return Err(Error::structural(format!(
                            "array element encoded to {} bytes, expected {elem_width}",
                            encoded.len()
                        )));
                    }
                    out.extend_from_slice(&encoded);
                }
                Ok(out)
            }
            FieldType::Blob | FieldType::Clob => Err(Error::type_mismatch(
                "locator fields are encoded by the record, not the converter",
            )),
        }
    }

    fn from_bytes(&self, field_type: &FieldType, bytes: &[u8]) -> Result<FieldValue> {
        match field_type {
            FieldType::Int16 => {
                let raw = self.exact::<2>(field_type, bytes)?;
                Ok(FieldValue::Int16(match self.order {
                    ByteOrder::BigEndian => i16::from_be_bytes(raw),
                    ByteOrder::LittleEndian => i16::from_le_bytes(raw),
                }))
            }
            FieldType::Int32 => {
                let raw = self.exact::<4>(field_type, bytes)?;
                Ok(FieldValue::Int32(match self.order {
                    ByteOrder::BigEndian => i32::from_be_bytes(raw),
                    ByteOrder::LittleEndian => i32::from_le_bytes(raw),
                }))
            }
            FieldType::Int64 => {
                let raw = self.exact::<8>(field_type, bytes)?;
                Ok(FieldValue::Int64(match self.order {
                    ByteOrder::BigEndian => i64::from_be_bytes(raw),
                    ByteOrder::LittleEndian => i64::from_le_bytes(raw),
                }))
            }
            FieldType::Float32 => {
                let raw = self.exact::<4>(field_type, bytes)?;
                Ok(FieldValue::Float32(match self.order {
                    ByteOrder::BigEndian => f32::from_be_bytes(raw),
                    ByteOrder::LittleEndian => f32::from_le_bytes(raw),
                }))
            }
            FieldType::Float64 => {
                let raw = self.exact::<8>(field_type, bytes)?;
                Ok(FieldValue::Float64(match self.order {
                    ByteOrder::BigEndian => f64::from_be_bytes(raw),
                    ByteOrder::LittleEndian => f64::from_le_bytes(raw),
                }))
            }
            FieldType::Timestamp => {
                let raw = self.exact::<8>(field_type, bytes)?;
                let micros = match self.order {
                    ByteOrder::BigEndian => i64::from_be_bytes(raw),
                    ByteOrder::LittleEndian => i64::from_le_bytes(raw),
                };
                let dt = DateTime::from_timestamp_micros(micros)
                    .ok_or_else(|| Error::structural(format!("timestamp {micros} out of range")))?;
                Ok(FieldValue::Timestamp(dt.naive_utc()))
            }
            FieldType::Text => {
                let s = std::str::from_utf8(bytes)
                    .map_err(|e| Error::encoding(format!("invalid UTF-8 in text field: {e}")))?;
                Ok(FieldValue::Text(s.to_string()))
            }
            FieldType::Bytes => Ok(FieldValue::Bytes(bytes.to_vec())),
            FieldType::Array { elem, count } => {
                let elem_width = elem.fixed_width().ok_or_else(|| {
                    Error::structural(format!("array element type {elem} is not fixed-width"))
                })?;
                if bytes.len() != elem_width * count {
                    return Err(Error::structural(format!(
                        "array field expects {} bytes, got {}",
                        elem_width * count,
                        bytes.len()
                    )));
                }
                let mut items = Vec::with_capacity(*count);
                for chunk in bytes.chunks_exact(elem_width) {
                    items.push(self.from_bytes(elem, chunk)?);
                }
                Ok(FieldValue::Array(items))
            }
            FieldType::Blob | FieldType::Clob => Err(Error::type_mismatch(
                "locator fields are decoded by the record, not the converter",
            )),
        }
    }

    fn default_value(&self, field_type: &FieldType) -> FieldValue {
        match field_type {
            FieldType::Int16 => FieldValue::Int16(0),
            FieldType::Int32 => FieldValue::Int32(0),
            FieldType::Int64 => FieldValue::Int64(0),
            FieldType::Float32 => FieldValue::Float32(0.0),
            FieldType::Float64 => FieldValue::Float64(0.0),
            FieldType::Timestamp => FieldValue::Timestamp(DateTime::UNIX_EPOCH.naive_utc()),
            FieldType::Text => FieldValue::Text(String::new()),
            FieldType::Bytes => FieldValue::Bytes(Vec::new()),
            FieldType::Array { elem, count } => {
                FieldValue::Array(vec![self.default_value(elem); *count])
            }
            FieldType::Blob | FieldType::Clob => FieldValue::Null,
        }
    }
}

/// Decode a strict hex string: two digits per byte, no separators.
///
/// Used when binding text to a binary locator. An odd length or any
/// non-hex character is an encoding error.
pub fn hex_to_bytes(text: &str) -> Result<Vec<u8>> {
    if text.len() % 2 != 0 {
        return Err(Error::encoding(format!(
            "hex string has odd length {}",
            text.len()
        )));
    }
    let mut out = Vec::with_capacity(text.len() / 2);
    let digits = text.as_bytes();
    for pair in digits.chunks_exact(2) {
        let hi = hex_digit(pair[0])?;
        let lo = hex_digit(pair[1])?;
        out.push((hi << 4) | lo);
    }
    Ok(out)
}

/// Encode bytes as lowercase hex, two digits per byte.
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push(char::from_digit((b >> 4) as u32, 16).unwrap_or('0'));
        out.push(char::from_digit((b & 0x0f) as u32, 16).unwrap_or('0'));
    }
    out
}

fn hex_digit(c: u8) -> Result<u8> {
    match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'a'..=b'f' => Ok(c - b'a' + 10),
        b'A'..=b'F' => Ok(c - b'A' + 10),
        _ => Err(Error::encoding(format!(
            "invalid hex character {:?}",
            c as char
        ))),
    }
}
