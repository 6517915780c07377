//! Record codec: defaults, decode, and encode driven by a record format.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::convert::DataConverter;
use crate::error::{Error, Result};
use crate::lob::locator::LobLocator;
use crate::record::buffer::{RecordBuffer, RecordWriter};
use crate::record::field::{DefaultValue, FieldLayout, FieldType};
use crate::record::format::RecordFormat;
use crate::record::record::Record;
use crate::record::value::FieldValue;

/// Converts between flat wire buffers and [`Record`]s of one format.
///
/// Dependency-free formats use the format's precomputed offsets; decoded
/// fields convert lazily on first access. Formats with dependent fields
/// decode and encode in a single forward pass in ascending field order,
/// because a later field's width or offset is an earlier field's decoded
/// integer value. A dependency-supplied length is authoritative: dependent
/// slots carry no 2-byte prefix, and on encode the data is truncated or
/// padded to the dependency value exactly.
pub struct RecordCodec {
    format: Arc<RecordFormat>,
    converter: Arc<dyn DataConverter>,
}

impl RecordCodec {
    pub fn new(format: Arc<RecordFormat>, converter: Arc<dyn DataConverter>) -> Self {
        Self { format, converter }
    }

    pub fn format(&self) -> &RecordFormat {
        &self.format
    }

    /// Produce a fresh record with every field holding its default.
    ///
    /// Explicit defaults are validated against the field type; fields
    /// without one get the converter's type-native zero, and LOB fields an
    /// unbound locator for their column. An unset integer field that
    /// positions a later field is seeded with that field's natural offset
    /// instead of zero. Variable-length slots are written at full width
    /// with the prefix carrying the default's natural length, so the buffer
    /// length is the sum of every slot's maximum width no matter what the
    /// defaults are.
    pub fn initialize_defaults(&self) -> Result<Record> {
        let mut values = Vec::with_capacity(self.format.len());
        for (index, layout) in self.format.fields().iter().enumerate() {
            values.push(self.resolve_default(index, layout)?);
        }
        self.seed_offset_defaults(&mut values)?;
        let (raw, offsets, widths) =
            build_record(&self.format, self.converter.as_ref(), &values)?;
        Ok(Record::from_parts(
            self.format.clone(),
            self.converter.clone(),
            raw,
            values.into_iter().map(Some).collect(),
            vec![false; self.format.len()],
            offsets,
            widths,
        ))
    }

    fn resolve_default(&self, index: usize, layout: &FieldLayout) -> Result<FieldValue> {
        match &layout.default {
            Some(DefaultValue::Value(value)) if !value.is_null() => {
                if !value.matches_type(&layout.field_type) {
                    return Err(Error::type_mismatch(format!(
                        "default for field {:?} does not fit its type {}",
                        layout.name, layout.field_type
                    )));
                }
                Ok(normalize_value(layout, value.clone()))
            }
            Some(DefaultValue::CurrentTimestamp) => {
                if layout.field_type != FieldType::Timestamp {
                    return Err(Error::type_mismatch(format!(
                        "field {:?} is {}, current-timestamp default needs TIMESTAMP",
                        layout.name, layout.field_type
                    )));
                }
                // Clamped to wire precision so the value round-trips.
                let micros = Utc::now().timestamp_micros();
                let now = DateTime::from_timestamp_micros(micros)
                    .ok_or_else(|| Error::structural("system clock out of range"))?;
                Ok(FieldValue::Timestamp(now.naive_utc()))
            }
            _ => {
                if layout.field_type.is_lob() {
                    Ok(FieldValue::Lob(LobLocator::new(index)))
                } else {
                    Ok(normalize_value(
                        layout,
                        self.converter.default_value(&layout.field_type),
                    ))
                }
            }
        }
    }

    /// A field positioned through an unset integer source would resolve to
    /// offset 0 and land inside the fields already written. Such sources
    /// take the positioned field's natural offset; explicit defaults stay
    /// authoritative.
    fn seed_offset_defaults(&self, values: &mut [FieldValue]) -> Result<()> {
        let fields = self.format.fields();
        if fields.iter().all(|f| f.offset_depends_on.is_none()) {
            return Ok(());
        }
        let mut pos = 0usize;
        for (index, layout) in fields.iter().enumerate() {
            if let Some(dep) = layout.offset_depends_on {
                if fields[dep].default.is_none() {
                    values[dep] = offset_default(&fields[dep], pos)?;
                }
                pos = pos.max(resolve_index_value(values, dep, index, "offset")?);
            }
            pos += match layout.length_depends_on {
                Some(dep) => resolve_index_value(values, dep, index, "length")?,
                // slot_width is Some for every non-dependent field
                None => layout.slot_width().unwrap_or(0),
            };
        }
        Ok(())
    }

    /// Decode one record starting at `offset` within `bytes`.
    ///
    /// Trailing bytes past the record are ignored. Malformed input, such as
    /// a buffer shorter than the record or a length prefix past a field's
    /// declared maximum, is an error, never a silent truncation.
    pub fn decode(&self, bytes: &[u8], offset: usize) -> Result<Record> {
        if offset > bytes.len() {
            return Err(Error::OffsetOutOfRange {
                offset,
                len: bytes.len(),
            });
        }
        let region = &bytes[offset..];
        if let (Some(static_offsets), Some(record_len)) =
            (self.format.static_offsets(), self.format.record_len())
        {
            if region.len() < record_len {
                return Err(Error::BufferTooSmall {
                    needed: record_len,
                    available: region.len(),
                    location: std::panic::Location::caller(),
                });
            }
            let widths = self
                .format
                .fields()
                .iter()
                .map(|f| f.slot_width().unwrap_or(0))
                .collect();
            return Ok(Record::from_parts(
                self.format.clone(),
                self.converter.clone(),
                region[..record_len].to_vec(),
                vec![None; self.format.len()],
                vec![false; self.format.len()],
                static_offsets.to_vec(),
                widths,
            ));
        }
        self.decode_dependent(region)
    }

    /// Forward pass for formats with dependent fields. Fields convert
    /// eagerly, strictly in ascending index order, since later shapes come
    /// from earlier values.
    fn decode_dependent(&self, region: &[u8]) -> Result<Record> {
        let format = self.format.as_ref();
        let mut buf = RecordBuffer::new(Bytes::copy_from_slice(region));
        let mut values: Vec<FieldValue> = Vec::with_capacity(format.len());
        let mut offsets = Vec::with_capacity(format.len());
        let mut widths = Vec::with_capacity(format.len());
        let mut end = 0usize;
        for (index, layout) in format.fields().iter().enumerate() {
            let offset = match layout.offset_depends_on {
                Some(dep) => resolve_index_value(&values, dep, index, "offset")?,
                None => buf.position(),
            };
            if offset < buf.position() {
                return Err(Error::structural(format!(
                    "field {:?} offset {offset} overlaps the preceding field ending at {}",
                    layout.name,
                    buf.position()
                )));
            }
            buf.seek(offset)?;
            let width = if layout.field_type.is_lob() {
                4
            } else if let Some(dep) = layout.length_depends_on {
                resolve_index_value(&values, dep, index, "length")?
            } else if layout.variable_length {
                2 + layout.byte_length
            } else {
                layout.data_width()
            };
            let slot = buf.read_bytes(width)?;
            let value = decode_slot(self.converter.as_ref(), layout, index, &slot)?;
            offsets.push(offset);
            widths.push(width);
            values.push(value);
            end = end.max(offset + width);
        }
        tracing::debug!(
            format = format.name(),
            record_len = end,
            "decoded dependent-format record"
        );
        Ok(Record::from_parts(
            self.format.clone(),
            self.converter.clone(),
            region[..end].to_vec(),
            values.into_iter().map(Some).collect(),
            vec![false; format.len()],
            offsets,
            widths,
        ))
    }

    /// Serialize the record to its wire bytes.
    pub fn encode(&self, record: &mut Record) -> Result<Bytes> {
        Ok(Bytes::copy_from_slice(record.contents()?))
    }
}

/// Build a full record buffer from one value per field.
///
/// Single forward pass shared by `initialize_defaults` and the dependent
/// rebuild: offsets resolve against already-written fields, gaps before
/// offset-dependent fields are zero-filled, and a length-dependent field's
/// data is fitted to the dependency value by truncating or padding with the
/// type's pad byte.
pub(crate) fn build_record(
    format: &RecordFormat,
    converter: &dyn DataConverter,
    values: &[FieldValue],
) -> Result<(Vec<u8>, Vec<usize>, Vec<usize>)> {
    let mut writer = RecordWriter::with_capacity(format.record_len().unwrap_or(256));
    let mut offsets = Vec::with_capacity(format.len());
    let mut widths = Vec::with_capacity(format.len());
    for (index, layout) in format.fields().iter().enumerate() {
        let value = &values[index];
        let offset = match layout.offset_depends_on {
            Some(dep) => resolve_index_value(values, dep, index, "offset")?,
            None => writer.len(),
        };
        if offset < writer.len() {
            return Err(Error::structural(format!(
                "field {:?} offset {offset} overlaps the preceding field ending at {}",
                layout.name,
                writer.len()
            )));
        }
        if offset > writer.len() {
            writer.write_fill(0, offset - writer.len());
        }
        let width = if let Some(dep) = layout.length_depends_on {
            let len = resolve_index_value(values, dep, index, "length")?;
            let effective = if value.is_null() {
                converter.default_value(&layout.field_type)
            } else {
                value.clone()
            };
            let data = converter.to_bytes(&layout.field_type, &effective)?;
            let take = data.len().min(len);
            writer.write_bytes(&data[..take]);
            writer.write_fill(layout.field_type.pad_byte(), len - take);
            len
        } else {
            let slot = encode_slot(converter, layout, value)?;
            writer.write_bytes(&slot);
            slot.len()
        };
        offsets.push(offset);
        widths.push(width);
    }
    Ok((writer.take(), offsets, widths))
}

/// Encode one non-length-dependent field into its full slot: length prefix
/// for variable fields, data, and pad fill up to the slot width.
pub(crate) fn encode_slot(
    converter: &dyn DataConverter,
    layout: &FieldLayout,
    value: &FieldValue,
) -> Result<Vec<u8>> {
    let order = converter.byte_order();
    if layout.field_type.is_lob() {
        let handle = match value {
            FieldValue::Lob(locator) => locator.handle().unwrap_or(0),
            FieldValue::Null => 0,
            other => {
                return Err(Error::type_mismatch(format!(
                    "field {:?} is {}, cannot store {other}",
                    layout.name, layout.field_type
                )))
            }
        };
        let mut slot = RecordWriter::with_capacity(4);
        slot.write_u32(handle, order);
        return Ok(slot.take());
    }
    let effective = if value.is_null() {
        converter.default_value(&layout.field_type)
    } else {
        value.clone()
    };
    let data = converter.to_bytes(&layout.field_type, &effective)?;
    if layout.variable_length {
        let max = layout.byte_length;
        if data.len() > max {
            return Err(Error::type_mismatch(format!(
                "field {:?} value is {} bytes, declared maximum is {max}",
                layout.name,
                data.len()
            )));
        }
        let mut slot = RecordWriter::with_capacity(2 + max);
        slot.write_u16(data.len() as u16, order);
        slot.write_bytes(&data);
        slot.write_fill(layout.field_type.pad_byte(), max - data.len());
        Ok(slot.take())
    } else {
        let width = layout.data_width();
        if data.len() > width {
            return Err(Error::type_mismatch(format!(
                "field {:?} value is {} bytes, declared maximum is {width}",
                layout.name,
                data.len()
            )));
        }
        let mut slot = RecordWriter::with_capacity(width);
        slot.write_bytes(&data);
        slot.write_fill(layout.field_type.pad_byte(), width - data.len());
        Ok(slot.take())
    }
}

/// Decode one field from its full slot bytes.
pub(crate) fn decode_slot(
    converter: &dyn DataConverter,
    layout: &FieldLayout,
    column_index: usize,
    slot: &[u8],
) -> Result<FieldValue> {
    let order = converter.byte_order();
    if layout.field_type.is_lob() {
        let mut buf = RecordBuffer::new(Bytes::copy_from_slice(slot));
        let handle = buf.read_u32(order)?;
        return Ok(FieldValue::Lob(LobLocator::from_wire(column_index, handle)));
    }
    if layout.length_depends_on.is_some() {
        return converter.from_bytes(&layout.field_type, slot);
    }
    if layout.variable_length {
        let mut buf = RecordBuffer::new(Bytes::copy_from_slice(slot));
        let significant = buf.read_u16(order)? as usize;
        if significant > layout.byte_length {
            return Err(Error::structural(format!(
                "field {:?} length prefix {significant} exceeds declared maximum {}",
                layout.name, layout.byte_length
            )));
        }
        let data = buf.read_bytes(significant)?;
        return converter.from_bytes(&layout.field_type, &data);
    }
    if layout.field_type == FieldType::Text {
        return converter.from_bytes(&layout.field_type, trim_trailing(slot, 0x20));
    }
    converter.from_bytes(&layout.field_type, slot)
}

/// Put a value into the form it will take after a wire round trip, so what
/// the application reads back equals what decode would produce. Fixed-width
/// binary is zero-filled to the slot and fixed-width text loses its trailing
/// blanks; numeric values take the field's own variant and timestamps are
/// clamped to microsecond precision.
pub(crate) fn normalize_value(layout: &FieldLayout, value: FieldValue) -> FieldValue {
    match (&layout.field_type, value) {
        (FieldType::Bytes, FieldValue::Bytes(mut data)) => {
            if !layout.variable_length
                && layout.length_depends_on.is_none()
                && data.len() < layout.byte_length
            {
                data.resize(layout.byte_length, 0);
            }
            FieldValue::Bytes(data)
        }
        (FieldType::Text, FieldValue::Text(mut text)) => {
            if !layout.variable_length && layout.length_depends_on.is_none() {
                text.truncate(text.trim_end_matches(' ').len());
            }
            FieldValue::Text(text)
        }
        // Cross-width numeric stores take the field's own variant, matching
        // what a decode of the written slot yields. A value that does not
        // fit passes through for the conversion layer to reject.
        (FieldType::Int16, value) => match value.to_i64().and_then(|n| i16::try_from(n).ok()) {
            Some(n) => FieldValue::Int16(n),
            None => value,
        },
        (FieldType::Int32, value) => match value.to_i64().and_then(|n| i32::try_from(n).ok()) {
            Some(n) => FieldValue::Int32(n),
            None => value,
        },
        (FieldType::Int64, value) => match value.to_i64() {
            Some(n) => FieldValue::Int64(n),
            None => value,
        },
        (FieldType::Float32, value) => match value.to_f64() {
            Some(x) => FieldValue::Float32(x as f32),
            None => value,
        },
        (FieldType::Float64, value) => match value.to_f64() {
            Some(x) => FieldValue::Float64(x),
            None => value,
        },
        (FieldType::Timestamp, FieldValue::Timestamp(dt)) => {
            let micros = dt.and_utc().timestamp_micros();
            match DateTime::from_timestamp_micros(micros) {
                Some(clamped) => FieldValue::Timestamp(clamped.naive_utc()),
                None => FieldValue::Timestamp(dt),
            }
        }
        (_, value) => value,
    }
}

fn resolve_index_value(
    values: &[FieldValue],
    dep: usize,
    index: usize,
    what: &str,
) -> Result<usize> {
    let raw = values[dep].to_i64().ok_or_else(|| Error::InvalidDependency {
        field: index,
        depends_on: dep,
        reason: format!("{what} source holds no integer value"),
    })?;
    usize::try_from(raw).map_err(|_| Error::InvalidDependency {
        field: index,
        depends_on: dep,
        reason: format!("{what} {raw} is negative"),
    })
}

fn offset_default(layout: &FieldLayout, offset: usize) -> Result<FieldValue> {
    let seeded = match layout.field_type {
        FieldType::Int16 => i16::try_from(offset).ok().map(FieldValue::Int16),
        FieldType::Int32 => i32::try_from(offset).ok().map(FieldValue::Int32),
        FieldType::Int64 => i64::try_from(offset).ok().map(FieldValue::Int64),
        _ => None,
    };
    seeded.ok_or_else(|| {
        Error::structural(format!(
            "field {:?} cannot hold default offset {offset}",
            layout.name
        ))
    })
}

fn trim_trailing(bytes: &[u8], pad: u8) -> &[u8] {
    let end = bytes.iter().rposition(|&b| b != pad).map_or(0, |i| i + 1);
    &bytes[..end]
}
