//! Record entity: typed field access over one wire buffer.

use std::fmt;
use std::sync::Arc;

use crate::convert::DataConverter;
use crate::error::{Error, Result};
use crate::record::codec::{build_record, decode_slot, encode_slot, normalize_value};
use crate::record::format::RecordFormat;
use crate::record::value::FieldValue;

/// Callback invoked synchronously after every successful field mutation.
///
/// Observers run on the mutating call's stack, so they must be fast;
/// anything slow belongs on the observer's own executor.
pub trait RecordObserver: Send {
    fn field_changed(&mut self, index: usize, value: &FieldValue);
}

/// One record: a wire buffer plus lazily converted typed values.
///
/// Records are produced by [`RecordCodec`](crate::record::codec::RecordCodec)
/// and keep their buffer well-formed at all times. For dependency-free
/// formats each `set_field` re-serializes just that field's slot in place;
/// formats with dependent fields mark the buffer stale instead and rebuild
/// it in one forward pass when [`contents`](Record::contents) is next
/// called.
///
/// The null map is in-memory state: a null field still carries its type's
/// placeholder bytes on the wire, and decoded records start with every
/// null bit clear.
pub struct Record {
    format: Arc<RecordFormat>,
    converter: Arc<dyn DataConverter>,
    raw: Vec<u8>,
    values: Vec<Option<FieldValue>>,
    null_map: Vec<bool>,
    offsets: Vec<usize>,
    widths: Vec<usize>,
    needs_rebuild: bool,
    observers: Vec<Box<dyn RecordObserver>>,
}

impl Record {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        format: Arc<RecordFormat>,
        converter: Arc<dyn DataConverter>,
        raw: Vec<u8>,
        values: Vec<Option<FieldValue>>,
        null_map: Vec<bool>,
        offsets: Vec<usize>,
        widths: Vec<usize>,
    ) -> Self {
        Self {
            format,
            converter,
            raw,
            values,
            null_map,
            offsets,
            widths,
            needs_rebuild: false,
            observers: Vec::new(),
        }
    }

    pub fn format(&self) -> &RecordFormat {
        &self.format
    }

    /// Number of fields.
    pub fn field_count(&self) -> usize {
        self.format.len()
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.format.len() {
            return Err(Error::FieldIndexOutOfBounds {
                index,
                count: self.format.len(),
            });
        }
        Ok(())
    }

    /// Whether the field is logically null. Its slot still holds
    /// placeholder bytes.
    pub fn is_null(&self, index: usize) -> Result<bool> {
        self.check_index(index)?;
        Ok(self.null_map[index])
    }

    /// Typed value of the field at `index`.
    ///
    /// The value is converted from the wire slot on first access and cached,
    /// so repeated reads convert at most once. LOB fields yield a fresh
    /// locator snapshot each call; rebinding the record's source later does
    /// not reach values already handed out. Null fields return their
    /// placeholder value; check [`is_null`](Record::is_null) separately.
    pub fn field(&mut self, index: usize) -> Result<FieldValue> {
        self.check_index(index)?;
        if let Some(value) = &self.values[index] {
            return Ok(value.clone());
        }
        let layout = &self.format.fields()[index];
        let offset = self.offsets[index];
        let width = self.widths[index];
        let slot = self
            .raw
            .get(offset..offset + width)
            .ok_or_else(|| Error::structural(format!("field {index} slot exceeds record")))?;
        let value = decode_slot(self.converter.as_ref(), layout, index, slot)?;
        self.values[index] = Some(value.clone());
        Ok(value)
    }

    /// Typed value of the field named `name` (case-insensitive).
    pub fn field_by_name(&mut self, name: &str) -> Result<FieldValue> {
        let index = self
            .format
            .find_by_name(name)
            .ok_or_else(|| Error::FieldNotFound { name: name.into() })?;
        self.field(index)
    }

    /// Store a value into the field at `index`.
    ///
    /// The value kind must match the field type and fit its declared width.
    /// Storing [`FieldValue::Null`] marks the null map and writes the
    /// type's default placeholder so the buffer stays well-formed.
    pub fn set_field(&mut self, index: usize, value: FieldValue) -> Result<()> {
        self.check_index(index)?;
        let layout = &self.format.fields()[index];
        if !value.matches_type(&layout.field_type) {
            return Err(Error::type_mismatch(format!(
                "field {:?} is {}, cannot store {value}",
                layout.name, layout.field_type
            )));
        }
        let is_null = value.is_null();
        let stored = if is_null {
            placeholder_for(self.converter.as_ref(), &self.format, index)
        } else {
            normalize_value(layout, value)
        };
        if self.format.has_dependencies() {
            if layout.length_depends_on.is_none() {
                // Validates kind and width up front; bytes are rebuilt later.
                encode_slot(self.converter.as_ref(), layout, &stored)?;
            } else {
                self.converter.to_bytes(&layout.field_type, &stored)?;
            }
            self.needs_rebuild = true;
        } else {
            let slot = encode_slot(self.converter.as_ref(), layout, &stored)?;
            let offset = self.offsets[index];
            let width = self.widths[index];
            if slot.len() != width {
                return Err(Error::structural(format!(
                    "field {:?} slot produced {} bytes, expected {width}",
                    layout.name,
                    slot.len()
                )));
            }
            self.raw[offset..offset + width].copy_from_slice(&slot);
        }
        self.values[index] = Some(stored.clone());
        self.null_map[index] = is_null;
        for observer in &mut self.observers {
            observer.field_changed(index, &stored);
        }
        Ok(())
    }

    /// Store a value into the field named `name` (case-insensitive).
    pub fn set_field_by_name(&mut self, name: &str, value: FieldValue) -> Result<()> {
        let index = self
            .format
            .find_by_name(name)
            .ok_or_else(|| Error::FieldNotFound { name: name.into() })?;
        self.set_field(index, value)
    }

    /// Mark the field null, writing its placeholder bytes.
    pub fn set_null(&mut self, index: usize) -> Result<()> {
        self.set_field(index, FieldValue::Null)
    }

    /// Register an observer for subsequent field mutations.
    pub fn add_observer(&mut self, observer: Box<dyn RecordObserver>) {
        self.observers.push(observer);
    }

    fn ensure_built(&mut self) -> Result<()> {
        if !self.needs_rebuild {
            return Ok(());
        }
        tracing::debug!(format = self.format.name(), "rebuilding dependent record");
        let values = self.materialized_values()?;
        let (raw, offsets, widths) =
            build_record(&self.format, self.converter.as_ref(), &values)?;
        self.raw = raw;
        self.offsets = offsets;
        self.widths = widths;
        self.needs_rebuild = false;
        Ok(())
    }

    fn materialized_values(&self) -> Result<Vec<FieldValue>> {
        self.values
            .iter()
            .enumerate()
            .map(|(index, value)| {
                value
                    .clone()
                    .ok_or_else(|| Error::structural(format!("field {index} has no value yet")))
            })
            .collect()
    }

    /// The record's wire bytes, rebuilt first if a dependent-format field
    /// was changed since the last build.
    pub fn contents(&mut self) -> Result<&[u8]> {
        self.ensure_built()?;
        Ok(&self.raw)
    }

    /// Values of the key fields, in declared key order.
    pub fn key_field_values(&mut self) -> Result<Vec<FieldValue>> {
        let indices = self.format.key_indices().to_vec();
        indices.into_iter().map(|index| self.field(index)).collect()
    }

    /// Wire bytes of the key fields: each key field's full slot, prefix
    /// included for variable-length fields, concatenated in declared key
    /// order with no separators.
    pub fn key_field_bytes(&mut self) -> Result<Vec<u8>> {
        self.ensure_built()?;
        let mut out = Vec::new();
        for &index in self.format.key_indices() {
            let offset = self.offsets[index];
            let width = self.widths[index];
            out.extend_from_slice(&self.raw[offset..offset + width]);
        }
        Ok(out)
    }
}

fn placeholder_for(
    converter: &dyn DataConverter,
    format: &RecordFormat,
    index: usize,
) -> FieldValue {
    let layout = &format.fields()[index];
    if layout.field_type.is_lob() {
        FieldValue::Lob(crate::lob::locator::LobLocator::new(index))
    } else {
        normalize_value(layout, converter.default_value(&layout.field_type))
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("format", &self.format.name())
            .field("wire_len", &self.raw.len())
            .field("values", &self.values)
            .field("null_map", &self.null_map)
            .finish_non_exhaustive()
    }
}
