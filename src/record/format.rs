//! Record format: the ordered field layouts shared by all records of a kind.

use crate::error::{Error, Result};
use crate::record::field::{FieldLayout, FieldType};

/// Ordered collection of field layouts plus key-field designation.
///
/// A format is validated once at construction and shared read-only across
/// every record built from it (wrap it in an `Arc`). When no field depends
/// on another, slot offsets and the total record length are precomputed
/// here; dependent formats resolve them per record instead.
#[derive(Debug)]
pub struct RecordFormat {
    name: String,
    fields: Vec<FieldLayout>,
    key_indices: Vec<usize>,
    has_dependencies: bool,
    static_offsets: Option<Vec<usize>>,
    record_len: Option<usize>,
}

impl RecordFormat {
    /// Create a format with no key fields.
    pub fn new(name: impl Into<String>, fields: Vec<FieldLayout>) -> Result<Self> {
        Self::with_key_fields(name, fields, Vec::new())
    }

    /// Create a format whose key consists of the given field indices, in
    /// declared key order.
    pub fn with_key_fields(
        name: impl Into<String>,
        fields: Vec<FieldLayout>,
        key_indices: Vec<usize>,
    ) -> Result<Self> {
        validate(&fields, &key_indices)?;
        let has_dependencies = fields.iter().any(|f| f.is_dependent());
        let (static_offsets, record_len) = if has_dependencies {
            (None, None)
        } else {
            let mut offsets = Vec::with_capacity(fields.len());
            let mut pos = 0;
            for field in &fields {
                offsets.push(pos);
                // slot_width is Some for every non-dependent field
                pos += field.slot_width().unwrap_or(0);
            }
            (Some(offsets), Some(pos))
        };
        Ok(Self {
            name: name.into(),
            fields,
            key_indices,
            has_dependencies,
            static_offsets,
            record_len,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &[FieldLayout] {
        &self.fields
    }

    pub fn field(&self, index: usize) -> Option<&FieldLayout> {
        self.fields.get(index)
    }

    /// Find a field index by name, case-insensitively.
    pub fn find_by_name(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| f.name.eq_ignore_ascii_case(name))
    }

    /// Field names in declaration order.
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Key field indices in declared key order.
    pub fn key_indices(&self) -> &[usize] {
        &self.key_indices
    }

    /// True when any field's width or position depends on another field.
    pub fn has_dependencies(&self) -> bool {
        self.has_dependencies
    }

    /// Precomputed slot offsets, present only for dependency-free formats.
    pub fn static_offsets(&self) -> Option<&[usize]> {
        self.static_offsets.as_deref()
    }

    /// Total wire length, present only for dependency-free formats.
    pub fn record_len(&self) -> Option<usize> {
        self.record_len
    }
}

fn validate(fields: &[FieldLayout], key_indices: &[usize]) -> Result<()> {
    if fields.is_empty() {
        return Err(Error::EmptyFormat);
    }
    for (index, field) in fields.iter().enumerate() {
        if let FieldType::Array { elem, .. } = &field.field_type {
            if elem.fixed_width().is_none() {
                return Err(Error::structural(format!(
                    "field {:?}: array element type {elem} is not fixed-width",
                    field.name
                )));
            }
        }
        if field.variable_length
            && !matches!(field.field_type, FieldType::Text | FieldType::Bytes)
        {
            return Err(Error::structural(format!(
                "field {:?}: only text and binary fields may be variable-length",
                field.name
            )));
        }
        if field.variable_length && field.byte_length > u16::MAX as usize {
            return Err(Error::structural(format!(
                "field {:?}: variable-length maximum {} does not fit a 2-byte prefix",
                field.name, field.byte_length
            )));
        }
        if let Some(dep) = field.length_depends_on {
            if !matches!(field.field_type, FieldType::Text | FieldType::Bytes) {
                return Err(Error::structural(format!(
                    "field {:?}: only text and binary fields may have a length dependency",
                    field.name
                )));
            }
            check_dependency(fields, index, dep)?;
        }
        if let Some(dep) = field.offset_depends_on {
            check_dependency(fields, index, dep)?;
        }
        if field.length_depends_on.is_none()
            && field.field_type.fixed_width().is_none()
            && field.byte_length == 0
        {
            return Err(Error::structural(format!(
                "field {:?}: {} fields need a declared byte length",
                field.name, field.field_type
            )));
        }
    }
    for &index in key_indices {
        if index >= fields.len() {
            return Err(Error::FieldIndexOutOfBounds {
                index,
                count: fields.len(),
            });
        }
    }
    Ok(())
}

fn check_dependency(fields: &[FieldLayout], index: usize, dep: usize) -> Result<()> {
    if dep >= index {
        return Err(Error::InvalidDependency {
            field: index,
            depends_on: dep,
            reason: "dependencies must reference an earlier field".into(),
        });
    }
    if !fields[dep].field_type.is_integer() {
        return Err(Error::InvalidDependency {
            field: index,
            depends_on: dep,
            reason: format!(
                "dependency source must be an integer field, {:?} is {}",
                fields[dep].name, fields[dep].field_type
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_format_rejected() {
        let err = RecordFormat::new("empty", vec![]).unwrap_err();
        assert!(matches!(err, Error::EmptyFormat));
    }

    #[test]
    fn test_static_offsets() {
        let format = RecordFormat::new(
            "item",
            vec![
                FieldLayout::new("id", FieldType::Int32),
                FieldLayout::sized("code", FieldType::Text, 10),
                FieldLayout::variable("note", FieldType::Text, 20),
            ],
        )
        .unwrap();
        assert!(!format.has_dependencies());
        assert_eq!(format.static_offsets(), Some(&[0, 4, 14][..]));
        assert_eq!(format.record_len(), Some(36));
    }

    #[test]
    fn test_dependent_format_has_no_static_layout() {
        let format = RecordFormat::new(
            "msg",
            vec![
                FieldLayout::new("len", FieldType::Int32),
                FieldLayout::sized("body", FieldType::Bytes, 0).with_length_dependency(0),
            ],
        )
        .unwrap();
        assert!(format.has_dependencies());
        assert!(format.static_offsets().is_none());
        assert!(format.record_len().is_none());
    }

    #[test]
    fn test_forward_dependency_rejected() {
        let err = RecordFormat::new(
            "bad",
            vec![
                FieldLayout::sized("body", FieldType::Bytes, 0).with_length_dependency(1),
                FieldLayout::new("len", FieldType::Int32),
            ],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidDependency { field: 0, depends_on: 1, .. }
        ));
    }

    #[test]
    fn test_non_integer_dependency_source_rejected() {
        let err = RecordFormat::new(
            "bad",
            vec![
                FieldLayout::sized("tag", FieldType::Text, 4),
                FieldLayout::sized("body", FieldType::Bytes, 0).with_length_dependency(0),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidDependency { .. }));
    }

    #[test]
    fn test_unsized_text_rejected() {
        let err = RecordFormat::new(
            "bad",
            vec![FieldLayout::sized("name", FieldType::Text, 0)],
        )
        .unwrap_err();
        assert!(matches!(err, Error::Structural { .. }));
    }

    #[test]
    fn test_variable_scalar_rejected() {
        let mut layout = FieldLayout::new("n", FieldType::Int32);
        layout.variable_length = true;
        let err = RecordFormat::new("bad", vec![layout]).unwrap_err();
        assert!(matches!(err, Error::Structural { .. }));
    }

    #[test]
    fn test_variable_maximum_capped_by_prefix() {
        let err = RecordFormat::new(
            "bad",
            vec![FieldLayout::variable("big", FieldType::Bytes, 70_000)],
        )
        .unwrap_err();
        assert!(matches!(err, Error::Structural { .. }));
    }

    #[test]
    fn test_key_index_bounds() {
        let err = RecordFormat::with_key_fields(
            "keyed",
            vec![FieldLayout::new("id", FieldType::Int32)],
            vec![1],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::FieldIndexOutOfBounds { index: 1, count: 1 }
        ));
    }

    #[test]
    fn test_find_by_name_ignores_case() {
        let format = RecordFormat::new(
            "item",
            vec![
                FieldLayout::new("id", FieldType::Int32),
                FieldLayout::sized("Code", FieldType::Text, 4),
            ],
        )
        .unwrap();
        assert_eq!(format.find_by_name("CODE"), Some(1));
        assert_eq!(format.find_by_name("code"), Some(1));
        assert_eq!(format.find_by_name("missing"), None);
        assert_eq!(format.field_names(), vec!["id", "Code"]);
    }
}
