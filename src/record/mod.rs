//! Record marshaling: formats, values, and the flat wire representation.

pub mod buffer;
pub mod codec;
pub mod field;
pub mod format;
#[allow(clippy::module_inception)]
pub mod record;
pub mod value;

pub use buffer::{RecordBuffer, RecordWriter};
pub use codec::RecordCodec;
pub use field::{DefaultValue, FieldLayout, FieldType};
pub use format::RecordFormat;
pub use record::{Record, RecordObserver};
pub use value::FieldValue;
