//! Record marshaling engine for a remote record-store client.
//!
//! Converts between declarative field layouts and the flat byte buffers a
//! record store exchanges on the wire, and defers large-object values
//! behind small locator handles until the server is ready to take them.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use recwire::{FieldLayout, FieldType, FieldValue, RecordCodec, RecordFormat, WireConverter};
//!
//! fn main() -> recwire::Result<()> {
//!     let format = RecordFormat::new(
//!         "inventory",
//!         vec![
//!             FieldLayout::new("id", FieldType::Int32),
//!             FieldLayout::variable("name", FieldType::Text, 12),
//!         ],
//!     )?;
//!     let codec = RecordCodec::new(Arc::new(format), Arc::new(WireConverter::big_endian()));
//!
//!     let mut record = codec.initialize_defaults()?;
//!     record.set_field(0, FieldValue::Int32(42))?;
//!     record.set_field_by_name("name", FieldValue::Text("socket set".into()))?;
//!
//!     let wire = codec.encode(&mut record)?;
//!     assert_eq!(wire.len(), 4 + 2 + 12);
//!
//!     let mut copy = codec.decode(&wire, 0)?;
//!     assert_eq!(copy.field(0)?, FieldValue::Int32(42));
//!     Ok(())
//! }
//! ```

pub mod convert;
pub mod error;
pub mod lob;
pub mod record;
pub mod session;

// Re-export main types
pub use convert::{ByteOrder, DataConverter, WireConverter};
pub use error::{Error, Result};
pub use lob::{LobLocator, LobValue, LobValueBinder};
pub use record::{
    DefaultValue, FieldLayout, FieldType, FieldValue, Record, RecordCodec, RecordFormat,
    RecordObserver,
};
pub use session::{LocatorSession, MemorySession};
