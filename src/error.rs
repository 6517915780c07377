//! Error types for record marshaling and LOB operations.

use std::io;
use std::panic::Location;
use thiserror::Error;

/// Result type alias for recwire operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for record marshaling and LOB operations.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error while reading a caller-supplied stream.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Buffer too small for the requested read or decode.
    #[error("Buffer too small: need {needed} bytes, have {available} at {location}")]
    BufferTooSmall { needed: usize, available: usize, location: &'static Location<'static> },

    /// Field index out of bounds for the record format.
    #[error("Field index {index} out of bounds (fields: {count})")]
    FieldIndexOutOfBounds { index: usize, count: usize },

    /// Field not found by name.
    #[error("Field not found: {name}")]
    FieldNotFound { name: String },

    /// Record format declares no fields.
    #[error("Record format must declare at least one field")]
    EmptyFormat,

    /// Field dependency that cannot be resolved.
    #[error("Field {field} has an invalid dependency on field {depends_on}: {reason}")]
    InvalidDependency { field: usize, depends_on: usize, reason: String },

    /// Resolved offset outside the record buffer.
    #[error("Offset {offset} out of range (record length: {len})")]
    OffsetOutOfRange { offset: usize, len: usize },

    /// Malformed buffer or layout contents.
    #[error("Structural error: {message}")]
    Structural { message: String },

    /// Character data that cannot be represented in the target encoding.
    #[error("Encoding error: {message}")]
    Encoding { message: String },

    /// Value kind does not match the field or binder type.
    #[error("Type mismatch: {message}")]
    TypeMismatch { message: String },

    /// Stream ended before its declared length was read.
    #[error("Stream ended after {available} bytes ({declared} declared)")]
    StreamShortRead { declared: u64, available: u64 },

    /// Locator operation attempted before a handle was assigned.
    #[error("Locator for column {column_index} has no handle")]
    UnboundLocator { column_index: usize },

    /// Session round trip failed.
    #[error("Connectivity error: {message}")]
    Connectivity { message: String },
}

impl Error {
    /// Create a structural error.
    pub fn structural(message: impl Into<String>) -> Self {
        Self::Structural {
            message: message.into(),
        }
    }

    /// Create an encoding error.
    pub fn encoding(message: impl Into<String>) -> Self {
        Self::Encoding {
            message: message.into(),
        }
    }

    /// Create a type mismatch error.
    pub fn type_mismatch(message: impl Into<String>) -> Self {
        Self::TypeMismatch {
            message: message.into(),
        }
    }

    /// Create a connectivity error.
    pub fn connectivity(message: impl Into<String>) -> Self {
        Self::Connectivity {
            message: message.into(),
        }
    }
}
