//! Deferred binding of large-object values.
//!
//! A [`LobValueBinder`] accepts a value for one LOB column ahead of time,
//! in whichever shape the application has it, and transmits it later in a
//! single flush once the server has assigned a locator handle. Until then
//! nothing touches the wire.

use std::fmt;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::convert::{hex_to_bytes, ByteOrder};
use crate::error::{Error, Result};
use crate::lob::locator::LobLocator;
use crate::session::LocatorSession;

/// Largest slice handed to a single locator write.
const LOB_WRITE_CHUNK: usize = 32 * 1024;

enum BoundValue {
    Bytes(Bytes),
    Stream {
        reader: Box<dyn AsyncRead + Send + Unpin>,
        declared: Option<u64>,
    },
    Value(LobValue),
}

/// Snapshot of a binder's pending value, detached from the binder itself.
///
/// Binding a snapshot into another binder copies the LOB without the
/// application handling raw bytes: snapshots taken before a flush carry
/// the pending bytes directly, and one built from a bound locator is
/// copied through the session at flush time.
#[derive(Debug, Clone)]
pub struct LobValue {
    locator: LobLocator,
    pending: Option<Bytes>,
}

impl LobValue {
    /// Value that refers to data already stored under `locator`.
    pub fn from_locator(locator: LobLocator) -> Self {
        Self {
            locator,
            pending: None,
        }
    }

    pub fn locator(&self) -> &LobLocator {
        &self.locator
    }

    /// Bytes captured at snapshot time, if any.
    pub fn pending(&self) -> Option<&Bytes> {
        self.pending.as_ref()
    }
}

/// Holds one LOB column's outgoing value until the server side is ready.
///
/// The binder accepts bytes, text, an async stream, or another binder's
/// [`LobValue`]. [`flush`](Self::flush) materializes whatever is bound,
/// truncates it to the declared maximum length, and writes it through the
/// session in chunks, marking the final chunk complete. A flush with
/// nothing bound, or a repeated flush of an already-written value, does
/// nothing. Assigning a new handle with [`set_handle`](Self::set_handle)
/// drops every trace of the previous value so a recycled handle can never
/// receive stale data.
pub struct LobValueBinder {
    locator: LobLocator,
    max_length: u64,
    binary: bool,
    bound: Option<BoundValue>,
    materialized: Option<Bytes>,
    written: bool,
    truncated: u64,
}

impl LobValueBinder {
    /// Binder for a binary LOB column. `max_length` of zero means no limit.
    pub fn binary(column_index: usize, max_length: u64) -> Self {
        Self::with_kind(column_index, max_length, true)
    }

    /// Binder for a character LOB column. `max_length` of zero means no
    /// limit.
    pub fn character(column_index: usize, max_length: u64) -> Self {
        Self::with_kind(column_index, max_length, false)
    }

    fn with_kind(column_index: usize, max_length: u64, binary: bool) -> Self {
        Self {
            locator: LobLocator::new(column_index),
            max_length,
            binary,
            bound: None,
            materialized: None,
            written: false,
            truncated: 0,
        }
    }

    /// Wrap an existing locator, usually one decoded out of a record.
    pub fn with_locator(mut self, locator: LobLocator) -> Self {
        self.locator = locator;
        self
    }

    pub fn locator(&self) -> &LobLocator {
        &self.locator
    }

    pub fn column_index(&self) -> usize {
        self.locator.column_index()
    }

    pub fn is_binary(&self) -> bool {
        self.binary
    }

    pub fn max_length(&self) -> u64 {
        self.max_length
    }

    /// Whether the bound value has already been transmitted.
    pub fn is_written(&self) -> bool {
        self.written
    }

    /// Bytes dropped from the bound value by the declared maximum length.
    pub fn truncated_bytes(&self) -> u64 {
        self.truncated
    }

    /// The locator handle in wire form, zero when unbound.
    pub fn parameter_bytes(&self, order: ByteOrder) -> [u8; 4] {
        self.locator.encode_handle(order)
    }

    /// Adopt a server-assigned handle.
    ///
    /// Handles are recycled by the server, so everything tied to the old
    /// handle is dropped: the bound value, the materialized cache, the
    /// written flag, and the truncation count. The caller binds a fresh
    /// value afterwards if one should be written under the new handle.
    pub fn set_handle(&mut self, handle: u32) {
        self.locator.set_handle(handle);
        self.bound = None;
        self.materialized = None;
        self.written = false;
        self.truncated = 0;
    }

    /// Drop any bound value without touching the locator.
    pub fn clear(&mut self) {
        self.bound = None;
        self.materialized = None;
        self.written = false;
        self.truncated = 0;
    }

    /// Bind raw bytes. Truncation against the maximum length is accounted
    /// immediately.
    pub fn bind_bytes(&mut self, data: impl Into<Bytes>) {
        let data = data.into();
        self.truncated = if self.max_length > 0 {
            (data.len() as u64).saturating_sub(self.max_length)
        } else {
            0
        };
        self.materialized = None;
        self.written = false;
        self.bound = Some(BoundValue::Bytes(data));
    }

    /// Bind a text value.
    ///
    /// For a binary column the text must be an even-length hex string and
    /// is decoded to the bytes it spells; for a character column the text
    /// is bound as its UTF-8 bytes.
    pub fn bind_text(&mut self, text: &str) -> Result<()> {
        let data = if self.binary {
            Bytes::from(hex_to_bytes(text)?)
        } else {
            Bytes::copy_from_slice(text.as_bytes())
        };
        self.bind_bytes(data);
        Ok(())
    }

    /// Bind a stream, read only when the value is first needed.
    ///
    /// With `declared` set, exactly that many bytes must be available;
    /// coming up short fails the flush before anything is written. Without
    /// it the stream is read to end.
    pub fn bind_stream(
        &mut self,
        reader: impl AsyncRead + Send + Unpin + 'static,
        declared: Option<u64>,
    ) {
        self.truncated = 0;
        self.materialized = None;
        self.written = false;
        self.bound = Some(BoundValue::Stream {
            reader: Box::new(reader),
            declared,
        });
    }

    /// Bind another LOB's value, copying its contents at flush time.
    pub fn bind_value(&mut self, value: LobValue) {
        self.truncated = 0;
        self.materialized = None;
        self.written = false;
        self.bound = Some(BoundValue::Value(value));
    }

    /// Snapshot the pending value for binding elsewhere.
    ///
    /// A bound stream cannot be captured without consuming it; its
    /// snapshot refers to the locator instead, which is only useful once
    /// this binder has flushed.
    pub fn value(&self) -> LobValue {
        let pending = match (&self.materialized, &self.bound) {
            (Some(data), _) => Some(data.clone()),
            (None, Some(BoundValue::Bytes(data))) => Some(data.clone()),
            _ => None,
        };
        LobValue {
            locator: self.locator.clone(),
            pending,
        }
    }

    /// Transmit the bound value under the locator's handle.
    ///
    /// No-op when nothing is bound or the value has already been written.
    /// The value is materialized, truncated to the maximum length, and
    /// written in [`LOB_WRITE_CHUNK`] slices with the last one marked
    /// complete; a zero-length value still issues one complete write so a
    /// recycled handle's previous contents are cleared.
    pub async fn flush<S: LocatorSession>(&mut self, session: &mut S) -> Result<()> {
        if self.written {
            return Ok(());
        }
        if self.bound.is_none() && self.materialized.is_none() {
            return Ok(());
        }
        let handle = self.locator.require_handle()?;
        let data = self.materialize(session).await?;
        if data.is_empty() {
            session.write_locator_data(handle, 0, &[], true).await?;
        } else {
            let mut offset = 0usize;
            while offset < data.len() {
                let end = (offset + LOB_WRITE_CHUNK).min(data.len());
                let complete = end == data.len();
                session
                    .write_locator_data(handle, offset as u64, &data[offset..end], complete)
                    .await?;
                offset = end;
            }
        }
        self.locator.set_cached_length(data.len() as u64);
        self.written = true;
        tracing::debug!(
            column_index = self.locator.column_index(),
            handle,
            bytes = data.len(),
            truncated = self.truncated,
            "flushed LOB value"
        );
        Ok(())
    }

    /// Read back the bound value exactly as a flush would store it.
    ///
    /// A bound stream is consumed at most once; the materialized bytes are
    /// cached, so repeated reads and a later flush all see the same value.
    /// Returns empty bytes when nothing is bound.
    pub async fn materialize_for_read<S: LocatorSession>(
        &mut self,
        session: &mut S,
    ) -> Result<Bytes> {
        if self.bound.is_none() && self.materialized.is_none() {
            return Ok(Bytes::new());
        }
        self.materialize(session).await
    }

    async fn materialize<S: LocatorSession>(&mut self, session: &mut S) -> Result<Bytes> {
        if let Some(data) = &self.materialized {
            return Ok(data.clone());
        }
        let data = match self.bound.take() {
            None => Bytes::new(),
            Some(BoundValue::Bytes(data)) => data,
            Some(BoundValue::Stream {
                reader,
                declared: Some(declared),
            }) => {
                let mut data = Vec::new();
                let mut limited = reader.take(declared);
                limited.read_to_end(&mut data).await?;
                if (data.len() as u64) < declared {
                    return Err(Error::StreamShortRead {
                        declared,
                        available: data.len() as u64,
                    });
                }
                Bytes::from(data)
            }
            Some(BoundValue::Stream {
                mut reader,
                declared: None,
            }) => {
                let mut data = Vec::new();
                reader.read_to_end(&mut data).await?;
                Bytes::from(data)
            }
            Some(BoundValue::Value(value)) => match value.pending {
                Some(data) => data,
                None => {
                    let mut source = value.locator;
                    let total = source.length(session).await?;
                    let mut out =
                        BytesMut::with_capacity(total.min(LOB_WRITE_CHUNK as u64) as usize);
                    let mut offset = 0u64;
                    while offset < total {
                        let want = (total - offset).min(LOB_WRITE_CHUNK as u64);
                        let chunk = source.read(session, offset, want).await?;
                        if chunk.is_empty() {
                            return Err(Error::connectivity(
                                "locator read stalled before the reported length",
                            ));
                        }
                        offset += chunk.len() as u64;
                        out.extend_from_slice(&chunk);
                    }
                    out.freeze()
                }
            },
        };
        let data = if self.max_length > 0 && (data.len() as u64) > self.max_length {
            self.truncated = data.len() as u64 - self.max_length;
            data.slice(..self.max_length as usize)
        } else {
            data
        };
        self.materialized = Some(data.clone());
        Ok(data)
    }
}

impl fmt::Debug for LobValueBinder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LobValueBinder")
            .field("locator", &self.locator)
            .field("binary", &self.binary)
            .field("max_length", &self.max_length)
            .field("written", &self.written)
            .field("truncated", &self.truncated)
            .finish_non_exhaustive()
    }
}
