//! Session seam for locator round trips.
//!
//! The session module provides the trait through which locators and binders
//! reach the remote store. The `LocatorSession` trait defines the three
//! round trips the LOB layer needs; `MemorySession` is an in-process
//! implementation backing tests and examples.

use std::collections::HashMap;
use std::future::Future;

use bytes::{Bytes, BytesMut};

use crate::error::{Error, Result};

/// Round trips against the store holding locator-addressed objects.
///
/// Implementations transfer bytes for a 4-byte locator handle. Failures are
/// propagated to the caller unchanged; no retry or masking happens at this
/// layer, and a length query must never report 0 for a handle it could not
/// reach.
///
/// # Example
///
/// ```
/// use recwire::{LocatorSession, MemorySession};
///
/// # tokio_test::block_on(async {
/// let mut session = MemorySession::new();
/// let handle = session.allocate();
/// session.write_locator_data(handle, 0, b"hello", true).await?;
/// assert_eq!(session.locator_length(handle).await?, 5);
/// # Ok::<(), recwire::Error>(())
/// # }).unwrap();
/// ```
pub trait LocatorSession {
    /// Write `data` into the object behind `handle` starting at `offset`.
    ///
    /// `complete` marks the final piece of the value: the object is
    /// truncated to the extent written so far, so a complete write of zero
    /// bytes empties the object.
    fn write_locator_data(
        &mut self,
        handle: u32,
        offset: u64,
        data: &[u8],
        complete: bool,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Read up to `len` bytes from the object behind `handle` starting at
    /// `offset`. Short data past the end of the object is returned as-is.
    fn read_locator_data(
        &mut self,
        handle: u32,
        offset: u64,
        len: u64,
    ) -> impl Future<Output = Result<Bytes>> + Send;

    /// Current length of the object behind `handle`, in bytes.
    fn locator_length(&mut self, handle: u32) -> impl Future<Output = Result<u64>> + Send;
}

/// In-process session holding locator objects in a map.
///
/// Handles are allocated starting at 1; handle 0 is never issued, matching
/// its use as the unbound placeholder on the wire. Operations on a handle
/// that was never allocated fail with a connectivity error.
#[derive(Debug, Default)]
pub struct MemorySession {
    objects: HashMap<u32, BytesMut>,
    next_handle: u32,
}

impl MemorySession {
    pub fn new() -> Self {
        Self {
            objects: HashMap::new(),
            next_handle: 1,
        }
    }

    /// Allocate a fresh handle backed by an empty object.
    pub fn allocate(&mut self) -> u32 {
        let handle = self.next_handle;
        self.next_handle += 1;
        self.objects.insert(handle, BytesMut::new());
        handle
    }

    /// Seed an object at a specific handle, replacing any previous contents.
    pub fn insert(&mut self, handle: u32, data: &[u8]) {
        self.objects.insert(handle, BytesMut::from(data));
        if handle >= self.next_handle {
            self.next_handle = handle + 1;
        }
    }

    /// Contents of the object behind `handle`, if it exists.
    pub fn object(&self, handle: u32) -> Option<&[u8]> {
        self.objects.get(&handle).map(|b| &b[..])
    }

    fn object_mut(&mut self, handle: u32) -> Result<&mut BytesMut> {
        self.objects
            .get_mut(&handle)
            .ok_or_else(|| Error::connectivity(format!("unknown locator handle {handle}")))
    }
}

impl LocatorSession for MemorySession {
    async fn write_locator_data(
        &mut self,
        handle: u32,
        offset: u64,
        data: &[u8],
        complete: bool,
    ) -> Result<()> {
        let object = self.object_mut(handle)?;
        let offset = usize::try_from(offset)
            .map_err(|_| Error::structural(format!("write offset {offset} too large")))?;
        if object.len() < offset {
            object.resize(offset, 0);
        }
        let end = offset + data.len();
        if object.len() < end {
            object.resize(end, 0);
        }
        object[offset..end].copy_from_slice(data);
        if complete {
            object.truncate(end);
        }
        Ok(())
    }

    async fn read_locator_data(&mut self, handle: u32, offset: u64, len: u64) -> Result<Bytes> {
        let object = self.object_mut(handle)?;
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(object.len());
        let end = usize::try_from(offset.saturating_add(len))
            .unwrap_or(usize::MAX)
            .min(object.len());
        Ok(Bytes::copy_from_slice(&object[start..end]))
    }

    async fn locator_length(&mut self, handle: u32) -> Result<u64> {
        Ok(self.object_mut(handle)?.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read() {
        tokio_test::block_on(async {
            let mut session = MemorySession::new();
            let handle = session.allocate();
            session
                .write_locator_data(handle, 0, b"hello world", true)
                .await
                .unwrap();
            let data = session.read_locator_data(handle, 6, 5).await.unwrap();
            assert_eq!(&data[..], b"world");
            assert_eq!(session.locator_length(handle).await.unwrap(), 11);
        });
    }

    #[test]
    fn test_complete_write_truncates() {
        tokio_test::block_on(async {
            let mut session = MemorySession::new();
            let handle = session.allocate();
            session
                .write_locator_data(handle, 0, b"previous contents", true)
                .await
                .unwrap();
            session
                .write_locator_data(handle, 0, b"new", true)
                .await
                .unwrap();
            assert_eq!(session.object(handle), Some(&b"new"[..]));
        });
    }

    #[test]
    fn test_complete_write_of_nothing_empties() {
        tokio_test::block_on(async {
            let mut session = MemorySession::new();
            let handle = session.allocate();
            session
                .write_locator_data(handle, 0, b"leftover", true)
                .await
                .unwrap();
            session
                .write_locator_data(handle, 0, b"", true)
                .await
                .unwrap();
            assert_eq!(session.locator_length(handle).await.unwrap(), 0);
        });
    }

    #[test]
    fn test_partial_writes_accumulate() {
        tokio_test::block_on(async {
            let mut session = MemorySession::new();
            let handle = session.allocate();
            session
                .write_locator_data(handle, 0, b"abc", false)
                .await
                .unwrap();
            session
                .write_locator_data(handle, 3, b"def", true)
                .await
                .unwrap();
            assert_eq!(session.object(handle), Some(&b"abcdef"[..]));
        });
    }

    #[test]
    fn test_write_gap_zero_fills() {
        tokio_test::block_on(async {
            let mut session = MemorySession::new();
            let handle = session.allocate();
            session
                .write_locator_data(handle, 4, b"xy", true)
                .await
                .unwrap();
            assert_eq!(session.object(handle), Some(&[0, 0, 0, 0, b'x', b'y'][..]));
        });
    }

    #[test]
    fn test_unknown_handle_is_connectivity_error() {
        tokio_test::block_on(async {
            let mut session = MemorySession::new();
            let err = session.locator_length(99).await.unwrap_err();
            assert!(matches!(err, Error::Connectivity { .. }));
            let err = session.read_locator_data(99, 0, 1).await.unwrap_err();
            assert!(matches!(err, Error::Connectivity { .. }));
        });
    }

    #[test]
    fn test_read_past_end_is_short() {
        tokio_test::block_on(async {
            let mut session = MemorySession::new();
            let handle = session.allocate();
            session
                .write_locator_data(handle, 0, b"abc", true)
                .await
                .unwrap();
            let data = session.read_locator_data(handle, 1, 100).await.unwrap();
            assert_eq!(&data[..], b"bc");
            let data = session.read_locator_data(handle, 9, 4).await.unwrap();
            assert!(data.is_empty());
        });
    }
}
