//! Locator handles standing in for large object values.

use bytes::Bytes;

use crate::convert::ByteOrder;
use crate::error::{Error, Result};
use crate::session::LocatorSession;

/// A 4-byte handle referencing a large object held by the store.
///
/// A locator is a value: cloning it snapshots the current handle, so a
/// locator handed out of a decoded record is unaffected when the source is
/// later rebound to a recycled handle. The cached length is tied to the
/// handle and is dropped on every rebind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobLocator {
    column_index: usize,
    handle: Option<u32>,
    length: Option<u64>,
}

impl LobLocator {
    /// Create an unbound locator for the given column position.
    pub fn new(column_index: usize) -> Self {
        Self {
            column_index,
            handle: None,
            length: None,
        }
    }

    /// Create a locator already bound to a handle.
    pub fn with_handle(column_index: usize, handle: u32) -> Self {
        Self {
            column_index,
            handle: Some(handle),
            length: None,
        }
    }

    /// Build a locator from the raw 4-byte wire value of its slot.
    ///
    /// Handle 0 is the wire form of an unbound locator.
    pub fn from_wire(column_index: usize, raw: u32) -> Self {
        if raw == 0 {
            Self::new(column_index)
        } else {
            Self::with_handle(column_index, raw)
        }
    }

    pub fn column_index(&self) -> usize {
        self.column_index
    }

    pub fn handle(&self) -> Option<u32> {
        self.handle
    }

    pub fn is_bound(&self) -> bool {
        self.handle.is_some()
    }

    /// Cached object length, if one was fetched or supplied.
    pub fn cached_length(&self) -> Option<u64> {
        self.length
    }

    /// Store a length learned out of band, such as from a describe.
    pub fn set_cached_length(&mut self, length: u64) {
        self.length = Some(length);
    }

    /// Bind this locator to a (possibly recycled) handle.
    ///
    /// Any cached length belonged to the previous handle and is dropped.
    pub fn set_handle(&mut self, handle: u32) {
        tracing::debug!(
            column_index = self.column_index,
            old = ?self.handle,
            new = handle,
            "rebinding locator"
        );
        self.handle = Some(handle);
        self.length = None;
    }

    pub(crate) fn require_handle(&self) -> Result<u32> {
        self.handle.ok_or(Error::UnboundLocator {
            column_index: self.column_index,
        })
    }

    /// Object length in bytes, fetched through the session on first use and
    /// cached until the locator is rebound.
    pub async fn length<S: LocatorSession>(&mut self, session: &mut S) -> Result<u64> {
        if let Some(length) = self.length {
            return Ok(length);
        }
        let handle = self.require_handle()?;
        let length = session.locator_length(handle).await?;
        self.length = Some(length);
        Ok(length)
    }

    /// Read up to `len` bytes of the object starting at `offset`.
    pub async fn read<S: LocatorSession>(
        &mut self,
        session: &mut S,
        offset: u64,
        len: u64,
    ) -> Result<Bytes> {
        let handle = self.require_handle()?;
        session.read_locator_data(handle, offset, len).await
    }

    /// The 4-byte parameter form: the handle, or 0 when unbound.
    pub fn encode_handle(&self, order: ByteOrder) -> [u8; 4] {
        let raw = self.handle.unwrap_or(0);
        match order {
            ByteOrder::BigEndian => raw.to_be_bytes(),
            ByteOrder::LittleEndian => raw.to_le_bytes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemorySession;

    #[test]
    fn test_from_wire_zero_is_unbound() {
        let locator = LobLocator::from_wire(2, 0);
        assert!(!locator.is_bound());
        assert_eq!(locator.column_index(), 2);
        let locator = LobLocator::from_wire(2, 9);
        assert_eq!(locator.handle(), Some(9));
    }

    #[test]
    fn test_rebind_drops_cached_length() {
        let mut locator = LobLocator::with_handle(0, 5);
        locator.set_cached_length(1000);
        assert_eq!(locator.cached_length(), Some(1000));
        locator.set_handle(6);
        assert_eq!(locator.cached_length(), None);
        assert_eq!(locator.handle(), Some(6));
    }

    #[test]
    fn test_length_round_trip_and_cache() {
        tokio_test::block_on(async {
            let mut session = MemorySession::new();
            let handle = session.allocate();
            session
                .write_locator_data(handle, 0, b"sixteen bytes!!!", true)
                .await
                .unwrap();

            let mut locator = LobLocator::with_handle(0, handle);
            assert_eq!(locator.length(&mut session).await.unwrap(), 16);

            // Cached: growing the object is not observed until a rebind.
            session
                .write_locator_data(handle, 16, b"more", true)
                .await
                .unwrap();
            assert_eq!(locator.length(&mut session).await.unwrap(), 16);

            locator.set_handle(handle);
            assert_eq!(locator.length(&mut session).await.unwrap(), 20);
        });
    }

    #[test]
    fn test_unbound_length_is_an_error() {
        tokio_test::block_on(async {
            let mut session = MemorySession::new();
            let mut locator = LobLocator::new(3);
            let err = locator.length(&mut session).await.unwrap_err();
            assert!(matches!(err, Error::UnboundLocator { column_index: 3 }));
        });
    }

    #[test]
    fn test_length_failure_propagates() {
        tokio_test::block_on(async {
            let mut session = MemorySession::new();
            let mut locator = LobLocator::with_handle(0, 42);
            let err = locator.length(&mut session).await.unwrap_err();
            assert!(matches!(err, Error::Connectivity { .. }));
            // The failure must not poison the cache with a bogus value.
            assert_eq!(locator.cached_length(), None);
        });
    }

    #[test]
    fn test_clone_isolated_from_rebind() {
        let mut source = LobLocator::with_handle(1, 10);
        let snapshot = source.clone();
        source.set_handle(11);
        assert_eq!(snapshot.handle(), Some(10));
        assert_eq!(source.handle(), Some(11));
    }

    #[test]
    fn test_encode_handle() {
        let locator = LobLocator::with_handle(0, 0x0102_0304);
        assert_eq!(
            locator.encode_handle(ByteOrder::BigEndian),
            [1, 2, 3, 4]
        );
        assert_eq!(
            locator.encode_handle(ByteOrder::LittleEndian),
            [4, 3, 2, 1]
        );
        assert_eq!(
            LobLocator::new(0).encode_handle(ByteOrder::BigEndian),
            [0, 0, 0, 0]
        );
    }
}
