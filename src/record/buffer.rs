//! Buffer utilities for reading and writing record wire data.

use bytes::{BufMut, Bytes, BytesMut};

use crate::convert::ByteOrder;
use crate::error::{Error, Result};

/// Bounds-checked reader over one record's wire bytes.
pub struct RecordBuffer {
    data: Bytes,
    pos: usize,
}

impl RecordBuffer {
    /// Wrap a wire buffer for positional reads.
    pub fn new(data: Bytes) -> Self {
        Self { data, pos: 0 }
    }

    /// Current read position.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// True when at least `n` bytes are left.
    pub fn has_remaining(&self, n: usize) -> bool {
        self.remaining() >= n
    }

    /// Advance past `n` bytes.
    pub fn skip(&mut self, n: usize) -> Result<()> {
        if !self.has_remaining(n) {
            return Err(Error::BufferTooSmall {
                needed: n,
                available: self.remaining(),
                location: std::panic::Location::caller(),
            });
        }
        self.pos += n;
        Ok(())
    }

    /// Move the read position to an absolute offset.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(Error::OffsetOutOfRange {
                offset: pos,
                len: self.data.len(),
            });
        }
        self.pos = pos;
        Ok(())
    }

    /// Read a u16 in the given byte order.
    pub fn read_u16(&mut self, order: ByteOrder) -> Result<u16> {
        if !self.has_remaining(2) {
            return Err(Error::BufferTooSmall {
                needed: 2,
                available: self.remaining(),
                location: std::panic::Location::caller(),
            });
        }
        let raw = [self.data[self.pos], self.data[self.pos + 1]];
        self.pos += 2;
        Ok(match order {
            ByteOrder::BigEndian => u16::from_be_bytes(raw),
            ByteOrder::LittleEndian => u16::from_le_bytes(raw),
        })
    }

    /// Read a u32 in the given byte order.
    pub fn read_u32(&mut self, order: ByteOrder) -> Result<u32> {
        if !self.has_remaining(4) {
            return Err(Error::BufferTooSmall {
                needed: 4,
                available: self.remaining(),
                location: std::panic::Location::caller(),
            });
        }
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&self.data[self.pos..self.pos + 4]);
        self.pos += 4;
        Ok(match order {
            ByteOrder::BigEndian => u32::from_be_bytes(raw),
            ByteOrder::LittleEndian => u32::from_le_bytes(raw),
        })
    }

    /// Read `n` bytes as a shared slice of the underlying buffer.
    pub fn read_bytes(&mut self, n: usize) -> Result<Bytes> {
        if !self.has_remaining(n) {
            return Err(Error::BufferTooSmall {
                needed: n,
                available: self.remaining(),
                location: std::panic::Location::caller(),
            });
        }
        let bytes = self.data.slice(self.pos..self.pos + n);
        self.pos += n;
        Ok(bytes)
    }
}

/// Growable writer assembling a record's wire bytes.
pub struct RecordWriter {
    data: BytesMut,
}

impl RecordWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    /// Create an empty writer with room for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(capacity),
        }
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The written bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Take the buffer contents, leaving the writer empty.
    pub fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.data).to_vec()
    }

    /// Write a u16 in the given byte order.
    pub fn write_u16(&mut self, val: u16, order: ByteOrder) {
        match order {
            ByteOrder::BigEndian => self.data.put_u16(val),
            ByteOrder::LittleEndian => self.data.put_u16_le(val),
        }
    }

    /// Write a u32 in the given byte order.
    pub fn write_u32(&mut self, val: u32, order: ByteOrder) {
        match order {
            ByteOrder::BigEndian => self.data.put_u32(val),
            ByteOrder::LittleEndian => self.data.put_u32_le(val),
        }
    }

    /// Append a byte slice.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Write `count` copies of a fill byte.
    pub fn write_fill(&mut self, byte: u8, count: usize) {
        self.data.put_bytes(byte, count);
    }
}

impl Default for RecordWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_past_end_reports_sizes() {
        let mut buf = RecordBuffer::new(Bytes::from_static(&[1, 2, 3]));
        buf.skip(2).unwrap();
        let err = buf.read_u32(ByteOrder::BigEndian).unwrap_err();
        match err {
            Error::BufferTooSmall { needed, available, .. } => {
                assert_eq!(needed, 4);
                assert_eq!(available, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_read_u16_both_orders() {
        let mut buf = RecordBuffer::new(Bytes::from_static(&[0x12, 0x34, 0x12, 0x34]));
        assert_eq!(buf.read_u16(ByteOrder::BigEndian).unwrap(), 0x1234);
        assert_eq!(buf.read_u16(ByteOrder::LittleEndian).unwrap(), 0x3412);
    }

    #[test]
    fn test_seek_bounds() {
        let mut buf = RecordBuffer::new(Bytes::from_static(&[0; 8]));
        buf.seek(8).unwrap();
        assert_eq!(buf.remaining(), 0);
        let err = buf.seek(9).unwrap_err();
        assert!(matches!(err, Error::OffsetOutOfRange { offset: 9, len: 8 }));
    }

    #[test]
    fn test_write_scalars_both_orders() {
        let mut w = RecordWriter::new();
        assert!(w.is_empty());
        w.write_u16(5, ByteOrder::BigEndian);
        w.write_u32(77, ByteOrder::BigEndian);
        assert_eq!(w.as_bytes(), &[0x00, 0x05, 0x00, 0x00, 0x00, 0x4d]);

        let mut w = RecordWriter::new();
        w.write_u16(5, ByteOrder::LittleEndian);
        w.write_u32(77, ByteOrder::LittleEndian);
        assert_eq!(w.take(), vec![0x05, 0x00, 0x4d, 0x00, 0x00, 0x00]);
        assert!(w.is_empty());
    }

    #[test]
    fn test_write_fill() {
        let mut w = RecordWriter::new();
        w.write_bytes(b"ab");
        w.write_fill(0x20, 3);
        assert_eq!(w.as_bytes(), b"ab   ");
    }
}
