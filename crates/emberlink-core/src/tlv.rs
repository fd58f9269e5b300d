//! Type-length-value primitives shared by the payload codecs.
//!
//! Two length conventions coexist on the wire: announcement-style payloads
//! use 1-byte lengths, file payloads use 2-byte lengths for short fields
//! and a 4-byte length for content records (with a legacy 2-byte
//! fallback handled in the file codec itself). The reader is a plain
//! cursor; each payload codec chooses the width per record.

use crate::error::CodecError;

/// Cursor over a TLV byte stream.
pub(crate) struct TlvReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> TlvReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes left in the stream.
    pub(crate) fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Read the next record's type byte.
    pub(crate) fn read_type(&mut self) -> Result<u8, CodecError> {
        let byte = *self.data.get(self.pos).ok_or(CodecError::Truncated {
            expected: 1,
            actual: 0,
        })?;
        self.pos += 1;
        Ok(byte)
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < len {
            return Err(CodecError::Truncated {
                expected: len,
                actual: self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    /// Read a value with a 1-byte length prefix.
    pub(crate) fn read_value_u8(&mut self) -> Result<&'a [u8], CodecError> {
        let len = usize::from(self.take(1)?[0]);
        self.take(len)
    }

    /// Read a value with a 2-byte big-endian length prefix.
    pub(crate) fn read_value_u16(&mut self) -> Result<&'a [u8], CodecError> {
        let len_bytes = self.take(2)?;
        let len = usize::from(u16::from_be_bytes([len_bytes[0], len_bytes[1]]));
        self.take(len)
    }

    /// Read a value with a 4-byte big-endian length prefix.
    pub(crate) fn read_value_u32(&mut self) -> Result<&'a [u8], CodecError> {
        let len_bytes = self.take(4)?;
        let len = u32::from_be_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]);
        self.take(len as usize)
    }

    /// Peek the 4-byte big-endian length at the cursor without consuming.
    ///
    /// Returns `None` if fewer than 4 bytes remain.
    pub(crate) fn peek_u32_len(&self) -> Option<u32> {
        if self.remaining() < 4 {
            return None;
        }
        let b = &self.data[self.pos..self.pos + 4];
        Some(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }
}

/// Append-style writer with explicit length prefixes.
pub(crate) struct TlvWriter {
    buf: Vec<u8>,
}

impl TlvWriter {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Write a record with a 1-byte length. Caller validates `value.len() <= 255`.
    pub(crate) fn record_u8(&mut self, tlv_type: u8, value: &[u8]) {
        debug_assert!(value.len() <= usize::from(u8::MAX));
        self.buf.push(tlv_type);
        self.buf.push(value.len() as u8);
        self.buf.extend_from_slice(value);
    }

    /// Write a record with a 2-byte big-endian length.
    pub(crate) fn record_u16(&mut self, tlv_type: u8, value: &[u8]) {
        debug_assert!(value.len() <= usize::from(u16::MAX));
        self.buf.push(tlv_type);
        self.buf.extend_from_slice(&(value.len() as u16).to_be_bytes());
        self.buf.extend_from_slice(value);
    }

    /// Write a record with a 4-byte big-endian length.
    pub(crate) fn record_u32(&mut self, tlv_type: u8, value: &[u8]) {
        debug_assert!(value.len() <= u32::MAX as usize);
        self.buf.push(tlv_type);
        self.buf.extend_from_slice(&(value.len() as u32).to_be_bytes());
        self.buf.extend_from_slice(value);
    }

    pub(crate) fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_u8_record() {
        let mut writer = TlvWriter::with_capacity(16);
        writer.record_u8(0x01, b"abc");
        let bytes = writer.into_bytes();

        let mut reader = TlvReader::new(&bytes);
        assert_eq!(reader.read_type().unwrap(), 0x01);
        assert_eq!(reader.read_value_u8().unwrap(), b"abc");
        assert!(reader.is_empty());
    }

    #[test]
    fn test_reader_u16_and_u32_records() {
        let mut writer = TlvWriter::with_capacity(32);
        writer.record_u16(0x02, b"wide");
        writer.record_u32(0x03, b"content");
        let bytes = writer.into_bytes();

        let mut reader = TlvReader::new(&bytes);
        assert_eq!(reader.read_type().unwrap(), 0x02);
        assert_eq!(reader.read_value_u16().unwrap(), b"wide");
        assert_eq!(reader.read_type().unwrap(), 0x03);
        assert_eq!(reader.read_value_u32().unwrap(), b"content");
    }

    #[test]
    fn test_truncated_value_fails() {
        // Declares 5 bytes, provides 2
        let bytes = [0x01, 0x05, 0xaa, 0xbb];
        let mut reader = TlvReader::new(&bytes);
        reader.read_type().unwrap();
        assert!(matches!(
            reader.read_value_u8(),
            Err(CodecError::Truncated { expected: 5, actual: 2 })
        ));
    }

    #[test]
    fn test_empty_stream() {
        let mut reader = TlvReader::new(&[]);
        assert!(reader.is_empty());
        assert!(reader.read_type().is_err());
    }

    #[test]
    fn test_peek_u32_len() {
        let bytes = [0x00, 0x00, 0x00, 0x07, 0xff];
        let reader = TlvReader::new(&bytes);
        assert_eq!(reader.peek_u32_len(), Some(7));
        assert_eq!(TlvReader::new(&bytes[..3]).peek_u32_len(), None);
    }
}
