//! File transfer payload.
//!
//! Short fields (name, size, mime type) carry 2-byte lengths. Content
//! records carry a 4-byte big-endian length so a file can exceed 64 KiB;
//! older senders emitted 2-byte content lengths, so decode attempts the
//! 4-byte form first and falls back to 2 bytes only when the 4-byte
//! length would overrun the buffer. Content may be split across multiple
//! records to survive fragmentation; decode concatenates them and
//! enforces the size ceiling after every fragment, not just at the end.

use tracing::debug;

use crate::error::CodecError;
use crate::tlv::{TlvReader, TlvWriter};

const TLV_NAME: u8 = 0x01;
const TLV_SIZE: u8 = 0x02;
const TLV_MIME: u8 = 0x03;
const TLV_CONTENT: u8 = 0x04;

/// Ceiling on declared size and assembled content: 1 MiB.
pub const MAX_FILE_SIZE: usize = 1024 * 1024;

/// A file offered or delivered over the mesh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePayload {
    /// Original file name
    pub name: String,
    /// Declared size in bytes
    pub size: u64,
    /// MIME type, e.g. `image/png`
    pub mime_type: String,
    /// File bytes, possibly assembled from several records
    pub content: Vec<u8>,
}

impl FilePayload {
    /// Create a payload whose declared size matches the content length.
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            size: content.len() as u64,
            mime_type: mime_type.into(),
            content,
        }
    }

    /// Encode to TLV bytes.
    ///
    /// Fails before emitting anything if the declared size or content
    /// length exceeds [`MAX_FILE_SIZE`] or the 32-bit range.
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        if self.size > MAX_FILE_SIZE as u64 || self.size > u64::from(u32::MAX) {
            return Err(CodecError::PayloadTooLarge {
                max: MAX_FILE_SIZE,
                actual: self.size as usize,
            });
        }
        if self.content.len() > MAX_FILE_SIZE {
            return Err(CodecError::PayloadTooLarge {
                max: MAX_FILE_SIZE,
                actual: self.content.len(),
            });
        }
        if self.name.len() > usize::from(u16::MAX) {
            return Err(CodecError::FieldTooLong {
                field: "name",
                max: usize::from(u16::MAX),
                actual: self.name.len(),
            });
        }
        if self.mime_type.len() > usize::from(u16::MAX) {
            return Err(CodecError::FieldTooLong {
                field: "mime_type",
                max: usize::from(u16::MAX),
                actual: self.mime_type.len(),
            });
        }

        let mut writer = TlvWriter::with_capacity(
            24 + self.name.len() + self.mime_type.len() + self.content.len(),
        );
        writer.record_u16(TLV_NAME, self.name.as_bytes());
        writer.record_u16(TLV_SIZE, &self.size.to_be_bytes());
        writer.record_u16(TLV_MIME, self.mime_type.as_bytes());
        writer.record_u32(TLV_CONTENT, &self.content);
        Ok(writer.into_bytes())
    }

    /// Decode from TLV bytes.
    ///
    /// Multiple content records are concatenated in order. The assembled
    /// content must be non-empty and stay under [`MAX_FILE_SIZE`] at
    /// every step of assembly.
    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        let mut name: Option<String> = None;
        let mut size: Option<u64> = None;
        let mut mime_type: Option<String> = None;
        let mut content: Vec<u8> = Vec::new();

        let mut reader = TlvReader::new(data);
        while !reader.is_empty() {
            let tlv_type = reader.read_type()?;
            match tlv_type {
                TLV_NAME => {
                    let value = reader.read_value_u16()?;
                    let text =
                        std::str::from_utf8(value).map_err(|_| CodecError::InvalidUtf8("name"))?;
                    name = Some(text.to_string());
                }
                TLV_SIZE => {
                    let value = reader.read_value_u16()?;
                    if value.len() != 8 {
                        return Err(CodecError::Truncated {
                            expected: 8,
                            actual: value.len(),
                        });
                    }
                    let mut raw = [0u8; 8];
                    raw.copy_from_slice(value);
                    size = Some(u64::from_be_bytes(raw));
                }
                TLV_MIME => {
                    let value = reader.read_value_u16()?;
                    let text = std::str::from_utf8(value)
                        .map_err(|_| CodecError::InvalidUtf8("mime_type"))?;
                    mime_type = Some(text.to_string());
                }
                TLV_CONTENT => {
                    let fragment = read_content_value(&mut reader)?;
                    if content.len() + fragment.len() > MAX_FILE_SIZE {
                        return Err(CodecError::PayloadTooLarge {
                            max: MAX_FILE_SIZE,
                            actual: content.len() + fragment.len(),
                        });
                    }
                    content.extend_from_slice(fragment);
                }
                other => {
                    debug!(tlv_type = other, "skipping unknown file record");
                    reader.read_value_u16()?;
                }
            }
        }

        let name = name.ok_or(CodecError::MissingField("name"))?;
        let size = size.ok_or(CodecError::MissingField("size"))?;
        let mime_type = mime_type.ok_or(CodecError::MissingField("mime_type"))?;
        if content.is_empty() {
            return Err(CodecError::EmptyContent);
        }

        Ok(Self {
            name,
            size,
            mime_type,
            content,
        })
    }
}

/// Read a content record value, preferring the 4-byte length form.
///
/// The 2-byte fallback exists only for frames produced before the
/// 4-byte migration; it is taken solely when the 4-byte interpretation
/// cannot fit the remaining buffer.
fn read_content_value<'a>(reader: &mut TlvReader<'a>) -> Result<&'a [u8], CodecError> {
    if let Some(len) = reader.peek_u32_len() {
        if len as usize <= reader.remaining() - 4 {
            return reader.read_value_u32();
        }
    }
    reader.read_value_u16()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FilePayload {
        FilePayload::new("photo.png", "image/png", vec![0xab; 2048])
    }

    #[test]
    fn test_round_trip() {
        let payload = sample();
        let bytes = payload.encode().unwrap();
        assert_eq!(FilePayload::decode(&bytes).unwrap(), payload);
    }

    #[test]
    fn test_content_over_64k_round_trips() {
        // Exercises the 4-byte length path
        let payload = FilePayload::new("big.bin", "application/octet-stream", vec![0x55; 100_000]);
        let bytes = payload.encode().unwrap();
        let decoded = FilePayload::decode(&bytes).unwrap();
        assert_eq!(decoded.content.len(), 100_000);
    }

    #[test]
    fn test_legacy_two_byte_content_length() {
        let mut writer = TlvWriter::with_capacity(128);
        writer.record_u16(TLV_NAME, b"old.txt");
        writer.record_u16(TLV_SIZE, &5u64.to_be_bytes());
        writer.record_u16(TLV_MIME, b"text/plain");
        writer.record_u16(TLV_CONTENT, b"hello");
        let decoded = FilePayload::decode(&writer.into_bytes()).unwrap();
        assert_eq!(decoded.content, b"hello");
    }

    #[test]
    fn test_fragmented_content_concatenated() {
        let mut writer = TlvWriter::with_capacity(128);
        writer.record_u16(TLV_NAME, b"split.txt");
        writer.record_u16(TLV_SIZE, &10u64.to_be_bytes());
        writer.record_u16(TLV_MIME, b"text/plain");
        writer.record_u32(TLV_CONTENT, b"hello");
        writer.record_u32(TLV_CONTENT, b"world");
        let decoded = FilePayload::decode(&writer.into_bytes()).unwrap();
        assert_eq!(decoded.content, b"helloworld");
    }

    #[test]
    fn test_oversize_encode_rejected() {
        let mut payload = sample();
        payload.size = (MAX_FILE_SIZE + 1) as u64;
        assert!(matches!(
            payload.encode(),
            Err(CodecError::PayloadTooLarge { .. })
        ));
    }

    #[test]
    fn test_ceiling_enforced_during_assembly() {
        // Two fragments that individually fit but together exceed the ceiling
        let half = vec![0u8; MAX_FILE_SIZE / 2 + 1];
        let mut writer = TlvWriter::with_capacity(MAX_FILE_SIZE + 64);
        writer.record_u16(TLV_NAME, b"huge.bin");
        writer.record_u16(TLV_SIZE, &(MAX_FILE_SIZE as u64).to_be_bytes());
        writer.record_u16(TLV_MIME, b"application/octet-stream");
        writer.record_u32(TLV_CONTENT, &half);
        writer.record_u32(TLV_CONTENT, &half);
        assert!(matches!(
            FilePayload::decode(&writer.into_bytes()),
            Err(CodecError::PayloadTooLarge { .. })
        ));
    }

    #[test]
    fn test_empty_content_rejected() {
        let mut writer = TlvWriter::with_capacity(64);
        writer.record_u16(TLV_NAME, b"empty.txt");
        writer.record_u16(TLV_SIZE, &0u64.to_be_bytes());
        writer.record_u16(TLV_MIME, b"text/plain");
        assert!(matches!(
            FilePayload::decode(&writer.into_bytes()),
            Err(CodecError::EmptyContent)
        ));
    }

    #[test]
    fn test_truncated_fails() {
        let bytes = sample().encode().unwrap();
        assert!(FilePayload::decode(&bytes[..bytes.len() - 1]).is_err());
    }

    #[test]
    fn test_unknown_record_skipped() {
        let mut writer = TlvWriter::with_capacity(128);
        writer.record_u16(0x66, b"mystery");
        writer.record_u16(TLV_NAME, b"a.txt");
        writer.record_u16(TLV_SIZE, &1u64.to_be_bytes());
        writer.record_u16(TLV_MIME, b"text/plain");
        writer.record_u32(TLV_CONTENT, b"x");
        assert!(FilePayload::decode(&writer.into_bytes()).is_ok());
    }
}
