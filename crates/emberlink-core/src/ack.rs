//! Delivery and read acknowledgement payloads.
//!
//! Reliability stays above the mesh; these records only carry enough
//! for the application to correlate an ack with the message it covers.

use crate::error::CodecError;
use crate::tlv::{TlvReader, TlvWriter};

const TLV_MESSAGE_ID: u8 = 0x01;
const TLV_TIMESTAMP: u8 = 0x02;

const MAX_MESSAGE_ID_LEN: usize = 255;

/// Acknowledgement body shared by delivery acks and read receipts; the
/// envelope message type distinguishes the two.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acknowledgement {
    /// Identifier of the acknowledged message
    pub message_id: String,
    /// Sender-side timestamp, milliseconds since the Unix epoch
    pub timestamp_ms: u64,
}

impl Acknowledgement {
    /// Create an acknowledgement for a message id.
    pub fn new(message_id: impl Into<String>, timestamp_ms: u64) -> Self {
        Self {
            message_id: message_id.into(),
            timestamp_ms,
        }
    }

    /// Encode to TLV bytes. Fails if the message id is empty or over
    /// 255 bytes.
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        if self.message_id.is_empty() {
            return Err(CodecError::EmptyField("message_id"));
        }
        if self.message_id.len() > MAX_MESSAGE_ID_LEN {
            return Err(CodecError::FieldTooLong {
                field: "message_id",
                max: MAX_MESSAGE_ID_LEN,
                actual: self.message_id.len(),
            });
        }
        let mut writer = TlvWriter::with_capacity(14 + self.message_id.len());
        writer.record_u8(TLV_MESSAGE_ID, self.message_id.as_bytes());
        writer.record_u8(TLV_TIMESTAMP, &self.timestamp_ms.to_be_bytes());
        Ok(writer.into_bytes())
    }

    /// Decode from TLV bytes; unknown record types are skipped.
    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        let mut message_id: Option<String> = None;
        let mut timestamp_ms: Option<u64> = None;

        let mut reader = TlvReader::new(data);
        while !reader.is_empty() {
            let tlv_type = reader.read_type()?;
            let value = reader.read_value_u8()?;
            match tlv_type {
                TLV_MESSAGE_ID => {
                    let text = std::str::from_utf8(value)
                        .map_err(|_| CodecError::InvalidUtf8("message_id"))?;
                    message_id = Some(text.to_string());
                }
                TLV_TIMESTAMP => {
                    if value.len() != 8 {
                        return Err(CodecError::Truncated {
                            expected: 8,
                            actual: value.len(),
                        });
                    }
                    let mut raw = [0u8; 8];
                    raw.copy_from_slice(value);
                    timestamp_ms = Some(u64::from_be_bytes(raw));
                }
                _ => {}
            }
        }

        let message_id = message_id.ok_or(CodecError::MissingField("message_id"))?;
        if message_id.is_empty() {
            return Err(CodecError::EmptyField("message_id"));
        }
        let timestamp_ms = timestamp_ms.ok_or(CodecError::MissingField("timestamp_ms"))?;
        Ok(Self {
            message_id,
            timestamp_ms,
        })
    }
}
