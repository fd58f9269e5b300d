//! Packet envelope encoding and decoding.
//!
//! Every frame on the mesh is wrapped in a fixed envelope sized for tiny
//! transport MTUs. All multi-byte fields are big-endian:
//!
//! ```text
//! version(1) | type(1) | ttl(1) | flags(1) | sender(8)
//!     | recipient(8, iff HAS_RECIPIENT) | payload_len(2) | payload
//! ```
//!
//! Envelopes are immutable values; transformations like TTL decrement
//! produce a new instance.

use crate::error::CodecError;
use emberlink_crypto::{PeerId, PEER_ID_SIZE};

/// Current envelope wire version.
pub const PROTOCOL_VERSION: u8 = 1;

/// Fixed header bytes before the sender ID.
pub const ENVELOPE_HEADER_SIZE: usize = 4;

/// Default hop budget for flooded packets.
pub const DEFAULT_TTL: u8 = 7;

/// Envelope message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    /// Peer announcement (TLV payload)
    Announce = 0x01,
    /// Noise handshake message
    NoiseHandshake = 0x02,
    /// Noise transport ciphertext
    NoiseEncrypted = 0x03,
    /// Pull-sync request (responses carry the RESPONSE flag)
    SyncRequest = 0x04,
    /// Out-of-band verification challenge
    VerifyChallenge = 0x05,
    /// Out-of-band verification response
    VerifyResponse = 0x06,
    /// File transfer payload (TLV)
    FileTransfer = 0x07,
    /// Delivery acknowledgement
    DeliveryAck = 0x08,
    /// Read receipt
    ReadReceipt = 0x09,
}

impl TryFrom<u8> for MessageType {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(Self::Announce),
            0x02 => Ok(Self::NoiseHandshake),
            0x03 => Ok(Self::NoiseEncrypted),
            0x04 => Ok(Self::SyncRequest),
            0x05 => Ok(Self::VerifyChallenge),
            0x06 => Ok(Self::VerifyResponse),
            0x07 => Ok(Self::FileTransfer),
            0x08 => Ok(Self::DeliveryAck),
            0x09 => Ok(Self::ReadReceipt),
            other => Err(CodecError::UnknownMessageType(other)),
        }
    }
}

/// Envelope flags bitmap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnvelopeFlags(u8);

impl EnvelopeFlags {
    /// A directed recipient ID follows the sender ID
    pub const HAS_RECIPIENT: u8 = 0b0000_0001;
    /// Packet answers a previously registered sync request
    pub const RESPONSE: u8 = 0b0000_0010;

    /// Create empty flags.
    #[must_use]
    pub fn new() -> Self {
        Self(0)
    }

    /// Recover flags from a raw byte; unknown bits are preserved.
    #[must_use]
    pub fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Set the recipient flag.
    #[must_use]
    pub fn with_recipient(mut self) -> Self {
        self.0 |= Self::HAS_RECIPIENT;
        self
    }

    /// Set the response flag.
    #[must_use]
    pub fn with_response(mut self) -> Self {
        self.0 |= Self::RESPONSE;
        self
    }

    /// Whether a recipient ID is present.
    #[must_use]
    pub fn has_recipient(&self) -> bool {
        self.0 & Self::HAS_RECIPIENT != 0
    }

    /// Whether the packet is flagged as a sync response.
    #[must_use]
    pub fn is_response(&self) -> bool {
        self.0 & Self::RESPONSE != 0
    }

    /// Raw byte value.
    #[must_use]
    pub fn as_u8(&self) -> u8 {
        self.0
    }
}

/// A decoded packet envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Wire version
    pub version: u8,
    /// Message type
    pub msg_type: MessageType,
    /// Remaining hop budget
    pub ttl: u8,
    /// Flags bitmap
    pub flags: EnvelopeFlags,
    /// Originating peer
    pub sender: PeerId,
    /// Directed recipient, if any
    pub recipient: Option<PeerId>,
    /// Opaque payload (TLV or ciphertext)
    pub payload: Vec<u8>,
}

impl Envelope {
    /// Create a broadcast envelope with the default TTL.
    #[must_use]
    pub fn new(msg_type: MessageType, sender: PeerId, payload: Vec<u8>) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            msg_type,
            ttl: DEFAULT_TTL,
            flags: EnvelopeFlags::new(),
            sender,
            recipient: None,
            payload,
        }
    }

    /// Return a copy directed at a single recipient.
    #[must_use]
    pub fn to_recipient(mut self, recipient: PeerId) -> Self {
        self.recipient = Some(recipient);
        self.flags = self.flags.with_recipient();
        self
    }

    /// Return a copy flagged as a sync response.
    #[must_use]
    pub fn as_response(mut self) -> Self {
        self.flags = self.flags.with_response();
        self
    }

    /// Return a relayed copy with the TTL decremented, or `None` if the
    /// hop budget is spent.
    #[must_use]
    pub fn relayed(&self) -> Option<Self> {
        let next_ttl = self.ttl.checked_sub(1)?;
        let mut copy = self.clone();
        copy.ttl = next_ttl;
        Some(copy)
    }

    /// Encoded size in bytes.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        ENVELOPE_HEADER_SIZE
            + PEER_ID_SIZE
            + if self.recipient.is_some() { PEER_ID_SIZE } else { 0 }
            + 2
            + self.payload.len()
    }

    /// Encode into a pre-sized buffer.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::PayloadTooLarge`] if the payload exceeds the
    /// 2-byte length field, before any bytes are produced.
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        if self.payload.len() > usize::from(u16::MAX) {
            return Err(CodecError::PayloadTooLarge {
                max: usize::from(u16::MAX),
                actual: self.payload.len(),
            });
        }

        let mut flags = self.flags;
        if self.recipient.is_some() {
            flags = flags.with_recipient();
        }

        let mut buf = Vec::with_capacity(self.encoded_len());
        buf.push(self.version);
        buf.push(self.msg_type as u8);
        buf.push(self.ttl);
        buf.push(flags.as_u8());
        buf.extend_from_slice(self.sender.as_bytes());
        if let Some(recipient) = &self.recipient {
            buf.extend_from_slice(recipient.as_bytes());
        }
        buf.extend_from_slice(&(self.payload.len() as u16).to_be_bytes());
        buf.extend_from_slice(&self.payload);
        Ok(buf)
    }

    /// Decode an envelope from raw bytes.
    ///
    /// Trailing bytes beyond the declared payload length are tolerated
    /// (transports may pad frames); everything declared must be present.
    ///
    /// # Errors
    ///
    /// Fails closed on truncation, unknown version, or unknown type.
    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        let min = ENVELOPE_HEADER_SIZE + PEER_ID_SIZE + 2;
        if data.len() < min {
            return Err(CodecError::Truncated {
                expected: min,
                actual: data.len(),
            });
        }

        let version = data[0];
        if version != PROTOCOL_VERSION {
            return Err(CodecError::UnknownVersion(version));
        }
        let msg_type = MessageType::try_from(data[1])?;
        let ttl = data[2];
        let flags = EnvelopeFlags::from_bits(data[3]);

        let mut pos = ENVELOPE_HEADER_SIZE;
        let mut sender = [0u8; PEER_ID_SIZE];
        sender.copy_from_slice(&data[pos..pos + PEER_ID_SIZE]);
        pos += PEER_ID_SIZE;

        let recipient = if flags.has_recipient() {
            if data.len() < pos + PEER_ID_SIZE + 2 {
                return Err(CodecError::Truncated {
                    expected: pos + PEER_ID_SIZE + 2,
                    actual: data.len(),
                });
            }
            let mut id = [0u8; PEER_ID_SIZE];
            id.copy_from_slice(&data[pos..pos + PEER_ID_SIZE]);
            pos += PEER_ID_SIZE;
            Some(PeerId::from_bytes(id))
        } else {
            None
        };

        let payload_len = usize::from(u16::from_be_bytes([data[pos], data[pos + 1]]));
        pos += 2;
        if data.len() < pos + payload_len {
            return Err(CodecError::Truncated {
                expected: pos + payload_len,
                actual: data.len(),
            });
        }
        let payload = data[pos..pos + payload_len].to_vec();

        Ok(Self {
            version,
            msg_type,
            ttl,
            flags,
            sender: PeerId::from_bytes(sender),
            recipient,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender() -> PeerId {
        PeerId::from_bytes([0x11; 8])
    }

    #[test]
    fn test_broadcast_roundtrip() {
        let original = Envelope::new(MessageType::Announce, sender(), b"hello mesh".to_vec());
        let encoded = original.encode().unwrap();
        let decoded = Envelope::decode(&encoded).unwrap();
        assert_eq!(decoded, original);
        assert_eq!(encoded.len(), original.encoded_len());
    }

    #[test]
    fn test_directed_roundtrip() {
        let recipient = PeerId::from_bytes([0x22; 8]);
        let original = Envelope::new(MessageType::NoiseEncrypted, sender(), vec![1, 2, 3])
            .to_recipient(recipient);
        let decoded = Envelope::decode(&original.encode().unwrap()).unwrap();
        assert_eq!(decoded.recipient, Some(recipient));
        assert!(decoded.flags.has_recipient());
    }

    #[test]
    fn test_response_flag_roundtrip() {
        let original =
            Envelope::new(MessageType::SyncRequest, sender(), vec![]).as_response();
        let decoded = Envelope::decode(&original.encode().unwrap()).unwrap();
        assert!(decoded.flags.is_response());
    }

    #[test]
    fn test_truncated_fails() {
        let encoded = Envelope::new(MessageType::Announce, sender(), b"payload".to_vec())
            .encode()
            .unwrap();
        let short = &encoded[..encoded.len() - 1];
        assert!(matches!(
            Envelope::decode(short),
            Err(CodecError::Truncated { .. })
        ));
    }

    #[test]
    fn test_unknown_version_fails() {
        let mut encoded = Envelope::new(MessageType::Announce, sender(), vec![])
            .encode()
            .unwrap();
        encoded[0] = 9;
        assert!(matches!(
            Envelope::decode(&encoded),
            Err(CodecError::UnknownVersion(9))
        ));
    }

    #[test]
    fn test_unknown_type_fails() {
        let mut encoded = Envelope::new(MessageType::Announce, sender(), vec![])
            .encode()
            .unwrap();
        encoded[1] = 0x7f;
        assert!(matches!(
            Envelope::decode(&encoded),
            Err(CodecError::UnknownMessageType(0x7f))
        ));
    }

    #[test]
    fn test_trailing_padding_tolerated() {
        let mut encoded = Envelope::new(MessageType::Announce, sender(), vec![42])
            .encode()
            .unwrap();
        encoded.extend_from_slice(&[0u8; 16]);
        let decoded = Envelope::decode(&encoded).unwrap();
        assert_eq!(decoded.payload, vec![42]);
    }

    #[test]
    fn test_relay_decrements_ttl() {
        let envelope = Envelope::new(MessageType::Announce, sender(), vec![]);
        let relayed = envelope.relayed().unwrap();
        assert_eq!(relayed.ttl, DEFAULT_TTL - 1);
        // Original untouched
        assert_eq!(envelope.ttl, DEFAULT_TTL);

        let mut spent = envelope;
        spent.ttl = 0;
        assert!(spent.relayed().is_none());
    }

    #[test]
    fn test_oversize_payload_encode_fails() {
        let envelope = Envelope::new(
            MessageType::FileTransfer,
            sender(),
            vec![0u8; usize::from(u16::MAX) + 1],
        );
        assert!(matches!(
            envelope.encode(),
            Err(CodecError::PayloadTooLarge { .. })
        ));
    }
}
