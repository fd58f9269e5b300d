//! Out-of-band verification challenge/response records.
//!
//! After a session is established, either side may challenge the other
//! to prove control of the signing key bound to the Noise transcript.
//! The response signature covers `nonce || handshake_hash`, so a
//! successful verification also confirms both sides saw the same
//! handshake. Unlike announcements these are fixed-format: the tag and
//! every field length are exact, and any deviation fails decode.

use crate::error::CodecError;
use crate::tlv::{TlvReader, TlvWriter};

const TAG_CHALLENGE: u8 = 0xC1;
const TAG_RESPONSE: u8 = 0xC2;

/// Challenge nonce length in bytes.
pub const CHALLENGE_NONCE_SIZE: usize = 32;

/// Ed25519 signature length in bytes.
pub const SIGNATURE_SIZE: usize = 64;

/// A verification challenge: a fresh random nonce for the peer to sign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyChallenge {
    /// Random nonce the responder must sign
    pub nonce: [u8; CHALLENGE_NONCE_SIZE],
}

impl VerifyChallenge {
    /// Encode to a tagged record.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut writer = TlvWriter::with_capacity(2 + CHALLENGE_NONCE_SIZE);
        writer.record_u8(TAG_CHALLENGE, &self.nonce);
        writer.into_bytes()
    }

    /// Decode a tagged challenge record. The tag and nonce length are
    /// exact; anything else fails.
    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        let mut reader = TlvReader::new(data);
        let tag = reader.read_type()?;
        if tag != TAG_CHALLENGE {
            return Err(CodecError::InvalidTag(tag));
        }
        let value = reader.read_value_u8()?;
        if value.len() != CHALLENGE_NONCE_SIZE {
            return Err(CodecError::Truncated {
                expected: CHALLENGE_NONCE_SIZE,
                actual: value.len(),
            });
        }
        if !reader.is_empty() {
            return Err(CodecError::TrailingBytes(reader.remaining()));
        }
        let mut nonce = [0u8; CHALLENGE_NONCE_SIZE];
        nonce.copy_from_slice(value);
        Ok(Self { nonce })
    }
}

/// A verification response: the echoed nonce plus the signature over
/// `nonce || handshake_hash`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyResponse {
    /// Nonce echoed back from the challenge
    pub nonce: [u8; CHALLENGE_NONCE_SIZE],
    /// Ed25519 signature over nonce and handshake hash
    pub signature: [u8; SIGNATURE_SIZE],
}

impl VerifyResponse {
    /// Encode to a tagged record.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut writer = TlvWriter::with_capacity(4 + CHALLENGE_NONCE_SIZE + SIGNATURE_SIZE);
        let mut body = [0u8; CHALLENGE_NONCE_SIZE + SIGNATURE_SIZE];
        body[..CHALLENGE_NONCE_SIZE].copy_from_slice(&self.nonce);
        body[CHALLENGE_NONCE_SIZE..].copy_from_slice(&self.signature);
        writer.record_u8(TAG_RESPONSE, &body);
        writer.into_bytes()
    }

    /// Decode a tagged response record with exact field lengths.
    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        let mut reader = TlvReader::new(data);
        let tag = reader.read_type()?;
        if tag != TAG_RESPONSE {
            return Err(CodecError::InvalidTag(tag));
        }
        let value = reader.read_value_u8()?;
        if value.len() != CHALLENGE_NONCE_SIZE + SIGNATURE_SIZE {
            return Err(CodecError::Truncated {
                expected: CHALLENGE_NONCE_SIZE + SIGNATURE_SIZE,
                actual: value.len(),
            });
        }
        if !reader.is_empty() {
            return Err(CodecError::TrailingBytes(reader.remaining()));
        }
        let mut nonce = [0u8; CHALLENGE_NONCE_SIZE];
        nonce.copy_from_slice(&value[..CHALLENGE_NONCE_SIZE]);
        let mut signature = [0u8; SIGNATURE_SIZE];
        signature.copy_from_slice(&value[CHALLENGE_NONCE_SIZE..]);
        Ok(Self { nonce, signature })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_challenge_round_trip() {
        let challenge = VerifyChallenge { nonce: [0x11; 32] };
        let bytes = challenge.encode();
        assert_eq!(VerifyChallenge::decode(&bytes).unwrap(), challenge);
    }

    #[test]
    fn test_response_round_trip() {
        let response = VerifyResponse {
            nonce: [0x22; 32],
            signature: [0x33; 64],
        };
        let bytes = response.encode();
        assert_eq!(VerifyResponse::decode(&bytes).unwrap(), response);
    }

    #[test]
    fn test_wrong_tag_rejected() {
        let challenge = VerifyChallenge { nonce: [0; 32] };
        let bytes = challenge.encode();
        assert!(matches!(
            VerifyResponse::decode(&bytes),
            Err(CodecError::InvalidTag(TAG_CHALLENGE))
        ));
    }

    #[test]
    fn test_short_nonce_rejected() {
        let mut writer = TlvWriter::with_capacity(32);
        writer.record_u8(TAG_CHALLENGE, &[0u8; 16]);
        assert!(VerifyChallenge::decode(&writer.into_bytes()).is_err());
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut bytes = VerifyChallenge { nonce: [0x44; 32] }.encode();
        bytes.push(0x00);
        assert!(matches!(
            VerifyChallenge::decode(&bytes),
            Err(CodecError::TrailingBytes(1))
        ));

        let mut bytes = VerifyResponse {
            nonce: [0x44; 32],
            signature: [0x55; 64],
        }
        .encode();
        bytes.extend_from_slice(&[0xaa, 0xbb]);
        assert!(matches!(
            VerifyResponse::decode(&bytes),
            Err(CodecError::TrailingBytes(2))
        ));
    }

    #[test]
    fn test_truncated_response_rejected() {
        let response = VerifyResponse {
            nonce: [0; 32],
            signature: [0; 64],
        };
        let bytes = response.encode();
        assert!(VerifyResponse::decode(&bytes[..bytes.len() - 1]).is_err());
    }
}
