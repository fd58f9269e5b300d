//! Peer announcement payload.
//!
//! Announcements are flooded unencrypted so that peers can learn each
//! other's static keys before any handshake. Fields use 1-byte TLV
//! lengths; the neighbor list lets receivers sketch local mesh topology.

use emberlink_crypto::{PeerId, PEER_ID_SIZE};
use tracing::debug;

use crate::error::CodecError;
use crate::tlv::{TlvReader, TlvWriter};

const TLV_NICKNAME: u8 = 0x01;
const TLV_NOISE_KEY: u8 = 0x02;
const TLV_SIGNING_KEY: u8 = 0x03;
const TLV_NEIGHBORS: u8 = 0x04;

/// Maximum bytes for any 1-byte-length announcement field.
const MAX_FIELD_LEN: usize = 255;

/// Maximum neighbor hops carried in one announcement.
pub const MAX_NEIGHBORS: usize = 10;

/// A peer's self-announcement: display name, static keys, and the
/// peers it currently hears directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    /// Human-readable display name
    pub nickname: String,
    /// Noise static public key bytes
    pub noise_public_key: Vec<u8>,
    /// Ed25519 verifying key bytes
    pub signing_public_key: Vec<u8>,
    /// Directly reachable peers, capped at [`MAX_NEIGHBORS`] on encode
    pub neighbors: Vec<PeerId>,
}

impl Announcement {
    /// Create an announcement with no neighbor list.
    pub fn new(
        nickname: impl Into<String>,
        noise_public_key: Vec<u8>,
        signing_public_key: Vec<u8>,
    ) -> Self {
        Self {
            nickname: nickname.into(),
            noise_public_key,
            signing_public_key,
            neighbors: Vec::new(),
        }
    }

    /// Attach a neighbor list.
    #[must_use]
    pub fn with_neighbors(mut self, neighbors: Vec<PeerId>) -> Self {
        self.neighbors = neighbors;
        self
    }

    /// Encode to TLV bytes.
    ///
    /// Fails if the nickname or either key is empty or longer than 255
    /// bytes. The neighbor list is truncated to the first
    /// [`MAX_NEIGHBORS`] entries and omitted entirely when empty.
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        check_field("nickname", self.nickname.as_bytes())?;
        check_field("noise_public_key", &self.noise_public_key)?;
        check_field("signing_public_key", &self.signing_public_key)?;

        let mut writer = TlvWriter::with_capacity(
            8 + self.nickname.len()
                + self.noise_public_key.len()
                + self.signing_public_key.len()
                + self.neighbors.len() * PEER_ID_SIZE,
        );
        writer.record_u8(TLV_NICKNAME, self.nickname.as_bytes());
        writer.record_u8(TLV_NOISE_KEY, &self.noise_public_key);
        writer.record_u8(TLV_SIGNING_KEY, &self.signing_public_key);

        let mut hop_bytes = Vec::with_capacity(MAX_NEIGHBORS * PEER_ID_SIZE);
        for peer in self.neighbors.iter().take(MAX_NEIGHBORS) {
            hop_bytes.extend_from_slice(peer.as_bytes());
        }
        if !hop_bytes.is_empty() {
            writer.record_u8(TLV_NEIGHBORS, &hop_bytes);
        }

        Ok(writer.into_bytes())
    }

    /// Decode from TLV bytes.
    ///
    /// Unknown record types are skipped. Truncation of a known field,
    /// a missing mandatory field, or a neighbor blob that is not a
    /// multiple of the hop size all fail the whole decode.
    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        let mut nickname: Option<String> = None;
        let mut noise_key: Option<Vec<u8>> = None;
        let mut signing_key: Option<Vec<u8>> = None;
        let mut neighbors: Vec<PeerId> = Vec::new();

        let mut reader = TlvReader::new(data);
        while !reader.is_empty() {
            let tlv_type = reader.read_type()?;
            let value = reader.read_value_u8()?;
            match tlv_type {
                TLV_NICKNAME => {
                    let text = std::str::from_utf8(value)
                        .map_err(|_| CodecError::InvalidUtf8("nickname"))?;
                    nickname = Some(text.to_string());
                }
                TLV_NOISE_KEY => noise_key = Some(value.to_vec()),
                TLV_SIGNING_KEY => signing_key = Some(value.to_vec()),
                TLV_NEIGHBORS => {
                    if value.is_empty() || value.len() % PEER_ID_SIZE != 0 {
                        return Err(CodecError::MalformedNeighborList(value.len()));
                    }
                    for chunk in value.chunks_exact(PEER_ID_SIZE) {
                        let mut id = [0u8; PEER_ID_SIZE];
                        id.copy_from_slice(chunk);
                        neighbors.push(PeerId::from_bytes(id));
                    }
                }
                other => {
                    debug!(tlv_type = other, "skipping unknown announcement record");
                }
            }
        }

        let nickname = nickname.ok_or(CodecError::MissingField("nickname"))?;
        let noise_public_key = noise_key.ok_or(CodecError::MissingField("noise_public_key"))?;
        let signing_public_key =
            signing_key.ok_or(CodecError::MissingField("signing_public_key"))?;

        if nickname.is_empty() {
            return Err(CodecError::EmptyField("nickname"));
        }
        if noise_public_key.is_empty() {
            return Err(CodecError::EmptyField("noise_public_key"));
        }
        if signing_public_key.is_empty() {
            return Err(CodecError::EmptyField("signing_public_key"));
        }

        Ok(Self {
            nickname,
            noise_public_key,
            signing_public_key,
            neighbors,
        })
    }
}

fn check_field(name: &'static str, value: &[u8]) -> Result<(), CodecError> {
    if value.is_empty() {
        return Err(CodecError::EmptyField(name));
    }
    if value.len() > MAX_FIELD_LEN {
        return Err(CodecError::FieldTooLong {
            field: name,
            max: MAX_FIELD_LEN,
            actual: value.len(),
        });
    }
    Ok(())
}
