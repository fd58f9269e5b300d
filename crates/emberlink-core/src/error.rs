//! Core error types.

use emberlink_crypto::{CryptoError, PeerId};
use thiserror::Error;

/// Packet and TLV decode/encode errors.
///
/// Decode fails closed: any of these means the whole record is rejected,
/// never a partially populated structure.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// Input ended before a declared length was satisfied
    #[error("truncated input: expected {expected} more bytes, got {actual}")]
    Truncated {
        /// Bytes the current field still required
        expected: usize,
        /// Bytes actually remaining
        actual: usize,
    },

    /// Unsupported envelope version
    #[error("unknown protocol version: {0}")]
    UnknownVersion(u8),

    /// Unrecognized envelope message type
    #[error("unknown message type: {0:#04x}")]
    UnknownMessageType(u8),

    /// Unexpected record tag in a fixed-format payload
    #[error("invalid record tag: {0:#04x}")]
    InvalidTag(u8),

    /// Bytes left over after a fixed-format record
    #[error("trailing bytes after record: {0}")]
    TrailingBytes(usize),

    /// A mandatory TLV field was absent
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// A field that must be non-empty was empty
    #[error("empty field: {0}")]
    EmptyField(&'static str),

    /// A field exceeded its length ceiling
    #[error("field {field} too long: max {max} bytes, got {actual}")]
    FieldTooLong {
        /// Field name
        field: &'static str,
        /// Maximum allowed bytes
        max: usize,
        /// Actual byte count
        actual: usize,
    },

    /// Payload exceeded its size ceiling
    #[error("payload too large: max {max} bytes, got {actual}")]
    PayloadTooLarge {
        /// Maximum allowed bytes
        max: usize,
        /// Actual byte count
        actual: usize,
    },

    /// A neighbor list whose byte length is not a multiple of the hop size
    #[error("malformed neighbor list: {0} bytes")]
    MalformedNeighborList(usize),

    /// Text field was not valid UTF-8
    #[error("invalid utf-8 in field: {0}")]
    InvalidUtf8(&'static str),

    /// Assembled file content was empty
    #[error("file content empty after assembly")]
    EmptyContent,
}

/// Session routing errors from the session manager.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No session exists for the peer
    #[error("no session for peer {0}")]
    NoSession(PeerId),

    /// A session exists but its handshake has not completed
    #[error("session with peer {0} not established")]
    NotEstablished(PeerId),

    /// Underlying cryptographic failure
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}
