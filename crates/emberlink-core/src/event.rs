//! Typed events surfaced to the embedding application.

use emberlink_crypto::{Fingerprint, PeerId};

use crate::ack::Acknowledgement;

/// Events emitted by the session manager. The orchestrator drains them
/// with [`crate::manager::SessionManager::poll_event`]; every variant
/// carries the full data the application needs, there are no follow-up
/// lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeshEvent {
    /// A decrypted application payload arrived from an established peer.
    MessageReceived {
        /// Sending peer
        from: PeerId,
        /// Decrypted payload bytes
        payload: Vec<u8>,
    },
    /// A Noise handshake completed; the fingerprint is suitable for
    /// out-of-band comparison.
    SessionEstablished {
        /// The authenticated peer
        peer: PeerId,
        /// Fingerprint of the peer's static key
        fingerprint: Fingerprint,
    },
    /// The peer confirmed delivery of a message.
    DeliveryAcked {
        /// Acknowledging peer
        from: PeerId,
        /// Ack body
        ack: Acknowledgement,
    },
    /// The peer confirmed the message was read.
    ReadAcked {
        /// Acknowledging peer
        from: PeerId,
        /// Ack body
        ack: Acknowledgement,
    },
    /// Encryption was requested for a peer with no established session;
    /// the orchestrator should start a handshake.
    HandshakeRequired {
        /// Peer that needs a session
        peer: PeerId,
    },
}
