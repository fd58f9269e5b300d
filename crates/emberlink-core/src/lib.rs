//! # Emberlink Core
//!
//! Protocol engine for the Emberlink mesh: a peer-to-peer secure
//! messaging overlay for short-range radio links with tiny MTUs and no
//! central broker. The core is transport-agnostic; bytes come in,
//! bytes go out, and typed events surface to the application.
//!
//! This crate provides:
//! - Packet envelope and TLV payload codecs (announcements, file
//!   transfers, verification exchanges, acks)
//! - The session manager routing handshakes and transport traffic into
//!   per-peer Noise sessions
//! - A bounded message deduplicator for flood-relay meshes
//! - Request/response correlation for pull-sync exchanges
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Session Manager                             │
//! │   (per-peer Noise sessions, handshake routing, typed events)    │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                      Packet Codec                                │
//! │   (envelope framing + TLV payloads, strict adversarial decode)  │
//! ├─────────────────────────────────────────────────────────────────┤
//! │              Deduplicator / Sync Correlator                      │
//! │   (bounded caches gating delivery and sync responses)           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod ack;
pub mod announce;
pub mod dedup;
pub mod envelope;
pub mod error;
pub mod event;
pub mod file;
pub mod manager;
pub mod sync;
pub mod verify;

mod tlv;

pub use ack::Acknowledgement;
pub use announce::{Announcement, MAX_NEIGHBORS};
pub use dedup::{DedupConfig, MessageDeduplicator};
pub use envelope::{
    Envelope, EnvelopeFlags, MessageType, DEFAULT_TTL, ENVELOPE_HEADER_SIZE, PROTOCOL_VERSION,
};
pub use error::{CodecError, SessionError};
pub use event::MeshEvent;
pub use file::{FilePayload, MAX_FILE_SIZE};
pub use manager::SessionManager;
pub use sync::{SyncCorrelator, RESPONSE_WINDOW};
pub use verify::{VerifyChallenge, VerifyResponse, CHALLENGE_NONCE_SIZE, SIGNATURE_SIZE};
