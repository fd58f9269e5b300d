//! # Emberlink Crypto
//!
//! Cryptographic layer for the Emberlink mesh protocol.
//!
//! This crate provides:
//! - `Noise_XX` handshake for mutual authentication with identity hiding
//! - Per-message replay protection with a sliding nonce window
//! - Peer identity derivation (ids and fingerprints from static keys)
//! - Small-order public key rejection
//! - Ed25519 challenge signing bound to the handshake transcript
//!
//! ## Cryptographic Suite
//!
//! | Function | Algorithm | Security Level |
//! |----------|-----------|----------------|
//! | Key Exchange | X25519 | 128-bit |
//! | AEAD | ChaCha20-Poly1305 | 256-bit key |
//! | Hash | BLAKE3 | 128-bit collision |
//! | Signatures | Ed25519 | 128-bit |

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod error;
pub mod identity;
pub mod noise;
pub mod replay;

pub use error::CryptoError;
pub use identity::{
    is_valid_public_key, verify_challenge_signature, Fingerprint, MeshIdentity, PeerId,
    FINGERPRINT_SIZE, PEER_ID_SIZE,
};
pub use noise::{
    NoiseSession, Role, SessionConfig, SessionState, NOISE_PATTERN, NONCE_PREFIX_SIZE,
    REKEY_MESSAGE_LIMIT, TAG_SIZE,
};
pub use replay::{ReplayWindow, REPLAY_WINDOW_SIZE};

/// X25519 public key size
pub const X25519_PUBLIC_KEY_SIZE: usize = 32;

/// Ed25519 signature size
pub const ED25519_SIGNATURE_SIZE: usize = 64;

/// BLAKE3 output size
pub const BLAKE3_OUTPUT_SIZE: usize = 32;
