//! Cryptographic error types.

use thiserror::Error;

/// Cryptographic errors
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Noise protocol failure (handshake or transport cipherstate)
    #[error("noise protocol failure: {0}")]
    Noise(#[from] snow::Error),

    /// Local static key is an invalid or low-order curve point
    #[error("invalid local static key")]
    InvalidLocalKey,

    /// Remote static key is an invalid or low-order curve point
    #[error("invalid peer static key")]
    InvalidPeerKey,

    /// Operation not valid in the current session state
    #[error("invalid state for operation")]
    InvalidState,

    /// Encrypt/decrypt attempted before the handshake completed
    #[error("session not established")]
    NotEstablished,

    /// Message nonce already consumed or outside the replay window
    #[error("replay detected: nonce {0} rejected")]
    ReplayDetected(u32),

    /// Send nonce counter exhausted, rekey required
    #[error("nonce counter exhausted, rekey required")]
    NonceOverflow,

    /// Ciphertext too short to carry a nonce prefix and tag
    #[error("malformed ciphertext: expected at least {expected} bytes, got {actual}")]
    MalformedCiphertext {
        /// Minimum length required
        expected: usize,
        /// Actual length received
        actual: usize,
    },

    /// AEAD decryption failed (authentication failure)
    #[error("decryption failed: authentication failure")]
    DecryptionFailed,

    /// Ed25519 signature verification failed
    #[error("invalid signature")]
    InvalidSignature,
}
