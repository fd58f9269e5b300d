//! Mesh identities and peer identifiers.
//!
//! Every node carries two static keypairs:
//! - **X25519**: the Noise static key used for session establishment
//! - **Ed25519**: the signing key used for announcement and verification
//!   signatures
//!
//! The peer ID is derived from the Noise static public key, so it is stable
//! for the lifetime of the identity and unique among mesh peers.

use crate::CryptoError;
use ed25519_dalek::{Signer, Verifier};
use rand_core::{CryptoRng, RngCore};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

/// Size of a peer identifier in bytes
pub const PEER_ID_SIZE: usize = 8;

/// Size of an identity fingerprint in bytes
pub const FINGERPRINT_SIZE: usize = 32;

/// Curve25519 points that must never appear as a static public key.
///
/// Covers the all-zero and all-ones encodings plus the identity and the
/// known small-order points (the libsodium blocklist). A peer presenting
/// one of these can force a predictable shared secret.
const BLOCKED_POINTS: [[u8; 32]; 8] = [
    // All zeros
    [0x00; 32],
    // All ones
    [0xff; 32],
    // Identity point (order 1)
    [
        0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00,
    ],
    // Order-8 point
    [
        0xe0, 0xeb, 0x7a, 0x7c, 0x3b, 0x41, 0xb8, 0xae, 0x16, 0x56, 0xe3, 0xfa, 0xf1, 0x9f, 0xc4,
        0x6a, 0xda, 0x09, 0x8d, 0xeb, 0x9c, 0x32, 0xb1, 0xfd, 0x86, 0x62, 0x05, 0x16, 0x5f, 0x49,
        0xb8, 0x00,
    ],
    // Order-8 point
    [
        0x5f, 0x9c, 0x95, 0xbc, 0xa3, 0x50, 0x8c, 0x24, 0xb1, 0xd0, 0xb1, 0x55, 0x9c, 0x83, 0xef,
        0x5b, 0x04, 0x44, 0x5c, 0xc4, 0x58, 0x1c, 0x8e, 0x86, 0xd8, 0x22, 0x4e, 0xdd, 0xd0, 0x9f,
        0x11, 0x57,
    ],
    // p - 1 (order 2)
    [
        0xec, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        0xff, 0x7f,
    ],
    // p (non-canonical zero)
    [
        0xed, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        0xff, 0x7f,
    ],
    // p + 1 (non-canonical identity)
    [
        0xee, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        0xff, 0x7f,
    ],
];

/// Check a Curve25519 public key against the small-order blocklist.
///
/// Comparison is constant-time per blocklist entry.
#[must_use]
pub fn is_valid_public_key(key: &[u8; 32]) -> bool {
    let mut blocked = subtle::Choice::from(0u8);
    for point in &BLOCKED_POINTS {
        blocked |= key.ct_eq(point);
    }
    !bool::from(blocked)
}

/// Opaque fixed-length peer identifier.
///
/// Derived as the first 8 bytes of `BLAKE3(noise static public key)`.
/// Stable for an identity's lifetime and used as the key for every
/// peer-indexed map. The `Ord` impl gives the deterministic ordering used
/// to tie-break simultaneous handshake initiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId([u8; PEER_ID_SIZE]);

impl PeerId {
    /// Derive a peer ID from a Noise static public key.
    #[must_use]
    pub fn from_public_key(public_key: &[u8; 32]) -> Self {
        let digest = blake3::hash(public_key);
        let mut id = [0u8; PEER_ID_SIZE];
        id.copy_from_slice(&digest.as_bytes()[..PEER_ID_SIZE]);
        Self(id)
    }

    /// Create a peer ID from raw bytes (e.g. parsed from an envelope).
    #[must_use]
    pub fn from_bytes(bytes: [u8; PEER_ID_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; PEER_ID_SIZE] {
        &self.0
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Full-length identity fingerprint for out-of-band verification display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprint([u8; FINGERPRINT_SIZE]);

impl Fingerprint {
    /// Compute the fingerprint of a Noise static public key.
    #[must_use]
    pub fn of(public_key: &[u8; 32]) -> Self {
        Self(*blake3::hash(public_key).as_bytes())
    }

    /// Get the raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; FINGERPRINT_SIZE] {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Local mesh identity: static Noise keypair plus signing keypair.
///
/// Supplied to sessions by reference; the keys are validated once here at
/// construction, not on every session build.
pub struct MeshIdentity {
    noise_secret: x25519_dalek::StaticSecret,
    noise_public: [u8; 32],
    signing_key: ed25519_dalek::SigningKey,
}

impl MeshIdentity {
    /// Generate a fresh identity from a CSPRNG.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let noise_secret = x25519_dalek::StaticSecret::random_from_rng(&mut *rng);
        let noise_public = *x25519_dalek::PublicKey::from(&noise_secret).as_bytes();
        let signing_key = ed25519_dalek::SigningKey::generate(rng);
        Self {
            noise_secret,
            noise_public,
            signing_key,
        }
    }

    /// Load an identity from stored key material.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidLocalKey`] if the derived Noise public
    /// key is a small-order point.
    pub fn from_bytes(noise_secret: [u8; 32], signing_secret: [u8; 32]) -> Result<Self, CryptoError> {
        let noise_secret = x25519_dalek::StaticSecret::from(noise_secret);
        let noise_public = *x25519_dalek::PublicKey::from(&noise_secret).as_bytes();
        if !is_valid_public_key(&noise_public) {
            return Err(CryptoError::InvalidLocalKey);
        }
        let signing_key = ed25519_dalek::SigningKey::from_bytes(&signing_secret);
        Ok(Self {
            noise_secret,
            noise_public,
            signing_key,
        })
    }

    /// The Noise static public key.
    #[must_use]
    pub fn noise_public_key(&self) -> &[u8; 32] {
        &self.noise_public
    }

    /// The Noise static private key bytes, zeroized when dropped.
    ///
    /// Needed to seed the snow handshake builder; handle with care.
    #[must_use]
    pub fn noise_private_key(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.noise_secret.to_bytes())
    }

    /// The Ed25519 verifying (public) key bytes.
    #[must_use]
    pub fn verifying_key(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Whether the Noise static public key passes small-order validation.
    #[must_use]
    pub fn has_valid_keys(&self) -> bool {
        is_valid_public_key(&self.noise_public)
    }

    /// Peer ID derived from the Noise static public key.
    #[must_use]
    pub fn peer_id(&self) -> PeerId {
        PeerId::from_public_key(&self.noise_public)
    }

    /// Fingerprint of the Noise static public key.
    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(&self.noise_public)
    }

    /// Build an identity with an unvalidated public key, for exercising
    /// the invalid-key paths that `generate`/`from_bytes` cannot reach.
    #[cfg(test)]
    pub(crate) fn with_unchecked_public(noise_public: [u8; 32]) -> Self {
        Self {
            noise_secret: x25519_dalek::StaticSecret::from([0x42u8; 32]),
            noise_public,
            signing_key: ed25519_dalek::SigningKey::from_bytes(&[0x42u8; 32]),
        }
    }

    /// Sign a verification challenge bound to a session transcript.
    ///
    /// The signed material is `nonce || handshake_hash`, so a signature is
    /// only valid for the session whose transcript produced the hash.
    #[must_use]
    pub fn sign_challenge(&self, nonce: &[u8; 32], handshake_hash: &[u8; 32]) -> [u8; 64] {
        let mut message = [0u8; 64];
        message[..32].copy_from_slice(nonce);
        message[32..].copy_from_slice(handshake_hash);
        self.signing_key.sign(&message).to_bytes()
    }
}

/// Verify a challenge signature against a peer's signing key.
///
/// # Errors
///
/// Returns [`CryptoError::InvalidSignature`] if the key is malformed or the
/// signature does not verify over `nonce || handshake_hash`.
pub fn verify_challenge_signature(
    verifying_key: &[u8; 32],
    nonce: &[u8; 32],
    handshake_hash: &[u8; 32],
    signature: &[u8; 64],
) -> Result<(), CryptoError> {
    let key = ed25519_dalek::VerifyingKey::from_bytes(verifying_key)
        .map_err(|_| CryptoError::InvalidSignature)?;
    let mut message = [0u8; 64];
    message[..32].copy_from_slice(nonce);
    message[32..].copy_from_slice(handshake_hash);
    let signature = ed25519_dalek::Signature::from_bytes(signature);
    key.verify(&message, &signature)
        .map_err(|_| CryptoError::InvalidSignature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_core::OsRng;

    #[test]
    fn test_generated_identity_is_valid() {
        let identity = MeshIdentity::generate(&mut OsRng);
        assert!(identity.has_valid_keys());
        assert_ne!(identity.noise_public_key(), &[0u8; 32]);
    }

    #[test]
    fn test_blocklist_rejects_zero_and_ones() {
        assert!(!is_valid_public_key(&[0u8; 32]));
        assert!(!is_valid_public_key(&[0xffu8; 32]));
    }

    #[test]
    fn test_blocklist_rejects_identity_point() {
        let mut identity_point = [0u8; 32];
        identity_point[0] = 0x01;
        assert!(!is_valid_public_key(&identity_point));
    }

    #[test]
    fn test_blocklist_accepts_real_key() {
        let identity = MeshIdentity::generate(&mut OsRng);
        assert!(is_valid_public_key(identity.noise_public_key()));
    }

    #[test]
    fn test_peer_id_is_stable() {
        let identity = MeshIdentity::generate(&mut OsRng);
        assert_eq!(identity.peer_id(), identity.peer_id());
        assert_eq!(
            identity.peer_id(),
            PeerId::from_public_key(identity.noise_public_key())
        );
    }

    #[test]
    fn test_peer_id_display_is_hex() {
        let id = PeerId::from_bytes([0xab; 8]);
        assert_eq!(id.to_string(), "abababababababab");
    }

    #[test]
    fn test_distinct_identities_distinct_ids() {
        let a = MeshIdentity::generate(&mut OsRng);
        let b = MeshIdentity::generate(&mut OsRng);
        assert_ne!(a.peer_id(), b.peer_id());
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_challenge_signature_roundtrip() {
        let identity = MeshIdentity::generate(&mut OsRng);
        let nonce = [7u8; 32];
        let hash = [9u8; 32];

        let sig = identity.sign_challenge(&nonce, &hash);
        assert!(
            verify_challenge_signature(&identity.verifying_key(), &nonce, &hash, &sig).is_ok()
        );
    }

    #[test]
    fn test_challenge_signature_binds_transcript() {
        let identity = MeshIdentity::generate(&mut OsRng);
        let nonce = [7u8; 32];
        let sig = identity.sign_challenge(&nonce, &[9u8; 32]);

        // Different handshake hash must not verify
        assert!(
            verify_challenge_signature(&identity.verifying_key(), &nonce, &[10u8; 32], &sig)
                .is_err()
        );
    }

    #[test]
    fn test_unchecked_identity_reports_invalid_keys() {
        assert!(!MeshIdentity::with_unchecked_public([0u8; 32]).has_valid_keys());
        assert!(!MeshIdentity::with_unchecked_public([0xffu8; 32]).has_valid_keys());
    }

    #[test]
    fn test_identity_from_bytes_rejects_low_order() {
        // A secret that maps to a blocked public key cannot realistically be
        // constructed, but an all-zero secret clamps to a valid scalar, so
        // round-trip the normal path instead.
        let identity = MeshIdentity::generate(&mut OsRng);
        let restored = MeshIdentity::from_bytes(
            identity.noise_secret.to_bytes(),
            identity.signing_key.to_bytes(),
        )
        .unwrap();
        assert_eq!(restored.peer_id(), identity.peer_id());
    }
}
