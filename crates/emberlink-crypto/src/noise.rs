//! Noise session state machine.
//!
//! One [`NoiseSession`] per remote peer, running the `Noise_XX` pattern for
//! mutual authentication with identity hiding. The lifecycle is
//! `Uninitialized -> Handshaking -> Established`, with a terminal `Failed`
//! state reachable from anywhere on key-validation or cryptographic
//! failure. A failed session is discarded and recreated, never repaired.
//!
//! Transport messages are framed as a 4-byte big-endian nonce followed by
//! the AEAD ciphertext, so the receiver can locate the counter before
//! attempting decryption. Received nonces pass through a sliding replay
//! window; a failed decrypt never advances any counter.

use crate::identity::{is_valid_public_key, MeshIdentity, PeerId};
use crate::replay::ReplayWindow;
use crate::CryptoError;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Noise protocol pattern used for all sessions.
pub const NOISE_PATTERN: &str = "Noise_XX_25519_ChaChaPoly_SHA256";

/// Bytes of big-endian nonce prefixed to every transport ciphertext.
pub const NONCE_PREFIX_SIZE: usize = 4;

/// AEAD authentication tag size.
pub const TAG_SIZE: usize = 16;

/// Messages sent before a session must renegotiate its keys.
pub const REKEY_MESSAGE_LIMIT: u64 = 10_000;

/// Largest handshake message the pattern can produce.
const MAX_HANDSHAKE_MESSAGE_SIZE: usize = 1024;

/// Session tuning parameters.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Message-count ceiling before rekey is required
    pub rekey_message_limit: u64,
    /// Wall-clock session age ceiling before rekey is required
    pub rekey_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            rekey_message_limit: REKEY_MESSAGE_LIMIT,
            rekey_interval: Duration::from_secs(3600),
        }
    }
}

/// Role in the handshake, fixed at session creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Sends the first handshake message
    Initiator,
    /// Receives the first handshake message
    Responder,
}

/// Session state enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, no handshake traffic yet
    Uninitialized,
    /// Handshake in progress
    Handshaking,
    /// Transport keys derived, ready for encrypt/decrypt
    Established,
    /// Terminal failure; discard and recreate
    Failed,
}

enum Phase {
    Idle,
    Handshake(Box<snow::HandshakeState>),
    Transport(snow::StatelessTransportState),
}

/// A Noise session with a single remote peer.
pub struct NoiseSession {
    peer_id: PeerId,
    role: Role,
    state: SessionState,
    config: SessionConfig,
    identity: Arc<MeshIdentity>,
    phase: Phase,
    remote_static: Option<[u8; 32]>,
    handshake_hash: Option<[u8; 32]>,
    send_nonce: u32,
    messages_sent: u64,
    messages_received: u64,
    replay: ReplayWindow,
    created_at: Instant,
    established_at: Option<Instant>,
}

impl NoiseSession {
    /// Create a session for a peer with default configuration.
    ///
    /// A session built from an identity whose static key fails small-order
    /// validation starts directly in [`SessionState::Failed`].
    #[must_use]
    pub fn new(peer_id: PeerId, role: Role, identity: Arc<MeshIdentity>) -> Self {
        Self::with_config(peer_id, role, identity, SessionConfig::default())
    }

    /// Create a session with custom configuration.
    #[must_use]
    pub fn with_config(
        peer_id: PeerId,
        role: Role,
        identity: Arc<MeshIdentity>,
        config: SessionConfig,
    ) -> Self {
        let state = if identity.has_valid_keys() {
            SessionState::Uninitialized
        } else {
            tracing::warn!(peer = %peer_id, "local static key failed validation, session unusable");
            SessionState::Failed
        };

        Self {
            peer_id,
            role,
            state,
            config,
            identity,
            phase: Phase::Idle,
            remote_static: None,
            handshake_hash: None,
            send_nonce: 0,
            messages_sent: 0,
            messages_received: 0,
            replay: ReplayWindow::new(),
            created_at: Instant::now(),
            established_at: None,
        }
    }

    /// The remote peer this session is bound to.
    #[must_use]
    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    /// Handshake role, fixed at creation.
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Whether this side initiated the handshake.
    #[must_use]
    pub fn is_initiator(&self) -> bool {
        self.role == Role::Initiator
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the session is ready for transport traffic.
    #[must_use]
    pub fn is_established(&self) -> bool {
        self.state == SessionState::Established
    }

    /// Remote static public key, set once the handshake completes.
    #[must_use]
    pub fn remote_static_key(&self) -> Option<&[u8; 32]> {
        self.remote_static.as_ref()
    }

    /// Handshake transcript hash, for out-of-band verification binding.
    #[must_use]
    pub fn handshake_hash(&self) -> Option<&[u8; 32]> {
        self.handshake_hash.as_ref()
    }

    /// Transport messages sent since establishment.
    #[must_use]
    pub fn messages_sent(&self) -> u64 {
        self.messages_sent
    }

    /// Transport messages successfully received since establishment.
    #[must_use]
    pub fn messages_received(&self) -> u64 {
        self.messages_received
    }

    /// When this session object was created.
    #[must_use]
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    fn build_handshake(&self) -> Result<snow::HandshakeState, CryptoError> {
        let params: snow::params::NoiseParams = NOISE_PATTERN.parse()?;
        let private = self.identity.noise_private_key();
        let builder = snow::Builder::new(params).local_private_key(&*private)?;
        let handshake = match self.role {
            Role::Initiator => builder.build_initiator()?,
            Role::Responder => builder.build_responder()?,
        };
        Ok(handshake)
    }

    fn fail(&mut self, err: CryptoError) -> CryptoError {
        tracing::warn!(peer = %self.peer_id, error = %err, "session failed");
        self.state = SessionState::Failed;
        self.phase = Phase::Idle;
        err
    }

    /// Produce the first handshake message and enter `Handshaking`.
    ///
    /// Valid only for an initiator in `Uninitialized`.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidState`] (without side effects) if the
    /// session is not an uninitialized initiator; cryptographic failures
    /// move the session to `Failed`.
    pub fn initiate_handshake(&mut self) -> Result<Vec<u8>, CryptoError> {
        if self.state != SessionState::Uninitialized || self.role != Role::Initiator {
            return Err(CryptoError::InvalidState);
        }

        let mut handshake = match self.build_handshake() {
            Ok(hs) => hs,
            Err(e) => return Err(self.fail(e)),
        };

        let mut buf = vec![0u8; MAX_HANDSHAKE_MESSAGE_SIZE];
        let len = match handshake.write_message(&[], &mut buf) {
            Ok(len) => len,
            Err(e) => return Err(self.fail(e.into())),
        };
        buf.truncate(len);

        self.phase = Phase::Handshake(Box::new(handshake));
        self.state = SessionState::Handshaking;
        tracing::debug!(peer = %self.peer_id, "handshake initiated");
        Ok(buf)
    }

    /// Consume one handshake message, optionally producing a reply.
    ///
    /// For the 3-message XX pattern: the responder replies to message 1,
    /// the initiator replies to message 2 and completes, and the responder
    /// completes on message 3 with no reply.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidState`] without side effects when the
    /// session cannot accept a handshake message (already established,
    /// failed, or an initiator that has not sent message 1). Cryptographic
    /// failures transition the session to `Failed`.
    pub fn process_handshake_message(
        &mut self,
        message: &[u8],
    ) -> Result<Option<Vec<u8>>, CryptoError> {
        match self.state {
            SessionState::Uninitialized if self.role == Role::Responder => {
                let mut handshake = match self.build_handshake() {
                    Ok(hs) => hs,
                    Err(e) => return Err(self.fail(e)),
                };
                let mut payload = vec![0u8; MAX_HANDSHAKE_MESSAGE_SIZE];
                if let Err(e) = handshake.read_message(message, &mut payload) {
                    return Err(self.fail(e.into()));
                }
                let mut reply = vec![0u8; MAX_HANDSHAKE_MESSAGE_SIZE];
                let len = match handshake.write_message(&[], &mut reply) {
                    Ok(len) => len,
                    Err(e) => return Err(self.fail(e.into())),
                };
                reply.truncate(len);
                self.phase = Phase::Handshake(Box::new(handshake));
                self.state = SessionState::Handshaking;
                Ok(Some(reply))
            }
            SessionState::Handshaking => {
                let Phase::Handshake(handshake) = &mut self.phase else {
                    return Err(self.fail(CryptoError::InvalidState));
                };
                let mut payload = vec![0u8; MAX_HANDSHAKE_MESSAGE_SIZE];
                if let Err(e) = handshake.read_message(message, &mut payload) {
                    return Err(self.fail(e.into()));
                }

                let reply = if handshake.is_handshake_finished() {
                    // Responder consumed message 3
                    None
                } else {
                    let mut reply = vec![0u8; MAX_HANDSHAKE_MESSAGE_SIZE];
                    let len = match handshake.write_message(&[], &mut reply) {
                        Ok(len) => len,
                        Err(e) => return Err(self.fail(e.into())),
                    };
                    reply.truncate(len);
                    Some(reply)
                };

                if matches!(&self.phase, Phase::Handshake(hs) if hs.is_handshake_finished()) {
                    self.complete_handshake()?;
                }
                Ok(reply)
            }
            _ => Err(CryptoError::InvalidState),
        }
    }

    /// Promote a finished handshake into transport mode.
    fn complete_handshake(&mut self) -> Result<(), CryptoError> {
        let Phase::Handshake(handshake) = std::mem::replace(&mut self.phase, Phase::Idle) else {
            return Err(self.fail(CryptoError::InvalidState));
        };

        let remote = match handshake.get_remote_static() {
            Some(key) if key.len() == 32 => {
                let mut bytes = [0u8; 32];
                bytes.copy_from_slice(key);
                bytes
            }
            _ => return Err(self.fail(CryptoError::InvalidPeerKey)),
        };
        if !is_valid_public_key(&remote) {
            return Err(self.fail(CryptoError::InvalidPeerKey));
        }

        let hash_bytes = handshake.get_handshake_hash();
        if hash_bytes.len() != 32 {
            return Err(self.fail(CryptoError::InvalidState));
        }
        let mut hash = [0u8; 32];
        hash.copy_from_slice(hash_bytes);

        let transport = match handshake.into_stateless_transport_mode() {
            Ok(t) => t,
            Err(e) => return Err(self.fail(e.into())),
        };

        self.remote_static = Some(remote);
        self.handshake_hash = Some(hash);
        self.phase = Phase::Transport(transport);
        self.state = SessionState::Established;
        self.established_at = Some(Instant::now());
        tracing::debug!(peer = %self.peer_id, role = ?self.role, "session established");
        Ok(())
    }

    /// Encrypt a transport message.
    ///
    /// Output layout: 4-byte big-endian nonce, then AEAD ciphertext with
    /// tag. Increments the send counter only on success.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::NotEstablished`] before the handshake
    /// completes and [`CryptoError::NonceOverflow`] once the send counter
    /// is exhausted.
    pub fn encrypt(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if self.state != SessionState::Established {
            return Err(CryptoError::NotEstablished);
        }
        let Phase::Transport(transport) = &self.phase else {
            return Err(CryptoError::NotEstablished);
        };
        if self.send_nonce == u32::MAX {
            return Err(CryptoError::NonceOverflow);
        }

        let nonce = self.send_nonce;
        let mut out = vec![0u8; NONCE_PREFIX_SIZE + plaintext.len() + TAG_SIZE];
        out[..NONCE_PREFIX_SIZE].copy_from_slice(&nonce.to_be_bytes());
        let len = transport.write_message(u64::from(nonce), plaintext, &mut out[NONCE_PREFIX_SIZE..])?;
        out.truncate(NONCE_PREFIX_SIZE + len);

        self.send_nonce += 1;
        self.messages_sent += 1;
        Ok(out)
    }

    /// Decrypt a transport message framed by [`encrypt`](Self::encrypt).
    ///
    /// Rejects replays and out-of-window nonces before touching the
    /// cipherstate; no counter or window state changes unless the message
    /// authenticates.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::NotEstablished`], a
    /// [`CryptoError::MalformedCiphertext`] for short inputs,
    /// [`CryptoError::ReplayDetected`] for consumed/too-old nonces, or
    /// [`CryptoError::DecryptionFailed`] on authentication failure.
    pub fn decrypt(&mut self, payload: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if self.state != SessionState::Established {
            return Err(CryptoError::NotEstablished);
        }
        let Phase::Transport(transport) = &self.phase else {
            return Err(CryptoError::NotEstablished);
        };
        if payload.len() < NONCE_PREFIX_SIZE + TAG_SIZE {
            return Err(CryptoError::MalformedCiphertext {
                expected: NONCE_PREFIX_SIZE + TAG_SIZE,
                actual: payload.len(),
            });
        }

        let nonce = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
        if !self.replay.check(nonce) {
            tracing::warn!(peer = %self.peer_id, nonce, "replayed or stale nonce rejected");
            return Err(CryptoError::ReplayDetected(nonce));
        }

        let ciphertext = &payload[NONCE_PREFIX_SIZE..];
        let mut out = vec![0u8; ciphertext.len()];
        let len = transport
            .read_message(u64::from(nonce), ciphertext, &mut out)
            .map_err(|_| CryptoError::DecryptionFailed)?;
        out.truncate(len);

        self.replay.commit(nonce);
        self.messages_received += 1;
        Ok(out)
    }

    /// Whether the session has crossed a rekey ceiling.
    ///
    /// True once `messages_sent` reaches the message limit or the session
    /// age reaches the wall-clock limit. Rekeying renegotiates a fresh
    /// handshake; it only applies while still established.
    #[must_use]
    pub fn needs_rekey(&self) -> bool {
        if self.state != SessionState::Established {
            return false;
        }
        if self.messages_sent >= self.config.rekey_message_limit {
            return true;
        }
        let age_base = self.established_at.unwrap_or(self.created_at);
        age_base.elapsed() >= self.config.rekey_interval
    }

    /// Clear all session state back to `Uninitialized`.
    ///
    /// For reuse after explicit teardown. Unlike fresh construction this
    /// does not re-validate the local static keys.
    pub fn reset(&mut self) {
        self.state = SessionState::Uninitialized;
        self.phase = Phase::Idle;
        self.remote_static = None;
        self.handshake_hash = None;
        self.send_nonce = 0;
        self.messages_sent = 0;
        self.messages_received = 0;
        self.replay.reset();
        self.created_at = Instant::now();
        self.established_at = None;
        tracing::debug!(peer = %self.peer_id, "session reset");
    }
}
