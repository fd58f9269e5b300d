//! Session table and handshake routing.
//!
//! The manager is the sole owner of the peer-to-session map. Inbound
//! handshake bytes and outbound encrypt requests arrive from different
//! execution contexts; operations on different peers never contend, and
//! operations on the same peer serialize on that session's mutex.
//!
//! Two peers discovering each other at the same moment may both
//! initiate. The tie-break is deterministic: the side with the lower
//! peer id keeps its initiator role and ignores the other's first
//! message; the higher side abandons its half-open attempt and answers
//! as responder. Both sides converge on a single session.

use std::sync::{Arc, Mutex, PoisonError};

use crossbeam_queue::SegQueue;
use dashmap::DashMap;
use emberlink_crypto::{
    Fingerprint, MeshIdentity, NoiseSession, PeerId, Role, SessionConfig, SessionState,
};
use tracing::{debug, warn};

use crate::error::SessionError;
use crate::event::MeshEvent;

/// Byte length of the first XX handshake message, used to recognize a
/// simultaneous initiation.
const XX_MESSAGE_1_SIZE: usize = 32;

type SessionHandle = Arc<Mutex<NoiseSession>>;

/// Owns every [`NoiseSession`] and the event queue the application
/// drains.
pub struct SessionManager {
    identity: Arc<MeshIdentity>,
    sessions: DashMap<PeerId, SessionHandle>,
    events: SegQueue<MeshEvent>,
    session_config: SessionConfig,
}

impl SessionManager {
    /// Create a manager around a local identity.
    #[must_use]
    pub fn new(identity: Arc<MeshIdentity>) -> Self {
        Self::with_config(identity, SessionConfig::default())
    }

    /// Create a manager with custom per-session tuning.
    #[must_use]
    pub fn with_config(identity: Arc<MeshIdentity>, session_config: SessionConfig) -> Self {
        Self {
            identity,
            sessions: DashMap::new(),
            events: SegQueue::new(),
            session_config,
        }
    }

    /// Our own peer id.
    #[must_use]
    pub fn local_peer_id(&self) -> PeerId {
        self.identity.peer_id()
    }

    fn new_session(&self, peer: PeerId, role: Role) -> SessionHandle {
        Arc::new(Mutex::new(NoiseSession::with_config(
            peer,
            role,
            Arc::clone(&self.identity),
            self.session_config.clone(),
        )))
    }

    fn lock(handle: &SessionHandle) -> std::sync::MutexGuard<'_, NoiseSession> {
        handle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a handshake with a peer, returning the first message to
    /// send. Replaces any previous session for the peer, so this is
    /// also the rekey entry point.
    pub fn initiate_handshake(&self, peer: PeerId) -> Result<Vec<u8>, SessionError> {
        let handle = self.new_session(peer, Role::Initiator);
        let msg = Self::lock(&handle).initiate_handshake()?;
        self.sessions.insert(peer, handle);
        debug!(%peer, "outbound handshake started");
        Ok(msg)
    }

    /// Route one inbound handshake message, returning the reply to send
    /// back, if any. Creates a responder session when none exists,
    /// resolves simultaneous initiations, and accepts a handshake on an
    /// established session as a peer-driven rekey.
    pub fn process_handshake_message(
        &self,
        peer: PeerId,
        message: &[u8],
    ) -> Result<Option<Vec<u8>>, SessionError> {
        let handle = match self.sessions.get(&peer) {
            Some(entry) => Arc::clone(entry.value()),
            None => {
                let handle = self.new_session(peer, Role::Responder);
                self.sessions.insert(peer, Arc::clone(&handle));
                handle
            }
        };

        let mut session = Self::lock(&handle);
        match session.state() {
            SessionState::Handshaking
                if session.is_initiator() && message.len() == XX_MESSAGE_1_SIZE =>
            {
                // Both sides initiated at once
                if self.local_peer_id() < peer {
                    debug!(%peer, "simultaneous initiation, keeping initiator role");
                    return Ok(None);
                }
                debug!(%peer, "simultaneous initiation, yielding to lower peer id");
                drop(session);
                let handle = self.new_session(peer, Role::Responder);
                self.sessions.insert(peer, Arc::clone(&handle));
                let mut session = Self::lock(&handle);
                let reply = session.process_handshake_message(message)?;
                self.finish_if_established(&session);
                Ok(reply)
            }
            SessionState::Established | SessionState::Failed => {
                // Peer-driven rekey, or retry after a failure
                debug!(%peer, state = ?session.state(), "replacing session for inbound handshake");
                drop(session);
                let handle = self.new_session(peer, Role::Responder);
                self.sessions.insert(peer, Arc::clone(&handle));
                let mut session = Self::lock(&handle);
                let reply = session.process_handshake_message(message)?;
                self.finish_if_established(&session);
                Ok(reply)
            }
            _ => {
                let reply = session.process_handshake_message(message)?;
                self.finish_if_established(&session);
                Ok(reply)
            }
        }
    }

    fn finish_if_established(&self, session: &NoiseSession) {
        if !session.is_established() {
            return;
        }
        let Some(remote) = session.remote_static_key() else {
            return;
        };
        self.emit(MeshEvent::SessionEstablished {
            peer: session.peer_id(),
            fingerprint: Fingerprint::of(remote),
        });
    }

    /// Encrypt a payload for a peer.
    ///
    /// With no usable session this fails and queues
    /// [`MeshEvent::HandshakeRequired`] so the orchestrator knows to
    /// negotiate first.
    pub fn encrypt_for(&self, peer: PeerId, plaintext: &[u8]) -> Result<Vec<u8>, SessionError> {
        let Some(entry) = self.sessions.get(&peer) else {
            self.emit(MeshEvent::HandshakeRequired { peer });
            return Err(SessionError::NoSession(peer));
        };
        let handle = Arc::clone(entry.value());
        drop(entry);

        let mut session = Self::lock(&handle);
        if !session.is_established() {
            self.emit(MeshEvent::HandshakeRequired { peer });
            return Err(SessionError::NotEstablished(peer));
        }
        Ok(session.encrypt(plaintext)?)
    }

    /// Decrypt a transport payload from a peer and queue the plaintext
    /// as a [`MeshEvent::MessageReceived`].
    pub fn decrypt_from(&self, peer: PeerId, payload: &[u8]) -> Result<Vec<u8>, SessionError> {
        let Some(entry) = self.sessions.get(&peer) else {
            warn!(%peer, "ciphertext from peer with no session");
            return Err(SessionError::NoSession(peer));
        };
        let handle = Arc::clone(entry.value());
        drop(entry);

        let mut session = Self::lock(&handle);
        if !session.is_established() {
            return Err(SessionError::NotEstablished(peer));
        }
        let plaintext = session.decrypt(payload)?;
        self.emit(MeshEvent::MessageReceived {
            from: peer,
            payload: plaintext.clone(),
        });
        Ok(plaintext)
    }

    /// Whether an established session exists for the peer.
    #[must_use]
    pub fn has_established_session(&self, peer: &PeerId) -> bool {
        self.sessions
            .get(peer)
            .is_some_and(|entry| Self::lock(entry.value()).is_established())
    }

    /// Handshake transcript hash for a peer, once established.
    #[must_use]
    pub fn handshake_hash_of(&self, peer: &PeerId) -> Option<[u8; 32]> {
        let entry = self.sessions.get(peer)?;
        let session = Self::lock(entry.value());
        session.handshake_hash().copied()
    }

    /// Peers whose session has crossed a rekey ceiling.
    #[must_use]
    pub fn peers_needing_rekey(&self) -> Vec<PeerId> {
        self.sessions
            .iter()
            .filter(|entry| Self::lock(entry.value()).needs_rekey())
            .map(|entry| *entry.key())
            .collect()
    }

    /// Drop the session for a peer, if any.
    pub fn remove_session(&self, peer: &PeerId) {
        if self.sessions.remove(peer).is_some() {
            debug!(%peer, "session removed");
        }
    }

    /// Number of tracked sessions in any state.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Queue an event for the application. Orchestrators also use this
    /// to surface decoded ack payloads as typed events.
    pub fn emit(&self, event: MeshEvent) {
        self.events.push(event);
    }

    /// Pop the next pending event, if any.
    #[must_use]
    pub fn poll_event(&self) -> Option<MeshEvent> {
        self.events.pop()
    }

    /// Drop every session. Queued events stay drainable.
    pub fn shutdown(&self) {
        self.sessions.clear();
        debug!("session manager shut down");
    }
}
