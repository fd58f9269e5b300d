//! Pull-sync request/response correlation.
//!
//! A response-flagged packet from a peer we never asked is spoofing or
//! amplification bait, so responses are only accepted while a request
//! window for that peer is open. Validation does not consume the
//! registration because one request can legitimately produce many
//! response fragments.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use emberlink_crypto::PeerId;
use tracing::debug;

/// How long a registered request accepts responses.
pub const RESPONSE_WINDOW: Duration = Duration::from_secs(30);

/// Tracks which peers have an outstanding sync request.
#[derive(Default)]
pub struct SyncCorrelator {
    pending: Mutex<HashMap<PeerId, Instant>>,
}

impl SyncCorrelator {
    /// Create an empty correlator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<PeerId, Instant>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open (or re-open) the response window for a peer, stamping the
    /// current time over any prior registration.
    pub fn register_request(&self, peer: PeerId) {
        self.lock().insert(peer, Instant::now());
    }

    /// Whether a packet from `peer` may be accepted as a sync response.
    ///
    /// Requires the response flag, an open registration, and elapsed
    /// time within [`RESPONSE_WINDOW`]. The registration is left in
    /// place for further fragments.
    #[must_use]
    pub fn is_valid_response(&self, peer: &PeerId, response_flagged: bool) -> bool {
        if !response_flagged {
            return false;
        }
        match self.lock().get(peer) {
            Some(registered) => registered.elapsed() <= RESPONSE_WINDOW,
            None => false,
        }
    }

    /// Drop registrations older than the window.
    pub fn sweep(&self) {
        let mut pending = self.lock();
        let before = pending.len();
        pending.retain(|_, registered| registered.elapsed() <= RESPONSE_WINDOW);
        let dropped = before - pending.len();
        if dropped > 0 {
            debug!(dropped, remaining = pending.len(), "sync window sweep");
        }
    }

    /// Number of open windows.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.lock().len()
    }
}
