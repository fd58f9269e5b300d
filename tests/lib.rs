//! Shared helpers for the integration test suite.

use std::sync::Arc;

use emberlink_core::SessionManager;
use emberlink_crypto::MeshIdentity;
use rand_core::OsRng;

/// Install a fmt subscriber honoring `RUST_LOG`, once per process.
///
/// Repeated calls are harmless; only the first registration wins.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Build a manager around a fresh random identity.
pub fn fresh_manager() -> SessionManager {
    init_tracing();
    SessionManager::new(Arc::new(MeshIdentity::generate(&mut OsRng)))
}

/// Drive a full XX handshake between two managers, `initiator` first.
///
/// Panics if any step fails; tests treat an incomplete handshake as a
/// hard error.
pub fn connect(initiator: &SessionManager, responder: &SessionManager) {
    let init_id = initiator.local_peer_id();
    let resp_id = responder.local_peer_id();

    let msg1 = initiator.initiate_handshake(resp_id).unwrap();
    let msg2 = responder
        .process_handshake_message(init_id, &msg1)
        .unwrap()
        .unwrap();
    let msg3 = initiator
        .process_handshake_message(resp_id, &msg2)
        .unwrap()
        .unwrap();
    assert!(responder
        .process_handshake_message(init_id, &msg3)
        .unwrap()
        .is_none());
}
