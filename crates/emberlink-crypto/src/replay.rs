//! Sliding-window replay protection for per-message nonces.
//!
//! Tracks a high watermark and a 64-bit bitmap of recently accepted
//! nonces. The check is split from the commit so that a failed
//! authentication never moves the window: callers probe with [`check`],
//! decrypt, and only then [`commit`].
//!
//! [`check`]: ReplayWindow::check
//! [`commit`]: ReplayWindow::commit

/// Number of nonces the window remembers behind the high watermark.
pub const REPLAY_WINDOW_SIZE: u32 = 64;

/// Sliding bitmap replay window over 32-bit message nonces.
#[derive(Debug, Clone, Default)]
pub struct ReplayWindow {
    /// Highest nonce accepted so far
    highest: u32,
    /// Bit i set => nonce (highest - i) was accepted
    bitmap: u64,
    /// False until the first nonce is committed
    primed: bool,
}

impl ReplayWindow {
    /// Create an empty window.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Would this nonce be accepted? Does not mutate the window.
    ///
    /// Rejects nonces already marked and nonces older than the window.
    #[must_use]
    pub fn check(&self, nonce: u32) -> bool {
        if !self.primed || nonce > self.highest {
            return true;
        }
        let age = self.highest - nonce;
        if age >= REPLAY_WINDOW_SIZE {
            return false;
        }
        self.bitmap & (1u64 << age) == 0
    }

    /// Mark a nonce as consumed, sliding the window forward if needed.
    ///
    /// Call only after [`check`](Self::check) returned true and the message
    /// authenticated.
    pub fn commit(&mut self, nonce: u32) {
        if !self.primed {
            self.highest = nonce;
            self.bitmap = 1;
            self.primed = true;
            return;
        }
        if nonce > self.highest {
            let shift = nonce - self.highest;
            self.bitmap = if shift >= REPLAY_WINDOW_SIZE {
                0
            } else {
                self.bitmap << shift
            };
            self.bitmap |= 1;
            self.highest = nonce;
        } else {
            self.bitmap |= 1u64 << (self.highest - nonce);
        }
    }

    /// Highest nonce accepted so far, if any.
    #[must_use]
    pub fn highest(&self) -> Option<u32> {
        self.primed.then_some(self.highest)
    }

    /// Clear all state.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_nonce_accepted() {
        let window = ReplayWindow::new();
        assert!(window.check(0));
        assert!(window.check(12345));
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut window = ReplayWindow::new();
        window.commit(5);
        assert!(!window.check(5));
        assert!(window.check(6));
        assert!(window.check(4));
    }

    #[test]
    fn test_check_does_not_mutate() {
        let mut window = ReplayWindow::new();
        window.commit(5);
        assert!(window.check(6));
        // Probing 6 twice must keep succeeding until committed
        assert!(window.check(6));
        window.commit(6);
        assert!(!window.check(6));
    }

    #[test]
    fn test_out_of_order_within_window() {
        let mut window = ReplayWindow::new();
        window.commit(10);
        window.commit(8);
        assert!(!window.check(8));
        assert!(window.check(9));
        window.commit(9);
        assert!(!window.check(9));
    }

    #[test]
    fn test_too_old_rejected() {
        let mut window = ReplayWindow::new();
        window.commit(100);
        assert!(!window.check(100 - REPLAY_WINDOW_SIZE));
        assert!(window.check(100 - REPLAY_WINDOW_SIZE + 1));
    }

    #[test]
    fn test_large_jump_clears_bitmap() {
        let mut window = ReplayWindow::new();
        window.commit(1);
        window.commit(1000);
        assert!(!window.check(1000));
        // Old entries fell out of the window entirely
        assert!(!window.check(1));
        assert!(window.check(999));
    }

    #[test]
    fn test_reset() {
        let mut window = ReplayWindow::new();
        window.commit(42);
        window.reset();
        assert!(window.check(42));
        assert_eq!(window.highest(), None);
    }

    proptest::proptest! {
        /// A committed nonce is never accepted again, whatever else was
        /// committed after it.
        #[test]
        fn committed_nonce_never_reaccepted(
            committed in 0u32..10_000,
            later in proptest::collection::vec(0u32..10_000, 0..32),
        ) {
            let mut window = ReplayWindow::new();
            window.commit(committed);
            for nonce in later {
                if window.check(nonce) {
                    window.commit(nonce);
                }
            }
            proptest::prop_assert!(!window.check(committed));
        }
    }
}
