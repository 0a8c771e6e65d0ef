//! Cooperative interrupt latch shared between the turn scheduler and the
//! agent engine.
//!
//! The agent is contractually required to call [`InterruptHandle::is_set`]
//! at its yield points (between tool calls, between streaming chunks) and
//! terminate cooperatively when the latch is raised. The gateway never
//! force-kills a turn mid-syscall.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One-shot interrupt signal for a running turn.
///
/// Cloning shares the latch. `set` is idempotent; `clear` re-arms the latch
/// for the next turn and must happen before the next agent invocation.
#[derive(Debug, Clone, Default)]
pub struct InterruptHandle {
    flag: Arc<AtomicBool>,
}

impl InterruptHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cooperative termination of the current turn.
    pub fn set(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// True once an interrupt has been requested.
    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Re-arm the latch.
    pub fn clear(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_is_idempotent_and_clear_rearms() {
        let handle = InterruptHandle::new();
        assert!(!handle.is_set());
        handle.set();
        handle.set();
        assert!(handle.is_set());
        handle.clear();
        assert!(!handle.is_set());
        handle.set();
        assert!(handle.is_set());
    }

    #[test]
    fn clones_share_the_latch() {
        let a = InterruptHandle::new();
        let b = a.clone();
        b.set();
        assert!(a.is_set());
    }
}
