//! Process shutdown signal observed by every spin loop.

use std::sync::atomic::{AtomicBool, Ordering};

/// Shared "shutting down" flag.
///
/// Every blocking primitive takes a reference to one of these and polls it on
/// each wait iteration, so lock contention can never prevent process exit.
/// Shared across threads via `Arc`.
#[derive(Debug, Default)]
pub struct ShutdownFlag(AtomicBool);

impl ShutdownFlag {
    /// Creates a flag in the running (not shutting down) state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Signals shutdown. Irreversible.
    pub fn trigger(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Returns `true` once shutdown has been signaled.
    pub fn is_shutting_down(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_is_observed() {
        let flag = ShutdownFlag::new();
        assert!(!flag.is_shutting_down());
        flag.trigger();
        assert!(flag.is_shutting_down());
    }
}
