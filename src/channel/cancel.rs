//! Cooperative cancellation for blocking consumers.
//!
//! The consumer polls a [`Cancellation`] before blocking and between
//! extraction chunks. It is never checked in the middle of a word copy.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Source of a pending-cancellation signal observed by consumers.
pub trait Cancellation {
    /// Returns true if the current consumer call should stop.
    fn is_cancelled(&self) -> bool;
}

/// Shared flag raised from another thread or a signal handler.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    raised: Arc<AtomicBool>,
}

impl CancelFlag {
    /// Creates a lowered flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation of any consumer observing this flag.
    pub fn raise(&self) {
        self.raised.store(true, Ordering::SeqCst);
    }

    /// Lowers the flag so the next read can proceed.
    pub fn clear(&self) {
        self.raised.store(false, Ordering::SeqCst);
    }
}

impl Cancellation for CancelFlag {
    fn is_cancelled(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }
}

/// A consumer that can never be cancelled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverCancelled;

impl Cancellation for NeverCancelled {
    fn is_cancelled(&self) -> bool {
        false
    }
}

impl<T: Cancellation + ?Sized> Cancellation for &T {
    fn is_cancelled(&self) -> bool {
        (**self).is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_shared_between_clones() {
        let flag = CancelFlag::new();
        let other = flag.clone();
        assert!(!other.is_cancelled());

        flag.raise();
        assert!(other.is_cancelled());

        other.clear();
        assert!(!flag.is_cancelled());
    }
}
