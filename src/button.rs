//! Pending remote-button latch.
//!
//! The control channel may set the latch from a callback running inside
//! the poll step, or (on a future transport) from an interrupt context.
//! Only the arbiter reads and clears it.
//!
//! ```text
//!   channel callback / ISR ──set()──▶ AtomicBool ──take()──▶ Arbiter
//! ```

use core::sync::atomic::{AtomicBool, Ordering};

/// Set-once / clear-once flag for a requested pulse.
#[derive(Debug, Default)]
pub struct ButtonLatch {
    pending: AtomicBool,
}

impl ButtonLatch {
    pub const fn new() -> Self {
        Self {
            pending: AtomicBool::new(false),
        }
    }

    /// Mark a pulse as requested.  Idempotent while pending.
    /// Safe to call from any context.
    pub fn set(&self) {
        self.pending.store(true, Ordering::Release);
    }

    /// Whether a request is pending, without consuming it.
    pub fn is_set(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Consume the request.  Returns `true` exactly once per `set()` burst.
    pub(crate) fn take(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }
}
