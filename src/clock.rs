//! Monotonic time source and the one-shot timer queue.
//!
//! Timers are not interrupts.  The arbiter registers `(deadline, token)`
//! pairs and pops whatever is due at its own poll points:
//!
//! ```text
//!   after(5000, PulseComplete) ──▶ ┌──────────────────────────┐
//!   after(30000, UpdateDeadline) ─▶│ [(t+5000, #1), (t+30000, #2)] │
//!   cancel(#1) ───────────────────▶│  sorted by deadline      │
//!                                  └────────────┬─────────────┘
//!                     poll: pop_due(now) ◀──────┘
//! ```
//!
//! Handles are never reused, so cancelling a handle that already fired or
//! was already cancelled cannot hit a newer registration.

use heapless::Vec;
use log::debug;

use crate::error::TimerError;

/// Monotonic millisecond clock.
pub trait Clock {
    /// Milliseconds since boot.  Never goes backwards.
    fn now_ms(&self) -> u64;

    /// Milliseconds elapsed since `since`.
    fn elapsed_since(&self, since: u64) -> u64 {
        self.now_ms().saturating_sub(since)
    }
}

/// Identity of a pending registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u32);

#[derive(Debug, Clone)]
struct Entry<T> {
    deadline_ms: u64,
    handle: TimerHandle,
    token: T,
}

/// Fixed-capacity ordered queue of one-shot timers.
pub struct OneShotTimers<T, const N: usize> {
    /// Sorted ascending by deadline; ties keep registration order.
    entries: Vec<Entry<T>, N>,
    next_handle: u32,
}

impl<T: Copy + core::fmt::Debug, const N: usize> OneShotTimers<T, N> {
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_handle: 0,
        }
    }

    /// Register `token` to become due `delay_ms` after `now_ms`.
    pub fn after(&mut self, now_ms: u64, delay_ms: u64, token: T) -> Result<TimerHandle, TimerError> {
        let deadline_ms = now_ms.saturating_add(delay_ms);
        let handle = TimerHandle(self.next_handle);

        let pos = self
            .entries
            .iter()
            .position(|e| e.deadline_ms > deadline_ms)
            .unwrap_or(self.entries.len());
        self.entries
            .insert(pos, Entry { deadline_ms, handle, token })
            .map_err(|_| TimerError::QueueFull)?;

        self.next_handle = self.next_handle.wrapping_add(1);
        debug!("Timers: {:?} due at {} ms ({:?})", token, deadline_ms, handle);
        Ok(handle)
    }

    /// Remove a pending registration.  Returns `false` when the handle had
    /// already fired or been cancelled.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        match self.entries.iter().position(|e| e.handle == handle) {
            Some(pos) => {
                self.entries.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Pop the earliest registration whose deadline has passed.
    pub fn pop_due(&mut self, now_ms: u64) -> Option<T> {
        match self.entries.first() {
            Some(first) if first.deadline_ms <= now_ms => Some(self.entries.remove(0).token),
            _ => None,
        }
    }

    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.entries.iter().any(|e| e.handle == handle)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: Copy + core::fmt::Debug, const N: usize> Default for OneShotTimers<T, N> {
    fn default() -> Self {
        Self::new()
    }
}
