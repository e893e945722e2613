//! Arbiter modes and the per-mode state they carry.
//!
//! ```text
//!  BOOTING ──[sync attempted / timed out]──▶ DECIDING
//!                                              │
//!        ┌─────────[button | pulse_on_boot]────┤
//!        ▼                                     ├──[update]──▶ UPDATING ──[ok]──▶ REBOOTING
//!     PULSING ──[update: release first]────────┼────────────▶    │
//!        │                                     │        [fail | none | deadline]
//!   [duration elapsed]                         │                 │
//!        ├──[Sleep]──▶ DECIDING ◀──────────────┼─────────────────┘
//!        └──[StayResident]──▶ RESIDENT ──[button | update]──▶ ...
//!                                              │
//!                                     [nothing pending]──▶ SLEEPING
//! ```
//!
//! Pulse and update bookkeeping live inside their variants, so "pulsing
//! and updating at once" cannot be expressed.

use crate::clock::TimerHandle;

/// Sub-phases of boot.  Each one is bounded by its own timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootPhase {
    /// Waiting for the wall clock to sync.
    TimeSync { since_ms: u64 },
    /// Waiting for the session to come up.
    Connecting { since_ms: u64 },
    /// Button sync requested; servicing the session so the reply lands.
    SyncingButton { since_ms: u64 },
}

/// A relay pulse in progress.  Exists only inside [`Mode::Pulsing`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PulseState {
    pub started_at_ms: u64,
    pub duration_ms: u64,
    /// Completion timer in the timer-callback variant.
    pub(crate) timer: Option<TimerHandle>,
}

impl PulseState {
    pub fn ends_at_ms(&self) -> u64 {
        self.started_at_ms.saturating_add(self.duration_ms)
    }
}

/// A firmware update in progress.  Exists only inside
/// [`Mode::UpdatingFirmware`], so at most one can exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateState {
    pub source_url: String,
    pub started_at_ms: u64,
    pub deadline_ms: u64,
    pub(crate) timer: Option<TimerHandle>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Booting(BootPhase),
    Deciding,
    Pulsing(PulseState),
    UpdatingFirmware(UpdateState),
    /// Awake after a pulse, waiting for further commands.
    Resident,
    /// Low-power primitive invoked.  Terminal.
    Sleeping,
    /// Restart invoked.  Terminal.
    Rebooting,
}

impl Mode {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Booting(_) => "Booting",
            Self::Deciding => "Deciding",
            Self::Pulsing(_) => "Pulsing",
            Self::UpdatingFirmware(_) => "UpdatingFirmware",
            Self::Resident => "Resident",
            Self::Sleeping => "Sleeping",
            Self::Rebooting => "Rebooting",
        }
    }

    /// No further poll step has any effect.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Sleeping | Self::Rebooting)
    }

    pub fn is_pulsing(&self) -> bool {
        matches!(self, Self::Pulsing(_))
    }

    pub fn is_updating(&self) -> bool {
        matches!(self, Self::UpdatingFirmware(_))
    }
}
