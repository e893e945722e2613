//! Inbound remote events and outbound status events.
//!
//! [`RemoteEvent`]s arrive from the control channel during a poll step.
//! [`StatusEvent`]s are what the arbiter reports back; their `Display`
//! impl is the exact text written after the console timestamp.

use core::fmt;

/// Events delivered by the remote control channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteEvent {
    /// Remote button written.  `true` requests a pulse; `false` is ignored.
    Button(bool),
    /// Firmware update requested from the given source locator.
    UpdateRequested(String),
    /// One free-text line typed into the remote terminal.
    Console(String),
    /// The session dropped.
    ConnectivityLost,
}

/// Result reported by the firmware updater.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Image flashed; the device must reboot into it.
    Succeeded,
    /// Server had nothing newer.
    NoUpdates,
    /// Fetch or flash failed.  Carries the updater's reason text.
    Failed(String),
}

/// Status lines mirrored to the remote terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    PulseStarted,
    PulseDone,
    PulseInterrupted,
    Sleeping,
    UpdateStarted,
    UpdateSucceeded,
    UpdateNoUpdates,
    UpdateFailed(String),
    UpdateTimedOut,
    Restarting,
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PulseStarted => write!(f, "reset start"),
            Self::PulseDone => write!(f, "reset done"),
            Self::PulseInterrupted => write!(f, "OTA interrupted reset"),
            Self::Sleeping => write!(f, "sleeping"),
            Self::UpdateStarted => write!(f, "OTA started"),
            Self::UpdateSucceeded => write!(f, "OTA: Update OK, rebooting..."),
            Self::UpdateNoUpdates => write!(f, "OTA: No updates available"),
            Self::UpdateFailed(reason) => write!(f, "OTA FAILED: {reason}"),
            Self::UpdateTimedOut => write!(f, "OTA timeout, continuing normal operation"),
            Self::Restarting => write!(f, "restarting"),
        }
    }
}
