//! Port traits: the hexagonal boundary between the arbiter and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Arbiter (domain)
//! ```
//!
//! Driven adapters (relay, session, control channel, updater, power)
//! implement these traits.  The [`Arbiter`](crate::arbiter::Arbiter)
//! consumes them through the [`Platform`] bundle passed into each poll
//! step, so the decision logic never touches hardware directly.

use core::net::Ipv4Addr;
use core::time::Duration;

use embedded_hal::delay::DelayNs;

pub use crate::clock::Clock;

use super::events::{RemoteEvent, UpdateOutcome};

// ───────────────────────────────────────────────────────────────
// Relay port (domain → hardware)
// ───────────────────────────────────────────────────────────────

/// The relay that interrupts the attached device's power.
///
/// Both operations are synchronous and cannot fail at this layer.
/// The released level must equal the power-on default.
pub trait RelayPort {
    /// Cut power to the attached device; indicator on.
    fn energize(&mut self);

    /// Restore power to the attached device; indicator off.
    fn release(&mut self);

    /// Logical mirror of the physical relay level.
    fn is_energized(&self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Wall clock (timestamps only, never used for timing)
// ───────────────────────────────────────────────────────────────

pub trait WallClock {
    /// Seconds since the Unix epoch, or `None` before time sync.
    fn unix_time(&self) -> Option<i64>;
}

// ───────────────────────────────────────────────────────────────
// Connectivity session
// ───────────────────────────────────────────────────────────────

/// Network session with the control backend.
pub trait SessionPort {
    /// Pump the session once.  May queue inbound [`RemoteEvent`]s for
    /// [`RemoteChannel::next_event`].  Must return quickly.
    fn service(&mut self);

    fn is_connected(&self) -> bool;

    fn local_ip(&self) -> Option<Ipv4Addr>;

    /// Link signal strength in dBm.
    fn rssi(&self) -> Option<i8>;

    /// Orderly teardown of the backend session and the radio link.
    fn disconnect(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Remote control channel (virtual pins + terminal)
// ───────────────────────────────────────────────────────────────

pub trait RemoteChannel {
    /// Next queued inbound event, if any.
    fn next_event(&mut self) -> Option<RemoteEvent>;

    /// Ask the backend to replay the button pin's last known value.
    fn request_button_sync(&mut self);

    /// Publish a value on a virtual pin (see [`crate::pins::virtual_pins`]).
    fn write_virtual(&mut self, pin: u8, value: &str);

    /// Append one line to the remote terminal.
    fn console_write(&mut self, line: &str);

    /// Push buffered terminal output to the backend.
    fn console_flush(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Firmware updater
// ───────────────────────────────────────────────────────────────

/// Fetch-and-flash collaborator.  Starting is fire-and-forget; the
/// arbiter only observes the outcome.
pub trait UpdaterPort {
    fn begin_update(&mut self, url: &str);

    /// Outcome of the running update, once known.  Returns it exactly once.
    fn poll_outcome(&mut self) -> Option<UpdateOutcome>;
}

// ───────────────────────────────────────────────────────────────
// Power management
// ───────────────────────────────────────────────────────────────

/// Terminal platform primitives.  On hardware neither returns.
pub trait PowerPort {
    /// Power down CPU and radio for `duration`; wake restarts from boot.
    fn deep_sleep(&mut self, duration: Duration);

    /// Immediate software restart.
    fn restart(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Platform bundle
// ───────────────────────────────────────────────────────────────

/// Everything the arbiter needs from the device, as one `&mut` borrow.
pub trait Platform:
    RelayPort + Clock + DelayNs + WallClock + SessionPort + RemoteChannel + UpdaterPort + PowerPort
{
}

impl<T> Platform for T where
    T: RelayPort
        + Clock
        + DelayNs
        + WallClock
        + SessionPort
        + RemoteChannel
        + UpdaterPort
        + PowerPort
{
}
