//! Deep-sleep entry.
//!
//! The only way out of a process lifetime short of a reboot.  The order
//! of the three steps below is part of the contract: operators must see
//! the terminal marker, and the radio must be down before the CPU is.
//!
//! ```text
//!  "sleeping" ──▶ flush ──▶ session teardown ──▶ radio settle ──▶ deep_sleep(interval)
//! ```

use core::time::Duration;

use embedded_hal::delay::DelayNs;
use log::info;

use crate::app::events::StatusEvent;
use crate::app::ports::{PowerPort, RemoteChannel, SessionPort, WallClock};
use crate::status::StatusReporter;

/// Pause between session teardown and power-down so the radio can
/// finish disassociating.
const RADIO_SETTLE_MS: u32 = 100;

/// Immutable low-power configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SleepPolicy {
    pub interval_secs: u32,
}

impl SleepPolicy {
    pub fn duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.interval_secs))
    }
}

/// Stateless service that puts the device to sleep.
#[derive(Debug, Clone, Copy)]
pub struct SleepScheduler {
    policy: SleepPolicy,
}

impl SleepScheduler {
    pub fn new(policy: SleepPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> SleepPolicy {
        self.policy
    }

    /// Marker, teardown, low-power primitive.  Does not return on hardware.
    pub fn enter_low_power<H>(&self, hw: &mut H, status: &StatusReporter)
    where
        H: RemoteChannel + WallClock + SessionPort + PowerPort + DelayNs,
    {
        status.report(hw, &StatusEvent::Sleeping);

        hw.disconnect();
        hw.delay_ms(RADIO_SETTLE_MS);

        info!("Power: deep sleep for {} s", self.policy.interval_secs);
        hw.deep_sleep(self.policy.duration());
    }
}
