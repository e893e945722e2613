//! Power-cut relay with status indicator.
//!
//! Two digital outputs move together: the relay coil that interrupts the
//! attached device's supply, and the status LED.  Both boards in the field
//! wire them active-low.
//!
//! ## Fail-safe contract
//!
//! The released level is the GPIO power-on level.  The driver releases
//! on construction, so a reset with no arbiter running leaves the attached
//! device powered.
//!
//! Pin write errors are logged and otherwise ignored; the logical state
//! always follows the requested level.

use embedded_hal::digital::OutputPin;
use log::warn;

use crate::app::ports::RelayPort;

/// Electrical level that energizes an output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    ActiveLow,
    ActiveHigh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Released,
    Energized,
}

pub struct RelayDriver<RELAY, LED> {
    relay: RELAY,
    led: LED,
    polarity: Polarity,
    state: RelayState,
}

impl<RELAY: OutputPin, LED: OutputPin> RelayDriver<RELAY, LED> {
    /// Take ownership of the pins and drive them to the released level.
    pub fn new(relay: RELAY, led: LED, polarity: Polarity) -> Self {
        let mut driver = Self {
            relay,
            led,
            polarity,
            state: RelayState::Released,
        };
        driver.drive(false);
        driver
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    fn drive(&mut self, energized: bool) {
        let high = match self.polarity {
            Polarity::ActiveLow => !energized,
            Polarity::ActiveHigh => energized,
        };
        if let Err(e) = self.relay.set_state(high.into()) {
            warn!("Relay: pin write failed: {:?}", e);
        }
        if let Err(e) = self.led.set_state(high.into()) {
            warn!("Relay: LED write failed: {:?}", e);
        }
        self.state = if energized {
            RelayState::Energized
        } else {
            RelayState::Released
        };
    }
}

impl<RELAY: OutputPin, LED: OutputPin> RelayPort for RelayDriver<RELAY, LED> {
    fn energize(&mut self) {
        self.drive(true);
    }

    fn release(&mut self) {
        self.drive(false);
    }

    fn is_energized(&self) -> bool {
        self.state == RelayState::Energized
    }
}
