//! Deep sleep and software restart.
//!
//! Implements [`PowerPort`].  On the device neither call returns: deep
//! sleep ends in a cold boot through the timer wakeup, and restart jumps
//! straight back into the bootloader.  The simulation records the request
//! and returns so host runs can observe it.

use core::time::Duration;

use log::info;

use crate::app::ports::PowerPort;

#[derive(Debug, Default)]
pub struct SystemPower {
    #[cfg(not(target_os = "espidf"))]
    sim_sleeps: Vec<Duration>,
    #[cfg(not(target_os = "espidf"))]
    sim_restarts: u32,
}

impl SystemPower {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulation: every deep-sleep request so far.
    #[cfg(not(target_os = "espidf"))]
    pub fn sleeps(&self) -> &[Duration] {
        &self.sim_sleeps
    }

    /// Simulation: number of restart requests so far.
    #[cfg(not(target_os = "espidf"))]
    pub fn restarts(&self) -> u32 {
        self.sim_restarts
    }
}

impl PowerPort for SystemPower {
    #[cfg(target_os = "espidf")]
    fn deep_sleep(&mut self, duration: Duration) {
        info!("Power: entering deep sleep for {:?}", duration);
        // SAFETY: no preconditions; the call does not return.
        unsafe { esp_idf_svc::sys::esp_deep_sleep(duration.as_micros() as u64) }
    }

    #[cfg(not(target_os = "espidf"))]
    fn deep_sleep(&mut self, duration: Duration) {
        info!("Power(sim): deep sleep for {:?}", duration);
        self.sim_sleeps.push(duration);
    }

    #[cfg(target_os = "espidf")]
    fn restart(&mut self) {
        info!("Power: restarting");
        esp_ota::restart();
    }

    #[cfg(not(target_os = "espidf"))]
    fn restart(&mut self) {
        info!("Power(sim): restart");
        self.sim_restarts += 1;
    }
}
