//! System time adapter.
//!
//! Monotonic milliseconds, blocking delays and the wall clock used for
//! console timestamps.
//!
//! - **`target_os = "espidf"`**: monotonic time from the ESP-IDF
//!   high-resolution timer, delays on FreeRTOS, wall clock set by SNTP.
//! - **`not(target_os = "espidf")`**: `std::time::Instant` and
//!   `thread::sleep` for host-side simulation.

use embedded_hal::delay::DelayNs;
use log::info;

use crate::app::ports::{Clock, WallClock};

/// Anything earlier is an unsynced clock (2020-01-01T00:00:00Z).
const EPOCH_2020: i64 = 1_577_836_800;

pub struct SystemClock {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
    #[cfg(target_os = "espidf")]
    sntp: Option<esp_idf_svc::sntp::EspSntp<'static>>,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
            #[cfg(target_os = "espidf")]
            sntp: None,
        }
    }

    /// Start background wall-clock sync.  Failure leaves timestamps at the
    /// epoch; nothing else depends on it.
    #[cfg(target_os = "espidf")]
    pub fn start_time_sync(&mut self) {
        match esp_idf_svc::sntp::EspSntp::new_default() {
            Ok(sntp) => {
                info!("Time: SNTP started");
                self.sntp = Some(sntp);
            }
            Err(e) => log::warn!("Time: SNTP start failed: {:?}", e),
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn start_time_sync(&mut self) {
        info!("Time(sim): host clock assumed synced");
    }
}

impl Clock for SystemClock {
    #[cfg(target_os = "espidf")]
    fn now_ms(&self) -> u64 {
        // SAFETY: reads a monotonic hardware counter; no preconditions.
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64 / 1_000
    }

    #[cfg(not(target_os = "espidf"))]
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

impl DelayNs for SystemClock {
    #[cfg(target_os = "espidf")]
    fn delay_ns(&mut self, ns: u32) {
        esp_idf_svc::hal::delay::FreeRtos.delay_ns(ns);
    }

    #[cfg(not(target_os = "espidf"))]
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(std::time::Duration::from_nanos(u64::from(ns)));
    }
}

impl WallClock for SystemClock {
    fn unix_time(&self) -> Option<i64> {
        let secs = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .ok()?
            .as_secs() as i64;
        (secs >= EPOCH_2020).then_some(secs)
    }
}
