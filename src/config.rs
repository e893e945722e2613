//! Device configuration parameters
//!
//! All tunable parameters for the power-cycle controller.  Credentials and
//! timings are provisioned as a JSON blob or taken from the defaults.

use heapless::String;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::power::SleepPolicy;

/// What the device does once a pulse has completed normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AfterPulse {
    /// Re-run the decision, which lands in deep sleep.
    Sleep,
    /// Stay awake servicing the poll loop for further commands.
    StayResident,
}

/// How the pulse duration is waited out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PulseWait {
    /// Tight loop inside the pulse, checking for preemption every
    /// `busy_wait_step_ms`.
    BusyWait,
    /// Completion scheduled on the one-shot timer queue; the outer loop
    /// keeps servicing events.
    TimerCallback,
}

/// Core device configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    // --- Network ---
    pub wifi_ssid: String<32>,
    pub wifi_password: String<64>,
    /// Control-channel broker, e.g. `mqtt://host:1883`.
    pub broker_url: String<64>,
    /// Topic namespace for this device's virtual pins and terminal.
    pub device_topic: String<32>,
    /// Control-channel auth token.
    pub auth_token: String<64>,

    // --- Pulse ---
    /// Relay energize time (milliseconds)
    pub pulse_duration_ms: u32,
    pub pulse_wait: PulseWait,
    /// Preemption check period for [`PulseWait::BusyWait`] (milliseconds)
    pub busy_wait_step_ms: u32,
    /// Pulse on every boot instead of sleeping when nothing is pending.
    pub pulse_on_boot: bool,
    pub after_pulse: AfterPulse,

    // --- Update ---
    /// Arbiter-side deadline for an update to report back (milliseconds)
    pub update_deadline_ms: u32,

    // --- Sleep ---
    /// Deep-sleep interval (seconds)
    pub sleep_interval_secs: u32,

    // --- Boot timing ---
    /// Maximum wait for the session to come up (milliseconds)
    pub connect_timeout_ms: u32,
    /// Time the session is serviced after requesting the button sync (milliseconds)
    pub button_sync_settle_ms: u32,
    /// Maximum wait for wall-clock sync (milliseconds)
    pub time_sync_timeout_ms: u32,

    // --- Console ---
    /// Offset applied to console timestamps (seconds east of UTC)
    pub utc_offset_secs: i32,
    pub firmware_version: String<16>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        let mut firmware_version = String::new();
        // Fits: the package version is far below 16 bytes.
        let _ = firmware_version.push_str(env!("CARGO_PKG_VERSION"));
        let mut broker_url = String::new();
        let _ = broker_url.push_str("mqtt://broker.local:1883");
        let mut device_topic = String::new();
        let _ = device_topic.push_str("powerreset");

        Self {
            wifi_ssid: String::new(),
            wifi_password: String::new(),
            broker_url,
            device_topic,
            auth_token: String::new(),

            pulse_duration_ms: 10_000, // 10 s
            pulse_wait: PulseWait::BusyWait,
            busy_wait_step_ms: 10,
            pulse_on_boot: false,
            after_pulse: AfterPulse::Sleep,

            update_deadline_ms: 30_000, // 30 s

            sleep_interval_secs: 15 * 60, // 15 min

            connect_timeout_ms: 5_000,
            button_sync_settle_ms: 2_000,
            time_sync_timeout_ms: 3_000,

            utc_offset_secs: 7_200, // CEST
            firmware_version,
        }
    }
}

impl DeviceConfig {
    /// Parse a provisioning blob and validate it.
    pub fn from_json(bytes: &[u8]) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_slice(bytes).map_err(|_| ConfigError::Corrupted)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject out-of-range values instead of clamping them.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pulse_duration_ms == 0 {
            return Err(ConfigError::ValidationFailed("pulse_duration_ms must be > 0"));
        }
        if self.busy_wait_step_ms == 0 || self.busy_wait_step_ms > self.pulse_duration_ms {
            return Err(ConfigError::ValidationFailed(
                "busy_wait_step_ms must be in 1..=pulse_duration_ms",
            ));
        }
        if self.update_deadline_ms == 0 {
            return Err(ConfigError::ValidationFailed("update_deadline_ms must be > 0"));
        }
        if self.sleep_interval_secs == 0 {
            return Err(ConfigError::ValidationFailed("sleep_interval_secs must be > 0"));
        }
        if self.device_topic.is_empty() || self.device_topic.contains(['#', '+']) {
            return Err(ConfigError::ValidationFailed(
                "device_topic must be non-empty and wildcard-free",
            ));
        }
        if self.utc_offset_secs.unsigned_abs() >= 86_400 {
            return Err(ConfigError::ValidationFailed("utc_offset_secs must be within one day"));
        }
        Ok(())
    }

    pub fn sleep_policy(&self) -> SleepPolicy {
        SleepPolicy {
            interval_secs: self.sleep_interval_secs,
        }
    }
}
