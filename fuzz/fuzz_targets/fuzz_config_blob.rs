//! Fuzz target: `DeviceConfig::from_json`
//!
//! Arbitrary provisioning blobs must either be rejected with a typed
//! error or produce a config that passes validation.
//!
//! cargo fuzz run fuzz_config_blob

#![no_main]

use libfuzzer_sys::fuzz_target;
use powerreset::config::DeviceConfig;

fuzz_target!(|data: &[u8]| {
    if let Ok(config) = DeviceConfig::from_json(data) {
        assert!(config.validate().is_ok());
        assert!(config.pulse_duration_ms > 0);
        assert!(config.busy_wait_step_ms <= config.pulse_duration_ms);
    }
});
