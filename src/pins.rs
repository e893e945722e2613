//! GPIO / peripheral pin assignments for the PowerReset board.
//!
//! Single source of truth: the relay driver and the device binary
//! reference this module rather than hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Relay (drives the attached device's power line)
// ---------------------------------------------------------------------------

/// Digital output: LOW = relay energized (device unpowered), HIGH = released.
pub const RELAY_GPIO: i32 = 5;

// ---------------------------------------------------------------------------
// Status LED (on-board, active-low)
// ---------------------------------------------------------------------------

/// Digital output: LOW = lit ("pulse active"), HIGH = dark.
pub const STATUS_LED_GPIO: i32 = 2;

// ---------------------------------------------------------------------------
// Remote virtual pins
// ---------------------------------------------------------------------------

/// Virtual pin numbers on the control channel.
pub mod virtual_pins {
    /// Remote button (1 = pulse requested, 0 = reset acknowledgment).
    pub const BUTTON: u8 = 0;
    /// Remote terminal text.
    pub const TERMINAL: u8 = 1;
    pub const IP_ADDRESS: u8 = 2;
    pub const SIGNAL_STRENGTH: u8 = 3;
    pub const FIRMWARE_VERSION: u8 = 4;
}
