//! PowerReset firmware library.
//!
//! Exposes the arbiter and its ports for integration testing.  All
//! ESP-IDF-specific code is guarded by `#[cfg(target_os = "espidf")]`
//! within each adapter; host builds get simulation stubs.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod arbiter;
pub mod button;
pub mod clock;
pub mod config;
pub mod drivers;
pub mod error;
pub mod pins;
pub mod power;
pub mod status;
