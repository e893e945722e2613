//! Application boundary: events, commands and port traits.
//!
//! The arbiter in [`crate::arbiter`] holds all decision logic.  Everything
//! it touches in the outside world goes through the **port traits** in
//! [`ports`], keeping the core testable without a radio or a relay.

pub mod commands;
pub mod events;
pub mod ports;
