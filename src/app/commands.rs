//! Remote terminal commands.
//!
//! One free-text line comes in; it is either a restart request or
//! something the device does not understand.

use crate::error::ConsoleError;

/// Commands recognised on the remote terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// `reset` or `restart`, any case.
    Restart,
}

impl ConsoleCommand {
    /// Parse a terminal line.  Surrounding whitespace is ignored.
    pub fn parse(line: &str) -> Result<Self, ConsoleError> {
        let cmd = line.trim();
        if cmd.eq_ignore_ascii_case("reset") || cmd.eq_ignore_ascii_case("restart") {
            Ok(Self::Restart)
        } else {
            Err(ConsoleError::UnknownCommand(cmd.to_string()))
        }
    }
}
