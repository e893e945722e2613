//! Timestamped status lines for the remote terminal.
//!
//! Every line has the form `[YYYY-MM-DD HH:MM:SS] - <event>` and is also
//! written to the local serial log, since the device keeps no log storage.

use chrono::{DateTime, FixedOffset, Offset, Utc};
use log::info;

use crate::app::events::StatusEvent;
use crate::app::ports::{RemoteChannel, WallClock};

/// Renders and publishes status lines.
#[derive(Debug, Clone, Copy)]
pub struct StatusReporter {
    offset: FixedOffset,
}

impl StatusReporter {
    /// `utc_offset_secs` outside ±1 day falls back to UTC.
    pub fn new(utc_offset_secs: i32) -> Self {
        let offset = FixedOffset::east_opt(utc_offset_secs).unwrap_or(Utc.fix());
        Self { offset }
    }

    /// `[YYYY-MM-DD HH:MM:SS]` for the given Unix time.  Before time sync
    /// the epoch is rendered.
    pub fn timestamp(&self, unix_time: Option<i64>) -> String {
        let utc = DateTime::<Utc>::from_timestamp(unix_time.unwrap_or(0), 0).unwrap_or_default();
        utc.with_timezone(&self.offset)
            .format("[%Y-%m-%d %H:%M:%S]")
            .to_string()
    }

    /// Full status line for `event`.
    pub fn line(&self, unix_time: Option<i64>, event: &StatusEvent) -> String {
        format!("{} - {}", self.timestamp(unix_time), event)
    }

    /// Write `event` to the remote terminal, flush, and mirror to the log.
    pub fn report(&self, hw: &mut (impl RemoteChannel + WallClock), event: &StatusEvent) {
        let line = self.line(hw.unix_time(), event);
        info!("{}", line);
        hw.console_write(&line);
        hw.console_flush();
    }

    /// Untimestamped terminal text (URL echo, unknown-command echo).
    pub fn echo(&self, hw: &mut impl RemoteChannel, text: &str) {
        info!("{}", text);
        hw.console_write(text);
        hw.console_flush();
    }
}
