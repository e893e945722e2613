//! Unified error types for the PowerReset firmware.
//!
//! A single `Error` enum that every subsystem can convert into.  None of
//! these ever escape the arbiter: each one resolves to a defined mode and a
//! console line.  They exist so adapters and the binary can report failures
//! with a typed reason.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Session not established or dropped.
    Network(ConnectivityError),
    /// Firmware fetch/flash failed or timed out.
    Update(UpdateError),
    /// Configuration is invalid.
    Config(ConfigError),
    /// Console line was not a recognised command.
    Console(ConsoleError),
    /// One-shot timer queue rejected a registration.
    Timer(TimerError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(e) => write!(f, "network: {e}"),
            Self::Update(e) => write!(f, "update: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Console(e) => write!(f, "console: {e}"),
            Self::Timer(e) => write!(f, "timer: {e}"),
        }
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// Connectivity errors (transient, retried by bounded waiting)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityError {
    NoCredentials,
    InvalidSsid,
    InvalidPassword,
    ConnectionFailed,
    AlreadyConnected,
    /// Session did not come up inside the boot window.
    ConnectTimeout,
}

impl fmt::Display for ConnectivityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no WiFi credentials configured"),
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => {
                write!(f, "password invalid (must be 8-64 bytes for WPA2, or empty for open)")
            }
            Self::ConnectionFailed => write!(f, "WiFi connection failed"),
            Self::AlreadyConnected => write!(f, "already connected to AP"),
            Self::ConnectTimeout => write!(f, "session not established before timeout"),
        }
    }
}

impl From<ConnectivityError> for Error {
    fn from(e: ConnectivityError) -> Self {
        Self::Network(e)
    }
}

// ---------------------------------------------------------------------------
// Update errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateError {
    /// Updater reported a failure; the string is its own reason text.
    Failed(String),
    /// Arbiter stopped waiting on its own deadline.
    Timeout,
}

impl fmt::Display for UpdateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(reason) => write!(f, "update failed: {reason}"),
            Self::Timeout => write!(f, "update timed out"),
        }
    }
}

impl UpdateError {
    /// Text shown after `OTA FAILED: ` on the console.
    pub fn into_reason(self) -> String {
        match self {
            Self::Failed(reason) => reason,
            Self::Timeout => self.to_string(),
        }
    }
}

impl From<UpdateError> for Error {
    fn from(e: UpdateError) -> Self {
        Self::Update(e)
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A field failed range validation.  The string names the field.
    ValidationFailed(&'static str),
    /// Stored blob could not be parsed.
    Corrupted,
    /// Non-volatile storage could not be opened, read or written.
    IoError,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ValidationFailed(msg) => write!(f, "validation failed: {msg}"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::IoError => write!(f, "config storage I/O error"),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Console errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleError {
    UnknownCommand(String),
}

impl fmt::Display for ConsoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownCommand(cmd) => write!(f, "Unknown command: {cmd}"),
        }
    }
}

impl From<ConsoleError> for Error {
    fn from(e: ConsoleError) -> Self {
        Self::Console(e)
    }
}

// ---------------------------------------------------------------------------
// Timer errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerError {
    /// Every slot in the one-shot queue is occupied.
    QueueFull,
}

impl fmt::Display for TimerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QueueFull => write!(f, "one-shot timer queue full"),
        }
    }
}

impl From<TimerError> for Error {
    fn from(e: TimerError) -> Self {
        Self::Timer(e)
    }
}
