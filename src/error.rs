//! Unified error types for the ride control computer.
//!
//! One enum per subsystem, each convertible into the top-level [`Error`] so
//! the binary's composition code can use `?` uniformly.  None of these are
//! safety signals: safety-relevant conditions travel through
//! [`SafetyFault`](crate::safety::SafetyFault) and always end in a state
//! transition.  The errors here either stop the process before the loop
//! starts (configuration) or are logged and absorbed at the port boundary.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation outside the tick path funnels into this type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("config: {0}")]
    Config(#[from] ConfigError),
    #[error("motor: {0}")]
    Motor(#[from] MotorError),
    #[error("control panel: {0}")]
    Panel(#[from] PanelError),
    #[error("theming: {0}")]
    Theming(#[from] ThemingError),
    #[error("status sink: {0}")]
    Sink(#[from] SinkError),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Rejected or unreadable configuration.  Always fatal, always raised before
/// the first tick.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value for `{field}`: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

impl ConfigError {
    pub(crate) const fn invalid(field: &'static str, reason: &'static str) -> Self {
        Self::Invalid { field, reason }
    }
}

// ---------------------------------------------------------------------------
// Motor controller errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum MotorError {
    /// Serial read/write failed or timed out.
    #[error("serial I/O: {0}")]
    Io(#[from] std::io::Error),
    /// Response checksum mismatch.
    #[error("CRC mismatch: computed {computed:#06x}, received {received:#06x}")]
    Crc { computed: u16, received: u16 },
    /// Write was not acknowledged with 0xFF.
    #[error("command not acknowledged (got {0:#04x})")]
    Nack(u8),
    /// Fewer bytes than the frame requires arrived before the timeout.
    #[error("short response: expected {expected} bytes, got {got}")]
    ShortResponse { expected: usize, got: usize },
    /// Command rejected before it reached the wire.
    #[error("command rejected: {0}")]
    Rejected(&'static str),
    /// The adapter is scripted to refuse commands (mock only).
    #[error("controller offline")]
    Offline,
}

// ---------------------------------------------------------------------------
// Control panel errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum PanelError {
    /// A GPIO line could not be read.
    #[error("input `{line}` unreadable: {reason}")]
    InputRead { line: &'static str, reason: String },
}

// ---------------------------------------------------------------------------
// Theming errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ThemingError {
    #[error("output `{line}` write failed: {reason}")]
    OutputWrite { line: &'static str, reason: String },
}

// ---------------------------------------------------------------------------
// Status sink errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("encode: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("write: {0}")]
    Io(#[from] std::io::Error),
    #[error("sink closed")]
    Closed,
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
