//! error.rs
//! Error types shared by the sender and receiver sides.
//!
//! Transport failures are split in two classes: `Timeout` is an expected outcome the
//! broadcast scheduler swallows, everything else stops the scheduler.

use thiserror::Error;

/// Failures reported by a broadcast transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The call did not complete within its bounded latency.
    #[error("transport call timed out")]
    Timeout,

    /// The broadcast control path is missing or refused the request.
    #[error("broadcast control path unavailable: {0}")]
    Unavailable(String),

    /// Advertisement would not fit the channel's maximum size.
    #[error("advertisement of {size} bytes exceeds maximum {max}")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("transport I/O error: {0}")]
    Io(std::io::Error),
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout)
    }
}

impl From<std::io::Error> for TransportError {
    // Socket timeouts surface as WouldBlock on unix and TimedOut on windows.
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut => TransportError::Timeout,
            _ => TransportError::Io(err),
        }
    }
}

/// Top-level error for binaries and long-running components.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("CSV export error: {0}")]
    Csv(#[from] csv::Error),

    /// Scheduler lifecycle misuse or a tick thread that could not be joined.
    #[error("scheduler error: {0}")]
    Scheduler(String),
}

pub type Result<T> = std::result::Result<T, TelemetryError>;
