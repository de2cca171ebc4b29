//! Error types for rtlplay-ap
//!
//! Negotiation and open-time errors abort stream construction. The two
//! overflow variants are transient and never close a stream on their own.
//! Everything else raised while streaming ends the session.

use crate::audio::Direction;
use thiserror::Error;

/// Main error type for rtlplay-ap
#[derive(Error, Debug)]
pub enum Error {
    /// No device has the requested name
    #[error("Device not found: {0}")]
    NotFound(String),

    /// A device lacks the requested direction or a usable latency default
    #[error("{direction} device '{device}' {reason}")]
    DeviceCapability {
        direction: Direction,
        device: String,
        reason: String,
    },

    /// The driver rejected the negotiated configuration
    #[error("Failed to open audio stream: {0}")]
    DeviceOpenFailed(String),

    /// Captured samples were dropped because the consumer read too slowly
    #[error("input overflowed")]
    InputOverflowed,

    /// The playback buffer ran dry and the device produced silence
    #[error("output overflowed")]
    OutputOverflowed,

    /// Frame length does not match the stream's output buffer
    #[error("invalid frame size: expected {expected} samples, got {actual}")]
    InvalidFrameSize { expected: usize, actual: usize },

    /// Any other driver error during read/write/start/stop
    #[error("Audio stream error: {0}")]
    StreamIo(String),

    /// The byte producer closed in the middle of a frame
    #[error("short read: expected {expected} bytes, received {received}")]
    ShortRead { expected: usize, received: usize },

    /// Byte producer I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Operation not valid in the stream's current lifecycle state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Stream request failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Driver query failure (enumeration, capability lookup)
    #[error("Audio backend error: {0}")]
    Backend(String),

    /// Frequency string could not be parsed
    #[error("Invalid frequency: {0}")]
    InvalidFrequency(String),

    /// Demodulator process could not be spawned or controlled
    #[error("Failed to run {command}: {source}")]
    Command {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// True for the overflow/underflow conditions callers log and ignore.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::InputOverflowed | Error::OutputOverflowed)
    }
}

/// Convenience Result type using rtlplay-ap Error
pub type Result<T> = std::result::Result<T, Error>;
