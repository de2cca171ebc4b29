//! rtlplay audio player library
//!
//! Plays the raw sample stream of the rtl_fm demodulator on an audio
//! output device: device discovery and stream negotiation in [`audio`],
//! the demodulator process in [`rtlfm`], and the streaming loop in
//! [`playback`].

pub mod audio;
pub mod error;
pub mod playback;
pub mod rtlfm;

pub use error::{Error, Result};

/// Tracing targets whose output follows the configured log level
pub const LOG_TARGETS: &[&str] = &[
    "rtlplay",
    "rtlplay_ap",
    "rtlplay_common",
    rtlfm::process::LOG_TARGET,
];
