//! Hardware channel abstraction
//!
//! [`Driver`] is the blocking per-buffer interface [`AudioStream`] drives.
//! [`AudioHost`] is the catalog that can also open one. The cpal-backed
//! implementation lives in `cpal_host`; tests substitute scripted drivers.
//!
//! Dropping a driver closes the hardware channel.
//!
//! [`AudioStream`]: crate::audio::stream::AudioStream

use crate::audio::device::DeviceCatalog;
use crate::audio::negotiate::Negotiated;
use crate::audio::sample::Sample;
use thiserror::Error;

/// Errors reported by a driver
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// Capture ring wrapped; samples were lost before this read
    #[error("input overflowed")]
    InputOverflowed,

    /// Playback ran dry since the previous write
    #[error("output underflowed")]
    OutputUnderflowed,

    #[error("{0}")]
    Other(String),
}

/// Blocking access to one opened hardware channel.
///
/// `read` and `write` block for at most about one buffer period while the
/// device is running. An overflow report from `read` still leaves `buf`
/// filled with the captured samples.
pub trait Driver<T: Sample> {
    fn start(&mut self) -> Result<(), DriverError>;

    fn stop(&mut self) -> Result<(), DriverError>;

    /// Fill `buf` with one buffer of interleaved input samples.
    fn read(&mut self, buf: &mut [T]) -> Result<(), DriverError>;

    /// Submit one buffer of interleaved output samples.
    fn write(&mut self, buf: &[T]) -> Result<(), DriverError>;
}

/// A device catalog that can open hardware channels
pub trait AudioHost: DeviceCatalog {
    type Channel<T: Sample>: Driver<T>;

    /// Open a channel with the negotiated parameters. The channel starts
    /// stopped.
    fn open_channel<T: Sample>(&self, negotiated: &Negotiated)
        -> Result<Self::Channel<T>, DriverError>;
}
