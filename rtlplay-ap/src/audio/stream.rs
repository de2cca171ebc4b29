//! Open audio stream
//!
//! Owns one hardware channel plus the input and output scratch buffers
//! sized from the negotiated config.
//!
//! ```text
//! Opened --start--> Started --stop--> Stopped --start--> Started ...
//! {Opened, Started, Stopped} --close--> Closed
//! ```
//!
//! `read`/`write` are only valid while Started. Overflow on read and
//! underflow on write are reported but leave the stream running.
//! The stream is single-reader, single-writer: it is `&mut self` throughout.

use crate::audio::device::Direction;
use crate::audio::driver::{AudioHost, Driver, DriverError};
use crate::audio::negotiate::{Negotiated, StreamConfig};
use crate::audio::pool::{Frame, FramePool};
use crate::audio::sample::Sample;
use crate::error::{Error, Result};
use tracing::{debug, info, warn};

/// Lifecycle state of an [`AudioStream`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Opened,
    Started,
    Stopped,
    Closed,
}

/// One captured input buffer.
///
/// When the driver reported an overflow the frame still holds the samples
/// it captured; `status()` surfaces the condition as
/// [`Error::InputOverflowed`].
#[derive(Debug)]
pub struct Captured<T: Sample> {
    frame: Frame<T>,
    overflowed: bool,
}

impl<T: Sample> Captured<T> {
    pub fn frame(&self) -> &Frame<T> {
        &self.frame
    }

    pub fn into_frame(self) -> Frame<T> {
        self.frame
    }

    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    pub fn status(&self) -> Result<()> {
        if self.overflowed {
            Err(Error::InputOverflowed)
        } else {
            Ok(())
        }
    }
}

/// Half- or full-duplex stream over a [`Driver`]
pub struct AudioStream<T: Sample, D: Driver<T>> {
    driver: Option<D>,
    config: StreamConfig,
    state: StreamState,
    input_scratch: Vec<T>,
    output_scratch: Vec<T>,
    pool: Option<FramePool<T>>,
}

impl<T: Sample, D: Driver<T>> AudioStream<T, D> {
    /// Open the hardware channel for a negotiated configuration.
    pub fn open<H>(host: &H, negotiated: &Negotiated) -> Result<Self>
    where
        H: AudioHost<Channel<T> = D>,
    {
        negotiated.config.check()?;
        let driver = host
            .open_channel::<T>(negotiated)
            .map_err(|e| Error::DeviceOpenFailed(e.to_string()))?;
        Self::from_driver(driver, negotiated.config)
    }

    /// Wrap an already-opened channel.
    pub fn from_driver(driver: D, config: StreamConfig) -> Result<Self> {
        config.check()?;
        let input_len = config.frame_len(Direction::Input);
        let output_len = config.frame_len(Direction::Output);

        debug!(
            "Opened {} stream: {} input samples, {} output samples per buffer",
            T::FORMAT,
            input_len,
            output_len
        );

        Ok(Self {
            driver: Some(driver),
            config,
            state: StreamState::Opened,
            input_scratch: vec![T::default(); input_len],
            output_scratch: vec![T::default(); output_len],
            pool: (input_len > 0).then(|| FramePool::new(input_len)),
        })
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Pool serving frames returned by `read` (None without input)
    pub fn frame_pool(&self) -> Option<&FramePool<T>> {
        self.pool.as_ref()
    }

    /// Samples per output frame (0 without output)
    pub fn output_frame_len(&self) -> usize {
        self.config.frame_len(Direction::Output)
    }

    /// Samples per input frame (0 without input)
    pub fn input_frame_len(&self) -> usize {
        self.config.frame_len(Direction::Input)
    }

    pub fn start(&mut self) -> Result<()> {
        match self.state {
            StreamState::Opened | StreamState::Stopped => {}
            state => {
                return Err(Error::InvalidState(format!(
                    "cannot start a stream that is {:?}",
                    state
                )))
            }
        }

        info!("Starting audio stream");
        self.driver_mut()?
            .start()
            .map_err(|e| Error::StreamIo(format!("failed to start audio stream: {}", e)))?;
        self.state = StreamState::Started;
        Ok(())
    }

    pub fn stop(&mut self) -> Result<()> {
        if self.state != StreamState::Started {
            return Err(Error::InvalidState(format!(
                "cannot stop a stream that is {:?}",
                self.state
            )));
        }

        info!("Stopping audio stream");
        self.driver_mut()?
            .stop()
            .map_err(|e| Error::StreamIo(format!("failed to stop audio stream: {}", e)))?;
        self.state = StreamState::Stopped;
        Ok(())
    }

    /// Block until one input buffer is captured and return a pooled copy.
    pub fn read(&mut self) -> Result<Captured<T>> {
        self.require_started("read")?;

        let pool = self
            .pool
            .as_ref()
            .ok_or_else(|| Error::InvalidState("stream has no input direction".to_string()))?;
        let driver = self
            .driver
            .as_mut()
            .ok_or_else(|| Error::InvalidState("stream is closed".to_string()))?;

        let overflowed = match driver.read(&mut self.input_scratch) {
            Ok(()) => false,
            Err(DriverError::InputOverflowed) => {
                debug!("Input overflowed");
                true
            }
            Err(e) => return Err(Error::StreamIo(format!("failed to read input stream: {}", e))),
        };

        let mut frame = pool.acquire();
        frame.copy_from_slice(&self.input_scratch);
        Ok(Captured { frame, overflowed })
    }

    /// Submit one output buffer.
    ///
    /// `frame.len()` must equal [`output_frame_len`](Self::output_frame_len);
    /// a mismatch fails before the driver is touched.
    pub fn write(&mut self, frame: &[T]) -> Result<()> {
        let expected = self.output_frame_len();
        if expected == 0 {
            return Err(Error::InvalidState(
                "stream has no output direction".to_string(),
            ));
        }
        if frame.len() != expected {
            return Err(Error::InvalidFrameSize {
                expected,
                actual: frame.len(),
            });
        }
        self.require_started("write")?;

        let driver = self
            .driver
            .as_mut()
            .ok_or_else(|| Error::InvalidState("stream is closed".to_string()))?;

        self.output_scratch.copy_from_slice(frame);
        match driver.write(&self.output_scratch) {
            Ok(()) => Ok(()),
            Err(DriverError::OutputUnderflowed) => Err(Error::OutputOverflowed),
            Err(e) => Err(Error::StreamIo(format!("failed to write output stream: {}", e))),
        }
    }

    /// Release the hardware channel and scratch buffers.
    ///
    /// A started stream is stopped first. Closing twice fails.
    pub fn close(&mut self) -> Result<()> {
        if self.state == StreamState::Closed {
            return Err(Error::InvalidState("stream is already closed".to_string()));
        }

        if self.state == StreamState::Started {
            if let Err(e) = self.stop() {
                warn!("Failed to stop stream during close: {}", e);
            }
        }

        info!("Closing audio stream");
        self.driver = None;
        self.input_scratch = Vec::new();
        self.output_scratch = Vec::new();
        self.pool = None;
        self.state = StreamState::Closed;
        Ok(())
    }

    fn require_started(&self, op: &str) -> Result<()> {
        if self.state == StreamState::Started {
            Ok(())
        } else {
            Err(Error::InvalidState(format!(
                "cannot {} a stream that is {:?}",
                op, self.state
            )))
        }
    }

    fn driver_mut(&mut self) -> Result<&mut D> {
        self.driver
            .as_mut()
            .ok_or_else(|| Error::InvalidState("stream is closed".to_string()))
    }
}

impl<T: Sample, D: Driver<T>> Drop for AudioStream<T, D> {
    fn drop(&mut self) {
        if self.state != StreamState::Closed {
            let _ = self.close();
        }
    }
}
