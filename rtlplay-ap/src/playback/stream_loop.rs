//! Producer to device streaming loop
//!
//! Each iteration checks for cancellation, reads one output frame of
//! samples from the byte producer and writes it to the stream. Output
//! underflow is counted and ignored; any other error ends the loop.

use crate::audio::driver::Driver;
use crate::audio::sample::Sample;
use crate::audio::stream::AudioStream;
use crate::error::{Error, Result};
use crate::playback::cancel::CancelToken;
use crate::rtlfm::frame::FrameReader;
use std::io::Read;
use tracing::{debug, trace, warn};

/// Counters from one run of [`run_loop`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    /// Frames written to the stream
    pub frames: u64,
    /// Writes that reported an output underflow
    pub underflows: u64,
}

/// Stream frames from `reader` into `stream` until cancelled.
///
/// `stream` must already be started. Returns the counters on cancellation;
/// a fatal error discards them.
pub fn run_loop<T, R, D>(
    reader: &mut FrameReader<R>,
    stream: &mut AudioStream<T, D>,
    cancel: &CancelToken,
) -> Result<LoopStats>
where
    T: Sample,
    R: Read,
    D: Driver<T>,
{
    let mut frame = vec![T::default(); stream.output_frame_len()];
    let mut stats = LoopStats::default();

    debug!("Streaming {} samples per frame", frame.len());

    while !cancel.is_cancelled() {
        reader.read_frame(&mut frame)?;

        match stream.write(&frame) {
            Ok(()) => {}
            Err(Error::OutputOverflowed) => {
                stats.underflows += 1;
                if stats.underflows == 1 || stats.underflows % 1000 == 0 {
                    warn!("Audio output underflow (total: {})", stats.underflows);
                }
            }
            Err(e) => return Err(e),
        }

        stats.frames += 1;
        trace!("Wrote frame {}", stats.frames);
    }

    debug!(
        "Streaming loop cancelled after {} frames ({} underflows)",
        stats.frames, stats.underflows
    );
    Ok(stats)
}
