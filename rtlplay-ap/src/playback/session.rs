//! One playback session from negotiation to teardown

use crate::audio::driver::{AudioHost, Driver};
use crate::audio::negotiate::{negotiate, StreamConfig, StreamRequest};
use crate::audio::sample::Sample;
use crate::audio::stream::{AudioStream, StreamState};
use crate::error::Result;
use crate::playback::cancel::CancelToken;
use crate::playback::stream_loop::{run_loop, LoopStats};
use crate::rtlfm::frame::FrameReader;
use std::io::Read;
use tracing::{info, warn};

/// Negotiate and open a stream on `host`, then feed it from the byte
/// producer that `source` starts for the resolved config.
///
/// The producer is started only once the stream is running and is dropped
/// before the stream is torn down. The stream is stopped and closed on
/// every exit path; a teardown failure is returned only when the session
/// itself succeeded.
pub fn run_session<T, H, R, S>(
    host: &H,
    request: &StreamRequest,
    source: S,
    cancel: &CancelToken,
) -> Result<LoopStats>
where
    T: Sample,
    H: AudioHost,
    R: Read,
    S: FnOnce(&StreamConfig) -> Result<R>,
{
    let negotiated = negotiate(host, request)?;
    let config = negotiated.config;
    info!(
        "Negotiated {} output channel(s) at {} Hz, {} frames per buffer",
        config.output_channels, config.sample_rate, config.buffer_frames
    );

    let mut stream = AudioStream::<T, H::Channel<T>>::open(host, &negotiated)?;

    let result = stream_from(&mut stream, source, cancel);
    let teardown = teardown(&mut stream);

    match (result, teardown) {
        (Ok(stats), Ok(())) => {
            info!(
                "Session finished: {} frames, {} underflows",
                stats.frames, stats.underflows
            );
            Ok(stats)
        }
        (Ok(_), Err(e)) => Err(e),
        (Err(e), teardown) => {
            if let Err(te) = teardown {
                warn!("Stream teardown failed after error: {}", te);
            }
            Err(e)
        }
    }
}

fn stream_from<T, D, R, S>(
    stream: &mut AudioStream<T, D>,
    source: S,
    cancel: &CancelToken,
) -> Result<LoopStats>
where
    T: Sample,
    D: Driver<T>,
    R: Read,
    S: FnOnce(&StreamConfig) -> Result<R>,
{
    stream.start()?;
    let config = *stream.config();
    let mut reader = FrameReader::new(source(&config)?);
    run_loop(&mut reader, stream, cancel)
}

fn teardown<T: Sample, D: Driver<T>>(stream: &mut AudioStream<T, D>) -> Result<()> {
    let stopped = if stream.state() == StreamState::Started {
        stream.stop()
    } else {
        Ok(())
    };
    let closed = stream.close();
    stopped.and(closed)
}
