//! Audio host using cpal
//!
//! cpal is callback driven. The blocking [`Driver`] interface is layered on
//! top with one lock-free ring per direction:
//!
//! - Playback: `write` pushes into the ring, the output callback drains it.
//!   A callback that finds the ring short (after the first write) fills the
//!   gap with silence and flags an underflow for the next `write`.
//! - Capture: the input callback fills the ring, `read` drains it. A
//!   callback that finds the ring full drops samples and flags an overflow
//!   for the next `read`.
//!
//! Blocking calls poll the ring at a fraction of the buffer period. A device
//! that makes no progress for [`STALL_TIMEOUT`] turns into an error instead
//! of blocking forever. Errors reported by cpal's error callback are latched
//! and returned by the next read/write.

use crate::audio::device::{Device, DeviceCatalog, Direction};
use crate::audio::driver::{AudioHost, Driver, DriverError};
use crate::audio::negotiate::Negotiated;
use crate::audio::sample::Sample;
use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, BuildStreamError, SupportedBufferSize, SupportedStreamConfig};
use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Used when the backend does not report a buffer size range
const FALLBACK_LOW_LATENCY: Duration = Duration::from_millis(10);
const FALLBACK_HIGH_LATENCY: Duration = Duration::from_millis(40);

/// Ring capacity in buffers
const PLAYBACK_PERIODS: usize = 2;
const CAPTURE_PERIODS: usize = 4;

/// No ring progress for this long means the device is gone
const STALL_TIMEOUT: Duration = Duration::from_secs(2);

const MIN_POLL: Duration = Duration::from_millis(1);
const MAX_POLL: Duration = Duration::from_millis(10);

type FaultSlot = Arc<Mutex<Option<String>>>;

/// Device catalog and channel factory over the default cpal host
pub struct CpalHost {
    host: cpal::Host,
}

impl CpalHost {
    pub fn new() -> Self {
        Self::from_host(cpal::default_host())
    }

    pub fn from_host(host: cpal::Host) -> Self {
        debug!("Using audio host {}", host.id().name());
        Self { host }
    }

    fn find_device(&self, name: &str) -> std::result::Result<cpal::Device, DriverError> {
        self.host
            .devices()
            .map_err(|e| DriverError::Other(format!("failed to enumerate devices: {}", e)))?
            .find(|d| d.name().ok().as_deref() == Some(name))
            .ok_or_else(|| DriverError::Other(format!("device '{}' is no longer available", name)))
    }

    fn describe_default(&self, device: Option<cpal::Device>, what: &str) -> Result<Device> {
        let device = device.ok_or_else(|| Error::NotFound(format!("default {} device", what)))?;
        describe(&device)
            .ok_or_else(|| Error::Backend(format!("default {} device could not be queried", what)))
    }
}

impl Default for CpalHost {
    fn default() -> Self {
        Self::new()
    }
}

fn max_channels<I, E>(configs: std::result::Result<I, E>) -> u16
where
    I: Iterator<Item = cpal::SupportedStreamConfigRange>,
{
    configs
        .map(|it| it.map(|c| c.channels()).max().unwrap_or(0))
        .unwrap_or(0)
}

fn frames_to_duration(frames: u32, rate: u32) -> Duration {
    Duration::from_secs_f64(frames as f64 / rate as f64)
}

/// Frames per callback to plan for when the device picks its own buffer
/// size: the top of its reported range, at most one second.
fn default_callback_frames(buffer_size: Option<&SupportedBufferSize>, rate: u32) -> u32 {
    let one_second = rate.max(1);
    match buffer_size {
        Some(SupportedBufferSize::Range { max, .. }) if *max > 0 => (*max).min(one_second),
        _ => one_second,
    }
}

/// Ring capacity in samples for a stream built with `buffer_size`
fn ring_capacity(channels: u16, buffer_size: &BufferSize, default_frames: u32, periods: usize) -> usize {
    let frames = match buffer_size {
        BufferSize::Fixed(frames) => *frames,
        BufferSize::Default => default_frames,
    };
    (channels as usize)
        .saturating_mul(frames.max(1) as usize)
        .saturating_mul(periods)
}

/// Low/high latency tiers from a default config's buffer size range
fn latency_tiers(channels: u16, config: Option<&SupportedStreamConfig>) -> (Duration, Duration) {
    if channels == 0 {
        return (Duration::ZERO, Duration::ZERO);
    }
    match config.map(|c| (c.buffer_size(), c.sample_rate().0)) {
        Some((SupportedBufferSize::Range { min, max }, rate)) if rate > 0 && *max > 0 => {
            let low = frames_to_duration((*min).max(1), rate);
            let high = frames_to_duration(*max, rate).max(low);
            (low, high)
        }
        _ => (FALLBACK_LOW_LATENCY, FALLBACK_HIGH_LATENCY),
    }
}

/// Capability snapshot of a cpal device. None when it has no name.
fn describe(device: &cpal::Device) -> Option<Device> {
    let name = device.name().ok()?;
    let max_input_channels = max_channels(device.supported_input_configs());
    let max_output_channels = max_channels(device.supported_output_configs());

    let input_config = device.default_input_config().ok();
    let output_config = device.default_output_config().ok();

    let (default_low_input_latency, default_high_input_latency) =
        latency_tiers(max_input_channels, input_config.as_ref());
    let (default_low_output_latency, default_high_output_latency) =
        latency_tiers(max_output_channels, output_config.as_ref());

    let default_sample_rate = output_config
        .as_ref()
        .filter(|_| max_output_channels > 0)
        .or(input_config.as_ref())
        .map_or(0.0, |c| c.sample_rate().0 as f64);

    Some(Device {
        name,
        max_input_channels,
        max_output_channels,
        default_low_input_latency,
        default_high_input_latency,
        default_low_output_latency,
        default_high_output_latency,
        default_sample_rate,
    })
}

impl DeviceCatalog for CpalHost {
    fn devices(&self) -> Result<Vec<Device>> {
        let devices: Vec<Device> = self
            .host
            .devices()
            .map_err(|e| Error::Backend(format!("Failed to enumerate devices: {}", e)))?
            .filter_map(|d| describe(&d))
            .collect();

        debug!("Found {} audio devices", devices.len());
        Ok(devices)
    }

    fn default_input_device(&self) -> Result<Device> {
        self.describe_default(self.host.default_input_device(), "input")
    }

    fn default_output_device(&self) -> Result<Device> {
        self.describe_default(self.host.default_output_device(), "output")
    }
}

fn fault_callback(fault: FaultSlot) -> impl FnMut(cpal::StreamError) + Send + 'static {
    move |err| {
        error!("Audio stream error: {}", err);
        *fault.lock().unwrap_or_else(PoisonError::into_inner) = Some(err.to_string());
    }
}

/// Build a stream with a fixed buffer size, falling back to the device
/// default when the fixed size is rejected.
fn build_with_fallback<S>(
    mut build: impl FnMut(BufferSize) -> std::result::Result<S, BuildStreamError>,
    frames: u32,
    direction: Direction,
) -> std::result::Result<S, DriverError> {
    match build(BufferSize::Fixed(frames)) {
        Err(BuildStreamError::StreamConfigNotSupported) => {
            warn!(
                "Device rejected a fixed {} buffer of {} frames, using its default buffer size",
                direction, frames
            );
            build(BufferSize::Default)
        }
        other => other,
    }
    .map_err(|e| DriverError::Other(e.to_string()))
}

struct PlaybackHalf<N> {
    stream: cpal::Stream,
    producer: HeapProd<N>,
    scratch: Vec<N>,
    underflowed: Arc<AtomicBool>,
    primed: Arc<AtomicBool>,
}

struct CaptureHalf<N> {
    stream: cpal::Stream,
    consumer: HeapCons<N>,
    scratch: Vec<N>,
    overflowed: Arc<AtomicBool>,
}

/// Blocking channel over one or two cpal streams
pub struct CpalChannel<T: Sample> {
    input: Option<CaptureHalf<T::Native>>,
    output: Option<PlaybackHalf<T::Native>>,
    fault: FaultSlot,
    poll: Duration,
    _sample: PhantomData<T>,
}

impl<T: Sample> CpalChannel<T> {
    fn check_fault(fault: &FaultSlot) -> std::result::Result<(), DriverError> {
        match fault.lock().unwrap_or_else(PoisonError::into_inner).take() {
            Some(message) => Err(DriverError::Other(message)),
            None => Ok(()),
        }
    }

    fn for_each_stream(
        &self,
        mut op: impl FnMut(&cpal::Stream) -> std::result::Result<(), String>,
    ) -> std::result::Result<(), DriverError> {
        let streams = self
            .input
            .iter()
            .map(|h| &h.stream)
            .chain(self.output.iter().map(|h| &h.stream));
        for stream in streams {
            op(stream).map_err(DriverError::Other)?;
        }
        Ok(())
    }
}

impl<T: Sample> Driver<T> for CpalChannel<T> {
    fn start(&mut self) -> std::result::Result<(), DriverError> {
        Self::check_fault(&self.fault)?;
        self.for_each_stream(|s| s.play().map_err(|e| e.to_string()))
    }

    fn stop(&mut self) -> std::result::Result<(), DriverError> {
        self.for_each_stream(|s| s.pause().map_err(|e| e.to_string()))?;
        if let Some(output) = &self.output {
            output.primed.store(false, Ordering::Release);
            output.underflowed.store(false, Ordering::Release);
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [T]) -> std::result::Result<(), DriverError> {
        let poll = self.poll;
        let fault = &self.fault;
        let half = self
            .input
            .as_mut()
            .ok_or_else(|| DriverError::Other("channel has no input".to_string()))?;

        half.scratch
            .resize(buf.len(), <T::Native as cpal::Sample>::EQUILIBRIUM);

        let mut offset = 0;
        let mut deadline = Instant::now() + STALL_TIMEOUT;
        while offset < half.scratch.len() {
            Self::check_fault(fault)?;
            let popped = half.consumer.pop_slice(&mut half.scratch[offset..]);
            if popped > 0 {
                offset += popped;
                deadline = Instant::now() + STALL_TIMEOUT;
            } else if Instant::now() >= deadline {
                return Err(DriverError::Other(
                    "input device stopped delivering samples".to_string(),
                ));
            } else {
                thread::sleep(poll);
            }
        }

        for (out, native) in buf.iter_mut().zip(&half.scratch) {
            *out = T::from_native(*native);
        }

        if half.overflowed.swap(false, Ordering::AcqRel) {
            return Err(DriverError::InputOverflowed);
        }
        Ok(())
    }

    fn write(&mut self, buf: &[T]) -> std::result::Result<(), DriverError> {
        let poll = self.poll;
        let fault = &self.fault;
        let half = self
            .output
            .as_mut()
            .ok_or_else(|| DriverError::Other("channel has no output".to_string()))?;

        half.scratch.clear();
        half.scratch.extend(buf.iter().map(|s| s.to_native()));

        let mut offset = 0;
        let mut deadline = Instant::now() + STALL_TIMEOUT;
        while offset < half.scratch.len() {
            Self::check_fault(fault)?;
            let pushed = half.producer.push_slice(&half.scratch[offset..]);
            if pushed > 0 {
                offset += pushed;
                deadline = Instant::now() + STALL_TIMEOUT;
            } else if Instant::now() >= deadline {
                return Err(DriverError::Other(
                    "output device stopped consuming samples".to_string(),
                ));
            } else {
                thread::sleep(poll);
            }
        }
        half.primed.store(true, Ordering::Release);

        if half.underflowed.swap(false, Ordering::AcqRel) {
            return Err(DriverError::OutputUnderflowed);
        }
        Ok(())
    }
}

impl CpalHost {
    fn build_playback<N>(
        &self,
        device: &Device,
        config: &cpal::StreamConfig,
        fault: &FaultSlot,
    ) -> std::result::Result<PlaybackHalf<N>, DriverError>
    where
        N: cpal::SizedSample + Send + 'static,
    {
        let cpal_device = self.find_device(&device.name)?;
        let frames = match config.buffer_size {
            BufferSize::Fixed(frames) => frames,
            BufferSize::Default => 0,
        };
        let samples = config.channels as usize * frames as usize;
        let default_config = cpal_device.default_output_config().ok();
        let default_range = default_config.as_ref().map(SupportedStreamConfig::buffer_size);
        let default_frames = default_callback_frames(default_range, config.sample_rate.0).max(frames);

        let (stream, producer, underflowed, primed) = build_with_fallback(
            |buffer_size| {
                let capacity = ring_capacity(config.channels, &buffer_size, default_frames, PLAYBACK_PERIODS);
                debug!("Output ring holds {} samples", capacity);
                let stream_config = cpal::StreamConfig {
                    buffer_size,
                    ..config.clone()
                };
                let (producer, mut consumer) = HeapRb::<N>::new(capacity).split();
                let underflowed = Arc::new(AtomicBool::new(false));
                let primed = Arc::new(AtomicBool::new(false));

                let cb_underflowed = Arc::clone(&underflowed);
                let cb_primed = Arc::clone(&primed);
                let stream = cpal_device.build_output_stream(
                    &stream_config,
                    move |data: &mut [N], _: &cpal::OutputCallbackInfo| {
                        let filled = consumer.pop_slice(data);
                        if filled < data.len() {
                            data[filled..].fill(N::EQUILIBRIUM);
                            if cb_primed.load(Ordering::Acquire) {
                                cb_underflowed.store(true, Ordering::Release);
                            }
                        }
                    },
                    fault_callback(Arc::clone(fault)),
                    None,
                )?;
                Ok((stream, producer, underflowed, primed))
            },
            frames,
            Direction::Output,
        )?;

        if let Err(e) = stream.pause() {
            debug!("Output stream cannot be paused before start: {}", e);
        }

        Ok(PlaybackHalf {
            stream,
            producer,
            scratch: Vec::with_capacity(samples),
            underflowed,
            primed,
        })
    }

    fn build_capture<N>(
        &self,
        device: &Device,
        config: &cpal::StreamConfig,
        fault: &FaultSlot,
    ) -> std::result::Result<CaptureHalf<N>, DriverError>
    where
        N: cpal::SizedSample + Send + 'static,
    {
        let cpal_device = self.find_device(&device.name)?;
        let frames = match config.buffer_size {
            BufferSize::Fixed(frames) => frames,
            BufferSize::Default => 0,
        };
        let samples = config.channels as usize * frames as usize;
        let default_config = cpal_device.default_input_config().ok();
        let default_range = default_config.as_ref().map(SupportedStreamConfig::buffer_size);
        let default_frames = default_callback_frames(default_range, config.sample_rate.0).max(frames);

        let (stream, consumer, overflowed) = build_with_fallback(
            |buffer_size| {
                let capacity = ring_capacity(config.channels, &buffer_size, default_frames, CAPTURE_PERIODS);
                debug!("Input ring holds {} samples", capacity);
                let stream_config = cpal::StreamConfig {
                    buffer_size,
                    ..config.clone()
                };
                let (mut producer, consumer) = HeapRb::<N>::new(capacity).split();
                let overflowed = Arc::new(AtomicBool::new(false));

                let cb_overflowed = Arc::clone(&overflowed);
                let stream = cpal_device.build_input_stream(
                    &stream_config,
                    move |data: &[N], _: &cpal::InputCallbackInfo| {
                        if producer.push_slice(data) < data.len() {
                            cb_overflowed.store(true, Ordering::Release);
                        }
                    },
                    fault_callback(Arc::clone(fault)),
                    None,
                )?;
                Ok((stream, consumer, overflowed))
            },
            frames,
            Direction::Input,
        )?;

        if let Err(e) = stream.pause() {
            debug!("Input stream cannot be paused before start: {}", e);
        }

        Ok(CaptureHalf {
            stream,
            consumer,
            scratch: Vec::with_capacity(samples),
            overflowed,
        })
    }
}

impl AudioHost for CpalHost {
    type Channel<T: Sample> = CpalChannel<T>;

    fn open_channel<T: Sample>(
        &self,
        negotiated: &Negotiated,
    ) -> std::result::Result<CpalChannel<T>, DriverError> {
        let config = &negotiated.config;
        let frames = u32::try_from(config.buffer_frames)
            .map_err(|_| DriverError::Other(format!("buffer of {} frames is too large", config.buffer_frames)))?;
        let sample_rate = cpal::SampleRate(config.sample_rate.round() as u32);
        let fault: FaultSlot = Arc::new(Mutex::new(None));

        let input = negotiated
            .input_device
            .as_ref()
            .map(|device| {
                let stream_config = cpal::StreamConfig {
                    channels: config.input_channels,
                    sample_rate,
                    buffer_size: BufferSize::Fixed(frames),
                };
                self.build_capture::<T::Native>(device, &stream_config, &fault)
            })
            .transpose()?;

        let output = negotiated
            .output_device
            .as_ref()
            .map(|device| {
                let stream_config = cpal::StreamConfig {
                    channels: config.output_channels,
                    sample_rate,
                    buffer_size: BufferSize::Fixed(frames),
                };
                self.build_playback::<T::Native>(device, &stream_config, &fault)
            })
            .transpose()?;

        let poll = (config.buffer_period() / 4).clamp(MIN_POLL, MAX_POLL);

        info!(
            "Opened {} channel at {} Hz, {} frames per buffer",
            T::FORMAT,
            sample_rate.0,
            frames
        );

        Ok(CpalChannel {
            input,
            output,
            fault,
            poll,
            _sample: PhantomData,
        })
    }
}
