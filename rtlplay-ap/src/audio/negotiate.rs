//! Stream parameter negotiation
//!
//! Reconciles a [`StreamRequest`] against the capabilities of the selected
//! devices into one concrete [`StreamConfig`]. Per active direction:
//!
//! 1. Resolve the device (explicit, system default, or unused)
//! 2. The device must offer channels in that direction
//! 3. Channels: the override when `0 < override <= max`, else the device max
//! 4. Latency: the override when `0 < override <= low latency`, else the
//!    device's default low latency (which must be nonzero)
//!
//! Then the sample rate (override, else input device default, else output
//! device default) and the buffer length in frames (override, else
//! `round(rate * max(input latency, output latency, 10ms))`).
//!
//! Nothing partial is returned on error.

use crate::audio::device::{Device, DeviceCatalog, Direction};
use crate::error::{Error, Result};
use std::time::Duration;
use tracing::debug;

/// Lower bound on the latency used to derive the buffer length
pub const MIN_BUFFER_LATENCY: Duration = Duration::from_millis(10);

/// Upper bound on frames per buffer, about 21 s at 48 kHz
pub const MAX_BUFFER_FRAMES: usize = 1 << 20;

/// Which device to use for one direction
#[derive(Debug, Clone, Default, PartialEq)]
pub enum DeviceSelection {
    /// Direction not used
    #[default]
    Unused,
    /// System default device for the direction
    Default,
    /// A specific device
    Device(Device),
}

/// Negotiation input.
///
/// Build with [`StreamRequest::builder`]. Zero-valued numeric overrides are
/// normalized to "not given".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamRequest {
    pub input: DeviceSelection,
    pub output: DeviceSelection,
    pub input_channels: Option<u16>,
    pub output_channels: Option<u16>,
    pub input_latency: Option<Duration>,
    pub output_latency: Option<Duration>,
    pub sample_rate: Option<f64>,
    pub buffer_frames: Option<usize>,
}

impl StreamRequest {
    pub fn builder() -> StreamRequestBuilder {
        StreamRequestBuilder::default()
    }

    /// Check the request is self-consistent.
    pub fn validate(&self) -> Result<()> {
        if self.input == DeviceSelection::Unused && self.output == DeviceSelection::Unused {
            return Err(Error::InvalidConfig(
                "neither an input nor an output device is selected".to_string(),
            ));
        }
        if let Some(rate) = self.sample_rate {
            if !rate.is_finite() || rate <= 0.0 {
                return Err(Error::InvalidConfig(format!(
                    "sample rate must be a positive number, got {}",
                    rate
                )));
            }
        }
        if let Some(frames) = self.buffer_frames {
            check_buffer_frames(frames)?;
        }
        Ok(())
    }
}

fn check_buffer_frames(frames: usize) -> Result<()> {
    if frames > MAX_BUFFER_FRAMES {
        return Err(Error::InvalidConfig(format!(
            "buffer of {} frames exceeds the maximum of {}",
            frames, MAX_BUFFER_FRAMES
        )));
    }
    Ok(())
}

/// Builder for [`StreamRequest`]
#[derive(Debug, Clone, Default)]
pub struct StreamRequestBuilder {
    request: StreamRequest,
}

impl StreamRequestBuilder {
    pub fn input(mut self, selection: DeviceSelection) -> Self {
        self.request.input = selection;
        self
    }

    pub fn output(mut self, selection: DeviceSelection) -> Self {
        self.request.output = selection;
        self
    }

    pub fn input_channels(mut self, channels: u16) -> Self {
        self.request.input_channels = Some(channels).filter(|&c| c > 0);
        self
    }

    pub fn output_channels(mut self, channels: u16) -> Self {
        self.request.output_channels = Some(channels).filter(|&c| c > 0);
        self
    }

    pub fn input_latency(mut self, latency: Duration) -> Self {
        self.request.input_latency = Some(latency).filter(|l| !l.is_zero());
        self
    }

    pub fn output_latency(mut self, latency: Duration) -> Self {
        self.request.output_latency = Some(latency).filter(|l| !l.is_zero());
        self
    }

    pub fn sample_rate(mut self, rate: f64) -> Self {
        self.request.sample_rate = Some(rate).filter(|&r| r != 0.0);
        self
    }

    pub fn buffer_frames(mut self, frames: usize) -> Self {
        self.request.buffer_frames = Some(frames).filter(|&f| f > 0);
        self
    }

    pub fn build(self) -> Result<StreamRequest> {
        self.request.validate()?;
        Ok(self.request)
    }
}

/// Fully resolved stream parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamConfig {
    /// 0 when the input direction is unused
    pub input_channels: u16,
    /// 0 when the output direction is unused
    pub output_channels: u16,
    pub input_latency: Duration,
    pub output_latency: Duration,
    /// Samples per second
    pub sample_rate: f64,
    /// Frames per buffer
    pub buffer_frames: usize,
}

impl StreamConfig {
    pub fn channels(&self, direction: Direction) -> u16 {
        match direction {
            Direction::Input => self.input_channels,
            Direction::Output => self.output_channels,
        }
    }

    /// Interleaved samples in one buffer for `direction`.
    ///
    /// Saturates on overflow, which [`StreamConfig::check`] rejects.
    pub fn frame_len(&self, direction: Direction) -> usize {
        self.checked_frame_len(direction).unwrap_or(usize::MAX)
    }

    fn checked_frame_len(&self, direction: Direction) -> Option<usize> {
        (self.channels(direction) as usize).checked_mul(self.buffer_frames)
    }

    /// Check the buffer length is within [`MAX_BUFFER_FRAMES`] and both
    /// frame lengths are representable.
    pub fn check(&self) -> Result<()> {
        if self.buffer_frames == 0 {
            return Err(Error::InvalidConfig("buffer of 0 frames".to_string()));
        }
        check_buffer_frames(self.buffer_frames)?;
        for direction in [Direction::Input, Direction::Output] {
            if self.checked_frame_len(direction).is_none() {
                return Err(Error::InvalidConfig(format!(
                    "{} buffer of {} channels x {} frames overflows",
                    direction,
                    self.channels(direction),
                    self.buffer_frames
                )));
            }
        }
        Ok(())
    }

    /// Wall-clock duration of one buffer
    pub fn buffer_period(&self) -> Duration {
        Duration::from_secs_f64(self.buffer_frames as f64 / self.sample_rate)
    }
}

/// Negotiation result: the config plus the devices it was resolved against
#[derive(Debug, Clone, PartialEq)]
pub struct Negotiated {
    pub config: StreamConfig,
    pub input_device: Option<Device>,
    pub output_device: Option<Device>,
}

struct Resolved {
    channels: u16,
    latency: Duration,
}

fn select<C: DeviceCatalog + ?Sized>(
    catalog: &C,
    selection: &DeviceSelection,
    direction: Direction,
) -> Result<Option<Device>> {
    match selection {
        DeviceSelection::Unused => Ok(None),
        DeviceSelection::Device(device) => Ok(Some(device.clone())),
        DeviceSelection::Default => match direction {
            Direction::Input => catalog.default_input_device().map(Some),
            Direction::Output => catalog.default_output_device().map(Some),
        },
    }
}

fn resolve_direction(
    device: &Device,
    direction: Direction,
    channels: Option<u16>,
    latency: Option<Duration>,
) -> Result<Resolved> {
    let capability = |reason: &str| Error::DeviceCapability {
        direction,
        device: device.name.clone(),
        reason: reason.to_string(),
    };

    let max_channels = device.max_channels(direction);
    if max_channels == 0 {
        return Err(capability(&format!("has no {} channels", direction)));
    }
    let channels = match channels {
        Some(c) if c > 0 && c <= max_channels => c,
        _ => max_channels,
    };

    let low_latency = device.default_low_latency(direction);
    if low_latency.is_zero() {
        return Err(capability(&format!("has no {} latency", direction)));
    }
    let latency = match latency {
        Some(l) if !l.is_zero() && l <= low_latency => l,
        _ => low_latency,
    };

    Ok(Resolved { channels, latency })
}

/// Buffer length in frames for `sample_rate` and the larger of the two
/// latencies, never shorter than [`MIN_BUFFER_LATENCY`].
pub fn derive_buffer_frames(sample_rate: f64, input: Duration, output: Duration) -> usize {
    let latency = input.max(output).max(MIN_BUFFER_LATENCY);
    ((sample_rate * latency.as_secs_f64()).round() as usize).max(1)
}

/// Resolve `request` into a concrete configuration.
pub fn negotiate<C: DeviceCatalog + ?Sized>(
    catalog: &C,
    request: &StreamRequest,
) -> Result<Negotiated> {
    request.validate()?;

    let input_device = select(catalog, &request.input, Direction::Input)?;
    let output_device = select(catalog, &request.output, Direction::Output)?;

    let input = input_device
        .as_ref()
        .map(|d| resolve_direction(d, Direction::Input, request.input_channels, request.input_latency))
        .transpose()?;
    let output = output_device
        .as_ref()
        .map(|d| {
            resolve_direction(d, Direction::Output, request.output_channels, request.output_latency)
        })
        .transpose()?;

    let sample_rate = match request.sample_rate {
        Some(rate) => rate,
        None => {
            let (device, direction) = input_device
                .as_ref()
                .map(|d| (d, Direction::Input))
                .or_else(|| output_device.as_ref().map(|d| (d, Direction::Output)))
                .ok_or_else(|| Error::InvalidConfig("no device selected".to_string()))?;
            if !(device.default_sample_rate.is_finite() && device.default_sample_rate > 0.0) {
                return Err(Error::DeviceCapability {
                    direction,
                    device: device.name.clone(),
                    reason: "reports no default sample rate".to_string(),
                });
            }
            device.default_sample_rate
        }
    };

    let input_latency = input.as_ref().map_or(Duration::ZERO, |r| r.latency);
    let output_latency = output.as_ref().map_or(Duration::ZERO, |r| r.latency);

    let buffer_frames = request
        .buffer_frames
        .filter(|&f| f > 0)
        .unwrap_or_else(|| derive_buffer_frames(sample_rate, input_latency, output_latency));

    let config = StreamConfig {
        input_channels: input.as_ref().map_or(0, |r| r.channels),
        output_channels: output.as_ref().map_or(0, |r| r.channels),
        input_latency,
        output_latency,
        sample_rate,
        buffer_frames,
    };
    config.check()?;

    debug!(
        "Negotiated stream: input={:?} ({} ch, {:?}), output={:?} ({} ch, {:?}), rate={} Hz, buffer={} frames",
        input_device.as_ref().map(|d| d.name.as_str()),
        config.input_channels,
        config.input_latency,
        output_device.as_ref().map(|d| d.name.as_str()),
        config.output_channels,
        config.output_latency,
        config.sample_rate,
        config.buffer_frames,
    );

    Ok(Negotiated {
        config,
        input_device,
        output_device,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::device::fixtures::{input_only, output_only};
    use crate::audio::device::StaticCatalog;

    fn catalog() -> StaticCatalog {
        StaticCatalog::new(vec![
            output_only("Speakers", 2, 48_000.0),
            input_only("Mic", 1, 44_100.0),
        ])
        .with_default_output("Speakers")
        .with_default_input("Mic")
    }

    #[test]
    fn test_buffer_floor_is_ten_milliseconds() {
        assert_eq!(derive_buffer_frames(48_000.0, Duration::ZERO, Duration::ZERO), 480);
        assert_eq!(
            derive_buffer_frames(48_000.0, Duration::from_millis(2), Duration::from_millis(5)),
            480
        );
    }

    #[test]
    fn test_buffer_uses_larger_latency() {
        assert_eq!(
            derive_buffer_frames(48_000.0, Duration::from_millis(20), Duration::from_millis(12)),
            960
        );
        // 44100 * 0.0116 = 511.56
        assert_eq!(
            derive_buffer_frames(44_100.0, Duration::ZERO, Duration::from_micros(11_600)),
            512
        );
    }

    #[test]
    fn test_output_only_defaults() {
        let request = StreamRequest::builder()
            .output(DeviceSelection::Default)
            .build()
            .unwrap();

        let negotiated = negotiate(&catalog(), &request).unwrap();
        let config = negotiated.config;

        assert_eq!(config.output_channels, 2);
        assert_eq!(config.input_channels, 0);
        assert_eq!(config.sample_rate, 48_000.0);
        assert_eq!(config.buffer_frames, 480);
        assert_eq!(config.output_latency, Duration::from_micros(8_707));
        assert_eq!(config.input_latency, Duration::ZERO);
        assert!(negotiated.input_device.is_none());
    }

    #[test]
    fn test_channel_override_out_of_range_clamps_to_max() {
        let speakers = output_only("Speakers", 2, 48_000.0);
        let request = StreamRequest {
            output: DeviceSelection::Device(speakers),
            output_channels: Some(8),
            ..Default::default()
        };

        let config = negotiate(&catalog(), &request).unwrap().config;
        assert_eq!(config.output_channels, 2);
    }

    #[test]
    fn test_channel_override_in_range_is_kept() {
        let request = StreamRequest::builder()
            .output(DeviceSelection::Default)
            .output_channels(1)
            .build()
            .unwrap();

        let config = negotiate(&catalog(), &request).unwrap().config;
        assert_eq!(config.output_channels, 1);
    }

    #[test]
    fn test_latency_override_above_low_latency_falls_back() {
        let request = StreamRequest::builder()
            .output(DeviceSelection::Default)
            .output_latency(Duration::from_millis(50))
            .build()
            .unwrap();

        let config = negotiate(&catalog(), &request).unwrap().config;
        assert_eq!(config.output_latency, Duration::from_micros(8_707));
    }

    #[test]
    fn test_latency_override_within_range_is_kept() {
        let request = StreamRequest::builder()
            .output(DeviceSelection::Default)
            .output_latency(Duration::from_millis(4))
            .build()
            .unwrap();

        let config = negotiate(&catalog(), &request).unwrap().config;
        assert_eq!(config.output_latency, Duration::from_millis(4));
    }

    #[test]
    fn test_input_rate_wins_over_output_rate() {
        let request = StreamRequest::builder()
            .input(DeviceSelection::Default)
            .output(DeviceSelection::Default)
            .build()
            .unwrap();

        let config = negotiate(&catalog(), &request).unwrap().config;
        assert_eq!(config.sample_rate, 44_100.0);
        assert_eq!(config.input_channels, 1);
        assert_eq!(config.output_channels, 2);
    }

    #[test]
    fn test_explicit_rate_and_buffer_override() {
        let request = StreamRequest::builder()
            .output(DeviceSelection::Default)
            .sample_rate(32_000.0)
            .buffer_frames(256)
            .build()
            .unwrap();

        let config = negotiate(&catalog(), &request).unwrap().config;
        assert_eq!(config.sample_rate, 32_000.0);
        assert_eq!(config.buffer_frames, 256);
        assert_eq!(config.frame_len(Direction::Output), 512);
    }

    #[test]
    fn test_input_device_without_input_channels_fails() {
        let request = StreamRequest::builder()
            .input(DeviceSelection::Device(output_only("Speakers", 2, 48_000.0)))
            .build()
            .unwrap();

        match negotiate(&catalog(), &request) {
            Err(Error::DeviceCapability { direction, device, .. }) => {
                assert_eq!(direction, Direction::Input);
                assert_eq!(device, "Speakers");
            }
            other => panic!("expected DeviceCapability, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_low_latency_is_unsupported() {
        let mut speakers = output_only("Speakers", 2, 48_000.0);
        speakers.default_low_output_latency = Duration::ZERO;
        let request = StreamRequest::builder()
            .output(DeviceSelection::Device(speakers))
            .build()
            .unwrap();

        assert!(matches!(
            negotiate(&catalog(), &request),
            Err(Error::DeviceCapability { direction: Direction::Output, .. })
        ));
    }

    #[test]
    fn test_missing_default_device_is_not_found() {
        let request = StreamRequest::builder()
            .output(DeviceSelection::Default)
            .build()
            .unwrap();

        assert!(matches!(
            negotiate(&StaticCatalog::default(), &request),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_request_validation() {
        assert!(matches!(
            StreamRequest::builder().build(),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            StreamRequest::builder()
                .output(DeviceSelection::Default)
                .sample_rate(-1.0)
                .build(),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            StreamRequest::builder()
                .output(DeviceSelection::Default)
                .sample_rate(f64::NAN)
                .build(),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_oversized_buffer_override_is_rejected() {
        let result = StreamRequest::builder()
            .output(DeviceSelection::Default)
            .buffer_frames(MAX_BUFFER_FRAMES + 1)
            .build();
        assert!(matches!(result, Err(Error::InvalidConfig(_))));

        let request = StreamRequest::builder()
            .output(DeviceSelection::Default)
            .buffer_frames(MAX_BUFFER_FRAMES)
            .build()
            .unwrap();
        let config = negotiate(&catalog(), &request).unwrap().config;
        assert_eq!(config.frame_len(Direction::Output), 2 * MAX_BUFFER_FRAMES);
    }

    /// **Given:** A request built without the builder, so never validated
    /// **When:** Its buffer override is `usize::MAX`
    /// **Then:** Negotiation fails instead of producing an unallocatable config
    #[test]
    fn test_unvalidated_oversized_buffer_fails_negotiation() {
        let request = StreamRequest {
            output: DeviceSelection::Default,
            buffer_frames: Some(usize::MAX),
            ..Default::default()
        };
        assert!(matches!(
            negotiate(&catalog(), &request),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_huge_sample_rate_cannot_derive_oversized_buffer() {
        let request = StreamRequest::builder()
            .output(DeviceSelection::Default)
            .sample_rate(1.0e12)
            .build()
            .unwrap();
        assert!(matches!(
            negotiate(&catalog(), &request),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_frame_len_overflow_is_caught() {
        let config = StreamConfig {
            input_channels: 0,
            output_channels: u16::MAX,
            input_latency: Duration::ZERO,
            output_latency: Duration::from_millis(10),
            sample_rate: 48_000.0,
            buffer_frames: usize::MAX,
        };
        assert_eq!(config.frame_len(Direction::Output), usize::MAX);
        assert_eq!(config.frame_len(Direction::Input), 0);
        assert!(matches!(config.check(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_zero_overrides_normalize_to_none() {
        let request = StreamRequest::builder()
            .output(DeviceSelection::Default)
            .output_channels(0)
            .output_latency(Duration::ZERO)
            .sample_rate(0.0)
            .buffer_frames(0)
            .build()
            .unwrap();

        assert_eq!(request.output_channels, None);
        assert_eq!(request.output_latency, None);
        assert_eq!(request.sample_rate, None);
        assert_eq!(request.buffer_frames, None);
    }

    #[test]
    fn test_override_grid_never_violates_channel_bounds() {
        let catalog = catalog();
        for max in 1..=4u16 {
            let device = output_only("Dev", max, 48_000.0);
            for requested in 0..=6u16 {
                let request = StreamRequest {
                    output: DeviceSelection::Device(device.clone()),
                    output_channels: Some(requested),
                    ..Default::default()
                };
                let channels = negotiate(&catalog, &request).unwrap().config.output_channels;
                assert!(channels >= 1 && channels <= max);
                if requested >= 1 && requested <= max {
                    assert_eq!(channels, requested);
                }
            }
        }
    }
}
