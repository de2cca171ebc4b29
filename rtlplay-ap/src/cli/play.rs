//! `play`: tune rtl_fm and stream its output to an audio device

use anyhow::{Context, Result};
use clap::Args;
use rtlplay_ap::audio::negotiate::MIN_BUFFER_LATENCY;
use rtlplay_ap::audio::{CpalHost, DeviceCatalog, DeviceSelection, StreamRequest};
use rtlplay_ap::playback::{run_session, CancelToken, LoopStats};
use rtlplay_ap::rtlfm::{Frequency, RtlFm, TunerOptions};
use rtlplay_common::TomlConfig;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// rtl_fm produces mono audio
const CHANNELS: u16 = 1;

#[derive(Args, Debug, Clone)]
pub struct PlayArgs {
    /// Frequency to tune to (e.g. 93.0M, 90500K)
    #[arg(short, long)]
    pub freq: Frequency,

    /// Output device name (default: system default output device)
    #[arg(short, long, env = "RTLPLAY_DEVICE")]
    pub device: Option<String>,

    /// Sample rate in Hz (default: the device's default sample rate)
    #[arg(short = 'r', long)]
    pub sample_rate: Option<u32>,

    /// Buffer length in frames (default: 10 ms of samples)
    #[arg(long)]
    pub buffer_frames: Option<usize>,

    /// Enable lower edge tuning
    #[arg(long)]
    pub edge: bool,

    /// Enable DC blocking filter
    #[arg(long)]
    pub dc: bool,

    /// Enable de-emphasis filter
    #[arg(long)]
    pub deemp: bool,

    /// Enable direct sampling
    #[arg(long)]
    pub direct: bool,

    /// Enable offset tuning
    #[arg(long)]
    pub offset: bool,

    /// Path to the rtl_fm executable (default: search PATH)
    #[arg(long, env = "RTLPLAY_RTL_FM")]
    pub rtl_fm: Option<PathBuf>,
}

/// Arguments merged over the configuration file
#[derive(Debug, Clone, PartialEq)]
struct Settings {
    freq: Frequency,
    device: Option<String>,
    sample_rate: Option<u32>,
    buffer_frames: Option<usize>,
    latency: Option<Duration>,
    tuner: TunerOptions,
}

impl Settings {
    fn resolve(args: &PlayArgs, config: &TomlConfig) -> Self {
        let audio = &config.audio;
        let tuner = &config.tuner;
        Self {
            freq: args.freq,
            device: args.device.clone().or_else(|| audio.device.clone()),
            sample_rate: args.sample_rate.or(audio.sample_rate),
            buffer_frames: args.buffer_frames.or(audio.buffer_frames),
            latency: audio.latency_ms.map(Duration::from_millis),
            tuner: TunerOptions {
                command: args.rtl_fm.clone().or_else(|| tuner.command.clone()),
                sample_rate: None,
                edge: args.edge || tuner.edge,
                dc: args.dc || tuner.dc,
                deemp: args.deemp || tuner.deemp,
                direct: args.direct || tuner.direct,
                offset: args.offset || tuner.offset,
            },
        }
    }

    /// Output-only mono request against `catalog`
    fn request<C: DeviceCatalog>(&self, catalog: &C) -> rtlplay_ap::Result<StreamRequest> {
        let output = match &self.device {
            Some(name) => DeviceSelection::Device(catalog.device(name)?),
            None => DeviceSelection::Default,
        };

        let mut builder = StreamRequest::builder()
            .output(output)
            .output_channels(CHANNELS);
        if let Some(rate) = self.sample_rate {
            builder = builder.sample_rate(rate as f64);
        }
        if let Some(frames) = self.buffer_frames {
            builder = builder.buffer_frames(frames);
        }
        // 10 ms buffers unless a latency is configured
        let latency = self.latency.unwrap_or(MIN_BUFFER_LATENCY);
        builder.output_latency(latency).build()
    }
}

/// Play until `cancel` is tripped or the stream fails. Blocks.
pub fn run(args: &PlayArgs, config: &TomlConfig, cancel: &CancelToken) -> Result<LoopStats> {
    let settings = Settings::resolve(args, config);
    let host = CpalHost::new();
    let request = settings
        .request(&host)
        .context("Failed to select output device")?;

    info!("Tuning to {}", settings.freq);

    let stats = run_session::<i16, _, _, _>(
        &host,
        &request,
        |stream| {
            let tuner = TunerOptions {
                sample_rate: Some(stream.sample_rate.round() as u32),
                ..settings.tuner.clone()
            };
            RtlFm::spawn(settings.freq, &tuner)
        },
        cancel,
    )?;
    Ok(stats)
}
