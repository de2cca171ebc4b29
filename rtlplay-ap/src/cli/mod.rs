//! Command-line interface for rtlplay

pub mod device;
pub mod play;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for rtlplay
#[derive(Parser, Debug)]
#[command(name = "rtlplay")]
#[command(about = "Play FM radio from an RTL-SDR dongle through rtl_fm")]
#[command(version)]
pub struct Args {
    /// Configuration file (default: search the standard locations)
    #[arg(short, long, global = true, env = "RTLPLAY_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Tune to a frequency and play it
    Play(play::PlayArgs),

    /// Show audio device information
    Device {
        #[command(subcommand)]
        action: device::DeviceAction,
    },
}
