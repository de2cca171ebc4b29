//! `device list` and `device show`

use anyhow::Result;
use clap::Subcommand;
use rtlplay_ap::audio::{CpalHost, Device, DeviceCatalog, Direction};
use rtlplay_ap::Error;
use std::io::Write;

#[derive(Subcommand, Debug)]
pub enum DeviceAction {
    /// List output devices
    List,

    /// Show details of an output device
    Show {
        /// Exact device name as printed by `device list`
        name: String,
    },
}

pub fn run(action: &DeviceAction) -> Result<()> {
    let host = CpalHost::new();
    let mut out = std::io::stdout().lock();
    match action {
        DeviceAction::List => list(&host, &mut out),
        DeviceAction::Show { name } => show(&host, name, &mut out),
    }
}

fn list<C: DeviceCatalog, W: Write>(catalog: &C, out: &mut W) -> Result<()> {
    for device in catalog.devices_for(Direction::Output)? {
        writeln!(
            out,
            "{} [channels: {}, sample rate: {}]",
            device.name, device.max_output_channels, device.default_sample_rate
        )?;
    }
    Ok(())
}

/// An existing device without output channels is reported as not found
fn output_device<C: DeviceCatalog>(catalog: &C, name: &str) -> Result<Device> {
    let device = catalog.device(name)?;
    if !device.supports(Direction::Output) {
        return Err(Error::NotFound(name.to_string()).into());
    }
    Ok(device)
}

fn show<C: DeviceCatalog, W: Write>(catalog: &C, name: &str, out: &mut W) -> Result<()> {
    let device = output_device(catalog, name)?;
    writeln!(out, "{}", device.name)?;
    writeln!(out, "Channels            : {}", device.max_output_channels)?;
    writeln!(out, "Default sample rate : {}", device.default_sample_rate)?;
    writeln!(
        out,
        "Default low latency : {:?}",
        device.default_low_output_latency
    )?;
    writeln!(
        out,
        "Default high latency: {:?}",
        device.default_high_output_latency
    )?;
    Ok(())
}
