//! Device catalog
//!
//! A [`Device`] is an immutable capability snapshot taken when the catalog
//! is queried. Negotiation only ever borrows it.

use crate::error::{Error, Result};
use std::fmt;
use std::time::Duration;

/// Stream direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Input,
    Output,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Input => f.write_str("input"),
            Direction::Output => f.write_str("output"),
        }
    }
}

/// Capability snapshot of one audio device
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    pub name: String,
    pub max_input_channels: u16,
    pub max_output_channels: u16,
    pub default_low_input_latency: Duration,
    pub default_high_input_latency: Duration,
    pub default_low_output_latency: Duration,
    pub default_high_output_latency: Duration,
    /// Samples per second
    pub default_sample_rate: f64,
}

impl Device {
    pub fn max_channels(&self, direction: Direction) -> u16 {
        match direction {
            Direction::Input => self.max_input_channels,
            Direction::Output => self.max_output_channels,
        }
    }

    pub fn default_low_latency(&self, direction: Direction) -> Duration {
        match direction {
            Direction::Input => self.default_low_input_latency,
            Direction::Output => self.default_low_output_latency,
        }
    }

    pub fn default_high_latency(&self, direction: Direction) -> Duration {
        match direction {
            Direction::Input => self.default_high_input_latency,
            Direction::Output => self.default_high_output_latency,
        }
    }

    /// True when the device offers at least one channel in `direction`
    pub fn supports(&self, direction: Direction) -> bool {
        self.max_channels(direction) > 0
    }
}

/// Query surface over the audio driver's devices
pub trait DeviceCatalog {
    /// All devices. Empty (not an error) when the system has none.
    fn devices(&self) -> Result<Vec<Device>>;

    /// System default input device
    fn default_input_device(&self) -> Result<Device>;

    /// System default output device
    fn default_output_device(&self) -> Result<Device>;

    /// Look up a device by exact name.
    fn device(&self, name: &str) -> Result<Device> {
        self.devices()?
            .into_iter()
            .find(|d| d.name == name)
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }

    /// Devices usable in `direction`
    fn devices_for(&self, direction: Direction) -> Result<Vec<Device>> {
        Ok(self
            .devices()?
            .into_iter()
            .filter(|d| d.supports(direction))
            .collect())
    }
}

/// Catalog over a fixed list of devices.
///
/// Defaults are referenced by name and must be present in the list.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    devices: Vec<Device>,
    default_input: Option<String>,
    default_output: Option<String>,
}

impl StaticCatalog {
    pub fn new(devices: Vec<Device>) -> Self {
        Self {
            devices,
            default_input: None,
            default_output: None,
        }
    }

    pub fn with_default_input(mut self, name: impl Into<String>) -> Self {
        self.default_input = Some(name.into());
        self
    }

    pub fn with_default_output(mut self, name: impl Into<String>) -> Self {
        self.default_output = Some(name.into());
        self
    }

    fn lookup_default(&self, name: Option<&String>, what: &str) -> Result<Device> {
        let name = name.ok_or_else(|| Error::NotFound(format!("default {} device", what)))?;
        self.device(name)
    }
}

impl DeviceCatalog for StaticCatalog {
    fn devices(&self) -> Result<Vec<Device>> {
        Ok(self.devices.clone())
    }

    fn default_input_device(&self) -> Result<Device> {
        self.lookup_default(self.default_input.as_ref(), "input")
    }

    fn default_output_device(&self) -> Result<Device> {
        self.lookup_default(self.default_output.as_ref(), "output")
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_empty_catalog_lists_nothing() {
        let catalog = StaticCatalog::default();
        assert!(catalog.devices().unwrap().is_empty());
    }

    #[test]
    fn test_lookup_by_exact_name() {
        let catalog = StaticCatalog::new(vec![
            output_only("Speakers", 2, 48_000.0),
            input_only("Mic", 1, 44_100.0),
        ]);

        assert_eq!(catalog.device("Mic").unwrap().max_input_channels, 1);
        assert!(matches!(catalog.device("mic"), Err(Error::NotFound(_))));
        assert!(matches!(catalog.device("Speakers "), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_defaults() {
        let catalog = StaticCatalog::new(vec![output_only("Speakers", 2, 48_000.0)])
            .with_default_output("Speakers");

        assert_eq!(catalog.default_output_device().unwrap().name, "Speakers");
        assert!(matches!(
            catalog.default_input_device(),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_devices_for_direction() {
        let catalog = StaticCatalog::new(vec![
            output_only("Speakers", 2, 48_000.0),
            input_only("Mic", 1, 44_100.0),
        ]);

        let outputs = catalog.devices_for(Direction::Output).unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].name, "Speakers");
    }
}
