//! Bootstrap configuration loaded from TOML
//!
//! Settings sources, highest priority first:
//!
//! 1. Command-line arguments
//! 2. Environment variables (handled by the binary's argument parser)
//! 3. TOML configuration file
//! 4. Built-in defaults
//!
//! A missing configuration file is not an error. The caller gets the
//! built-in defaults and a log line saying so. A file that exists but does
//! not parse is an error, since silently ignoring it would hide typos.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Directory name used under the platform configuration directory
const APP_DIR: &str = "rtlplay";

/// File name searched for in each configuration directory
const CONFIG_FILE: &str = "config.toml";

/// Top-level TOML configuration
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct TomlConfig {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Audio output preferences
    pub audio: AudioConfig,

    /// Demodulator (rtl_fm) preferences
    pub tuner: TunerConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Audio output preferences
///
/// Every field is optional. Unset fields are negotiated against the device.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AudioConfig {
    /// Output device name (None = system default device)
    pub device: Option<String>,

    /// Sample rate in Hz (None = device default)
    pub sample_rate: Option<u32>,

    /// Buffer length in frames (None = derived from latency)
    pub buffer_frames: Option<usize>,

    /// Requested output latency in milliseconds (None = device low latency)
    pub latency_ms: Option<u64>,
}

/// Demodulator preferences
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct TunerConfig {
    /// Path to the rtl_fm executable (None = search PATH)
    pub command: Option<PathBuf>,

    /// Enable lower edge tuning
    pub edge: bool,

    /// Enable DC blocking filter
    pub dc: bool,

    /// Enable de-emphasis filter
    pub deemp: bool,

    /// Enable direct sampling
    pub direct: bool,

    /// Enable offset tuning
    pub offset: bool,
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, the default locations are
    /// searched and the built-in defaults are returned when none exists.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            debug!("Loading configuration from {}", path.display());
            return Self::from_file(path);
        }

        match default_config_paths().into_iter().find(|p| p.exists()) {
            Some(path) => {
                debug!("Loading configuration from {}", path.display());
                Self::from_file(&path)
            }
            None => {
                info!("No configuration file found, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    fn validate(&self) -> Result<()> {
        const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
        if !LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return Err(Error::Config(format!(
                "Invalid log level '{}'",
                self.logging.level
            )));
        }
        if self.audio.sample_rate == Some(0) {
            return Err(Error::Config("audio.sample_rate must be positive".to_string()));
        }
        if self.audio.buffer_frames == Some(0) {
            return Err(Error::Config("audio.buffer_frames must be positive".to_string()));
        }
        Ok(())
    }
}

/// Candidate configuration file locations for the current platform, in
/// search order.
pub fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join(APP_DIR).join(CONFIG_FILE));
    }

    if cfg!(target_os = "linux") {
        paths.push(PathBuf::from("/etc").join(APP_DIR).join(CONFIG_FILE));
    }

    paths
}
