//! # rtlplay Common Library
//!
//! Shared code for the rtlplay crates:
//! - Bootstrap configuration (TOML file discovery and parsing)
//! - Logging initialization
//! - Common error type

pub mod config;
pub mod error;
pub mod logging;

pub use config::{AudioConfig, LoggingConfig, TomlConfig, TunerConfig};
pub use error::{Error, Result};
