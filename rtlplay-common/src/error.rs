//! Common error types for rtlplay

use thiserror::Error;

/// Common result type for rtlplay configuration and logging
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while loading configuration or installing logging
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML syntax or schema error
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),
}
