//! Logging initialization
//!
//! `RUST_LOG` wins when set. Otherwise the configured level applies to the
//! given crate targets and everything else logs at `warn`.

use crate::config::LoggingConfig;
use crate::{Error, Result};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global tracing subscriber.
///
/// Logs go to stderr unless `config.file` is set, in which case they are
/// appended to that file without ANSI colors. Stdout stays free for command
/// output.
pub fn init(config: &LoggingConfig, targets: &[&str]) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(&config.level, targets)));

    let registry = tracing_subscriber::registry().with(filter);

    let installed = match &config.file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            registry
                .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .try_init()
        }
        None => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init(),
    };

    installed.map_err(|e| Error::Config(format!("Failed to install logger: {}", e)))
}

/// Build filter directives such as `warn,rtlplay_ap=debug`.
pub fn default_directives(level: &str, targets: &[&str]) -> String {
    let level = level.to_ascii_lowercase();
    let mut directives = vec!["warn".to_string()];
    directives.extend(targets.iter().map(|t| format!("{}={}", t, level)));
    directives.join(",")
}
