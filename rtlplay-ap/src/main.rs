//! rtlplay - Main entry point
//!
//! Plays FM radio received by rtl_fm on an audio output device, and lists
//! the devices available for it.

use anyhow::{Context, Result};
use clap::Parser;
use rtlplay_ap::playback::CancelToken;
use rtlplay_ap::LOG_TARGETS;
use rtlplay_common::{logging, TomlConfig};
use std::future::Future;
use std::time::Duration;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};

mod cli;

use cli::{Args, Command};

/// How long a failed session waits for a shutdown signal already in flight
const SIGNAL_GRACE: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    let config = TomlConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    logging::init(&config.logging, LOG_TARGETS).context("Failed to initialize logging")?;

    match args.command {
        Command::Play(play_args) => play(play_args, config).await,
        Command::Device { action } => cli::device::run(&action),
    }
}

async fn play(args: cli::play::PlayArgs, config: TomlConfig) -> Result<()> {
    info!("Starting rtlplay {}", env!("CARGO_PKG_VERSION"));

    let cancel = CancelToken::new();

    // cpal streams are not Send: the whole session lives on one blocking thread
    let session = tokio::task::spawn_blocking({
        let cancel = cancel.clone();
        move || cli::play::run(&args, &config, &cancel)
    });

    if let Some(stats) = supervise(session, shutdown_signal(), cancel).await? {
        info!("Playback stopped after {} frames", stats.frames);
    }
    Ok(())
}

/// Wait for the session while `shutdown` trips `cancel` on its own task.
///
/// Returns `None` when the session failed because of the shutdown. The
/// signal also interrupts rtl_fm, so its short read can win the race with
/// the signal task; a failed session waits up to [`SIGNAL_GRACE`] for it.
async fn supervise<T, S>(
    session: JoinHandle<Result<T>>,
    shutdown: S,
    cancel: CancelToken,
) -> Result<Option<T>>
where
    T: Send + 'static,
    S: Future<Output = ()> + Send + 'static,
{
    let mut watcher = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown.await;
            cancel.cancel();
        }
    });

    let joined = session.await;
    let outcome = match joined.context("Playback thread panicked") {
        Ok(Ok(value)) => Ok(Some(value)),
        Ok(Err(e)) => {
            if !cancel.is_cancelled() {
                let _ = tokio::time::timeout(SIGNAL_GRACE, &mut watcher).await;
            }
            if cancel.is_cancelled() {
                info!("Playback stopped during shutdown: {:#}", e);
                Ok(None)
            } else {
                Err(e)
            }
        }
        Err(e) => Err(e),
    };

    watcher.abort();
    outcome
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    /// **Given:** A session that fails just before the shutdown signal is seen
    /// **When:** The signal arrives within the grace period
    /// **Then:** The failure counts as a clean stop
    #[tokio::test]
    async fn test_failure_racing_signal_is_clean() {
        let cancel = CancelToken::new();
        let session = tokio::spawn(async { Err::<u64, _>(anyhow!("short read")) });
        let shutdown = tokio::time::sleep(Duration::from_millis(50));

        let outcome = supervise(session, shutdown, cancel.clone()).await.unwrap();
        assert!(outcome.is_none());
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_failure_without_signal_is_error() {
        let cancel = CancelToken::new();
        let session = tokio::spawn(async { Err::<u64, _>(anyhow!("short read")) });

        let outcome = supervise(session, std::future::pending(), cancel.clone()).await;
        assert!(outcome.is_err());
        assert!(!cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_signal_cancels_running_session() {
        let cancel = CancelToken::new();
        let session = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                while !cancel.is_cancelled() {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
                Ok::<u64, anyhow::Error>(7)
            }
        });

        let outcome = supervise(session, async {}, cancel).await.unwrap();
        assert_eq!(outcome, Some(7));
    }

    #[tokio::test]
    async fn test_success_ignores_pending_signal() {
        let session = tokio::spawn(async { Ok::<u64, anyhow::Error>(3) });
        let outcome = supervise(session, std::future::pending(), CancelToken::new())
            .await
            .unwrap();
        assert_eq!(outcome, Some(3));
    }
}
