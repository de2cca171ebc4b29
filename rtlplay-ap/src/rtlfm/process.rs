//! rtl_fm child process
//!
//! Runs the demodulator in wide-band FM mode with its samples on stdout.
//! Its stderr is forwarded line by line to the `rtl_fm` tracing target at
//! debug level.

use crate::error::{Error, Result};
use crate::rtlfm::frequency::Frequency;
use std::io::{self, BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Looked up on PATH when no command path is configured
pub const DEFAULT_COMMAND: &str = "rtl_fm";

/// Tracing target of the forwarded rtl_fm diagnostics
pub const LOG_TARGET: &str = "rtl_fm";

/// Tuner input rate handed to rtl_fm for wide-band FM
const TUNER_SAMPLE_RATE: &str = "400k";

/// Demodulator settings besides the frequency
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TunerOptions {
    pub command: Option<PathBuf>,
    /// Output sample rate; rtl_fm's own default when None
    pub sample_rate: Option<u32>,
    /// Lower edge tuning
    pub edge: bool,
    /// DC blocking filter
    pub dc: bool,
    /// De-emphasis filter
    pub deemp: bool,
    pub direct: bool,
    pub offset: bool,
}

impl TunerOptions {
    fn command(&self) -> PathBuf {
        self.command
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_COMMAND))
    }
}

/// rtl_fm command line for `freq`
pub fn arguments(freq: Frequency, options: &TunerOptions) -> Vec<String> {
    let mut args = vec![
        "-M".to_string(),
        "wbfm".to_string(),
        "-f".to_string(),
        freq.to_string(),
        "-s".to_string(),
        TUNER_SAMPLE_RATE.to_string(),
    ];

    if let Some(rate) = options.sample_rate.filter(|&r| r > 0) {
        args.push("-r".to_string());
        args.push(rate.to_string());
    }

    let extras = [
        (options.edge, "edge"),
        (options.dc, "dc"),
        (options.deemp, "deemp"),
        (options.direct, "direct"),
        (options.offset, "offset"),
    ];
    for (_, name) in extras.iter().filter(|(enabled, _)| *enabled) {
        args.push("-E".to_string());
        args.push(name.to_string());
    }

    args
}

/// Running rtl_fm instance. Reading yields its raw sample bytes.
pub struct RtlFm {
    child: Child,
    stdout: Option<ChildStdout>,
    stderr_forwarder: Option<JoinHandle<()>>,
    command: String,
    closed: bool,
}

impl RtlFm {
    pub fn spawn(freq: Frequency, options: &TunerOptions) -> Result<Self> {
        let path = options.command();
        let command = path.display().to_string();
        let args = arguments(freq, options);

        info!("Starting {} {}", command, args.join(" "));

        let mut child = Command::new(&path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| Error::Command {
                command: command.clone(),
                source,
            })?;

        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(Error::Command {
                command,
                source: io::Error::new(io::ErrorKind::Other, "stdout was not captured"),
            });
        };

        let stderr_forwarder = child.stderr.take().map(|stderr| {
            thread::spawn(move || {
                for line in BufReader::new(stderr).lines().map_while(|l| l.ok()) {
                    debug!(target: LOG_TARGET, "{}", line);
                }
            })
        });

        debug!("{} running as pid {}", command, child.id());

        Ok(Self {
            child,
            stdout: Some(stdout),
            stderr_forwarder,
            command,
            closed: false,
        })
    }

    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Stop production: close the pipe, interrupt the process, wait for it.
    ///
    /// A non-zero exit status after the interrupt is expected and not an error.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        self.stdout = None;
        self.interrupt();

        let status = self.child.wait().map_err(|source| Error::Command {
            command: self.command.clone(),
            source,
        })?;
        debug!("{} exited with {}", self.command, status);

        if let Some(handle) = self.stderr_forwarder.take() {
            if handle.join().is_err() {
                warn!("{} stderr forwarder panicked", self.command);
            }
        }
        Ok(())
    }

    #[cfg(unix)]
    fn interrupt(&mut self) {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let pid = Pid::from_raw(self.child.id() as i32);
        if let Err(e) = kill(pid, Signal::SIGINT) {
            debug!("SIGINT to {} failed ({}), killing", self.command, e);
            let _ = self.child.kill();
        }
    }

    #[cfg(not(unix))]
    fn interrupt(&mut self) {
        let _ = self.child.kill();
    }
}

impl Read for RtlFm {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.stdout.as_mut() {
            Some(stdout) => stdout.read(buf),
            None => Ok(0),
        }
    }
}

impl Drop for RtlFm {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Failed to stop {}: {}", self.command, e);
        }
    }
}
