//! Scripted audio host
//!
//! `MockHost` serves devices from a `StaticCatalog` and opens `MockDriver`s
//! that all share one `Journal`. Tests script driver results up front and
//! inspect the journal afterwards.

use rtlplay_ap::audio::{
    AudioHost, Device, DeviceCatalog, Driver, DriverError, Negotiated, Sample, StaticCatalog,
};
use rtlplay_ap::Result;
use std::collections::VecDeque;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// One driver interaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Open,
    Start,
    Stop,
    /// Read of this many samples
    Read(usize),
    /// Write of this many samples
    Write(usize),
    /// Driver dropped (hardware channel released)
    Release,
}

/// Shared record of driver calls plus the scripted results still pending
#[derive(Debug, Default)]
pub struct Journal {
    pub calls: Vec<Call>,
    /// Little-endian bytes of every written buffer
    pub written: Vec<Vec<u8>>,
    read_results: VecDeque<std::result::Result<(), DriverError>>,
    write_results: VecDeque<std::result::Result<(), DriverError>>,
    start_failure: Option<DriverError>,
    /// Little-endian bytes served to reads, repeated
    capture_pattern: Vec<u8>,
}

impl Journal {
    pub fn count(&self, call: &Call) -> usize {
        self.calls.iter().filter(|c| *c == call).count()
    }

    pub fn writes(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, Call::Write(_)))
            .count()
    }
}

fn lock(journal: &Arc<Mutex<Journal>>) -> MutexGuard<'_, Journal> {
    journal.lock().unwrap_or_else(|e| e.into_inner())
}

/// Driver that records calls into a shared journal
pub struct MockDriver<T> {
    journal: Arc<Mutex<Journal>>,
    _sample: PhantomData<T>,
}

impl<T: Sample> MockDriver<T> {
    pub fn new(journal: Arc<Mutex<Journal>>) -> Self {
        Self {
            journal,
            _sample: PhantomData,
        }
    }
}

impl<T: Sample> Driver<T> for MockDriver<T> {
    fn start(&mut self) -> std::result::Result<(), DriverError> {
        let mut journal = lock(&self.journal);
        journal.calls.push(Call::Start);
        match journal.start_failure.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn stop(&mut self) -> std::result::Result<(), DriverError> {
        lock(&self.journal).calls.push(Call::Stop);
        Ok(())
    }

    fn read(&mut self, buf: &mut [T]) -> std::result::Result<(), DriverError> {
        let mut journal = lock(&self.journal);
        journal.calls.push(Call::Read(buf.len()));

        let width = T::FORMAT.bytes();
        if journal.capture_pattern.len() >= width {
            let pattern = journal.capture_pattern.clone();
            let mut chunks = pattern.chunks_exact(width).cycle();
            for sample in buf.iter_mut() {
                if let Some(chunk) = chunks.next() {
                    *sample = T::from_le_bytes(chunk);
                }
            }
        }

        journal.read_results.pop_front().unwrap_or(Ok(()))
    }

    fn write(&mut self, buf: &[T]) -> std::result::Result<(), DriverError> {
        let mut journal = lock(&self.journal);
        journal.calls.push(Call::Write(buf.len()));

        let width = T::FORMAT.bytes();
        let mut bytes = vec![0u8; buf.len() * width];
        for (sample, chunk) in buf.iter().zip(bytes.chunks_exact_mut(width)) {
            sample.write_le_bytes(chunk);
        }
        journal.written.push(bytes);

        journal.write_results.pop_front().unwrap_or(Ok(()))
    }
}

impl<T> Drop for MockDriver<T> {
    fn drop(&mut self) {
        lock(&self.journal).calls.push(Call::Release);
    }
}

/// In-memory host backed by a static catalog
pub struct MockHost {
    catalog: StaticCatalog,
    journal: Arc<Mutex<Journal>>,
    open_failure: Option<DriverError>,
}

impl MockHost {
    pub fn new(catalog: StaticCatalog) -> Self {
        Self {
            catalog,
            journal: Arc::new(Mutex::new(Journal::default())),
            open_failure: None,
        }
    }

    /// Host whose only device is the default output device
    pub fn with_output(device: Device) -> Self {
        let name = device.name.clone();
        Self::new(StaticCatalog::new(vec![device]).with_default_output(name))
    }

    pub fn journal(&self) -> Arc<Mutex<Journal>> {
        Arc::clone(&self.journal)
    }

    pub fn inspect(&self) -> MutexGuard<'_, Journal> {
        lock(&self.journal)
    }

    /// Reject every `open_channel`
    pub fn fail_open(mut self, reason: &str) -> Self {
        self.open_failure = Some(DriverError::Other(reason.to_string()));
        self
    }

    pub fn fail_start(self, reason: &str) -> Self {
        lock(&self.journal).start_failure = Some(DriverError::Other(reason.to_string()));
        self
    }

    /// Results for upcoming writes; later writes succeed
    pub fn script_writes(
        self,
        results: impl IntoIterator<Item = std::result::Result<(), DriverError>>,
    ) -> Self {
        lock(&self.journal).write_results.extend(results);
        self
    }

    /// Results for upcoming reads; later reads succeed
    pub fn script_reads(
        self,
        results: impl IntoIterator<Item = std::result::Result<(), DriverError>>,
    ) -> Self {
        lock(&self.journal).read_results.extend(results);
        self
    }

    /// Samples (as little-endian bytes) that reads fill buffers with
    pub fn capture_pattern(self, bytes: Vec<u8>) -> Self {
        lock(&self.journal).capture_pattern = bytes;
        self
    }
}

impl DeviceCatalog for MockHost {
    fn devices(&self) -> Result<Vec<Device>> {
        self.catalog.devices()
    }

    fn default_input_device(&self) -> Result<Device> {
        self.catalog.default_input_device()
    }

    fn default_output_device(&self) -> Result<Device> {
        self.catalog.default_output_device()
    }
}

impl AudioHost for MockHost {
    type Channel<T: Sample> = MockDriver<T>;

    fn open_channel<T: Sample>(
        &self,
        _negotiated: &Negotiated,
    ) -> std::result::Result<MockDriver<T>, DriverError> {
        if let Some(e) = &self.open_failure {
            return Err(e.clone());
        }
        lock(&self.journal).calls.push(Call::Open);
        Ok(MockDriver::new(self.journal()))
    }
}

fn device(name: &str, inputs: u16, outputs: u16, rate: f64) -> Device {
    let latency = |channels: u16, ms: u64| {
        if channels > 0 {
            Duration::from_millis(ms)
        } else {
            Duration::ZERO
        }
    };
    Device {
        name: name.to_string(),
        max_input_channels: inputs,
        max_output_channels: outputs,
        default_low_input_latency: latency(inputs, 5),
        default_high_input_latency: latency(inputs, 20),
        default_low_output_latency: latency(outputs, 5),
        default_high_output_latency: latency(outputs, 20),
        default_sample_rate: rate,
    }
}

pub fn output_only(name: &str, channels: u16, rate: f64) -> Device {
    device(name, 0, channels, rate)
}

pub fn input_only(name: &str, channels: u16, rate: f64) -> Device {
    device(name, channels, 0, rate)
}

pub fn duplex(name: &str, inputs: u16, outputs: u16, rate: f64) -> Device {
    device(name, inputs, outputs, rate)
}
