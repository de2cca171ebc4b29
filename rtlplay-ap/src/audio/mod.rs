//! Audio device access
//!
//! Device discovery, stream negotiation, the blocking stream wrapper and
//! the cpal backend behind it.

pub mod cpal_host;
pub mod device;
pub mod driver;
pub mod negotiate;
pub mod pool;
pub mod sample;
pub mod stream;

pub use cpal_host::{CpalChannel, CpalHost};
pub use device::{Device, DeviceCatalog, Direction, StaticCatalog};
pub use driver::{AudioHost, Driver, DriverError};
pub use negotiate::{negotiate, DeviceSelection, Negotiated, StreamConfig, StreamRequest};
pub use pool::{Frame, FramePool};
pub use sample::{Sample, SampleFormat, I24};
pub use stream::{AudioStream, Captured, StreamState};
