//! rtl_fm demodulator: process control and sample stream decoding

pub mod frame;
pub mod frequency;
pub mod process;

pub use frame::FrameReader;
pub use frequency::Frequency;
pub use process::{arguments, RtlFm, TunerOptions};
