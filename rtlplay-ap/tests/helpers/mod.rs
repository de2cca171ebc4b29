//! Test helper modules for rtlplay-ap integration tests
//!
//! Provides reusable test infrastructure components:
//! - MockHost: in-memory device catalog that opens scripted drivers
//! - MockDriver: records every call and replays scripted driver results
//! - ChannelSource: byte producer fed from a channel, blocking when empty

#![allow(dead_code)]

pub mod byte_source;
pub mod mock_host;

// Re-export commonly used types
pub use byte_source::{pcm_bytes, ChannelSource};
pub use mock_host::{duplex, input_only, output_only, Call, Journal, MockDriver, MockHost};
