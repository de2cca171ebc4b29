//! Playback: cancellation, the streaming loop and session lifecycle

pub mod cancel;
pub mod session;
pub mod stream_loop;

pub use cancel::CancelToken;
pub use session::run_session;
pub use stream_loop::{run_loop, LoopStats};
