//! Wire protocol for the key-value server.
//!
//! A recursive, line-oriented protocol in the spirit of the Redis wire
//! format: every request and reply is a self-describing `Frame`, decoded and
//! encoded by [`FrameCodec`] over a length-delimited byte stream.

pub mod frame;

pub use frame::{Frame, FrameCodec, FrameError};

use thiserror::Error;

/// Errors surfaced above the codec layer — a thin wrapper so callers in
/// `server` and `dispatch` only need to match one error type per connection.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
