//! Error types for channels.

use thiserror::Error;

/// Errors that can occur while moving bytes between peers.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The peer closed the channel, or it was closed locally.
    #[error("channel closed")]
    Closed,

    /// Underlying I/O failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Connecting gave up after the configured number of attempts.
    #[error("could not connect to {addr} after {attempts} attempts: {reason}")]
    ConnectFailed {
        addr: String,
        attempts: u32,
        reason: String,
    },

    /// A length prefix exceeds the allowed maximum.
    #[error("{what} of length {len} exceeds limit {max}")]
    TooLarge {
        what: &'static str,
        len: u64,
        max: u64,
    },

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),
}

/// Result type for channel operations.
pub type Result<T> = std::result::Result<T, ChannelError>;
