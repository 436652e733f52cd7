//! Error types for the facade.

use std::path::PathBuf;

use setrecon_channel::ChannelError;
use setrecon_core::CoreError;
use setrecon_sync::SyncError;
use thiserror::Error;

/// Errors loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The JSON did not describe a valid configuration.
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors from any layer.
#[derive(Debug, Error)]
pub enum Error {
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// The log filter was malformed or a subscriber is already installed.
    #[error("logging setup failed: {0}")]
    Logging(String),
}

/// Result type for facade operations.
pub type Result<T> = std::result::Result<T, Error>;
