//! Error types for reconciliation protocols.

use setrecon_channel::ChannelError;
use setrecon_core::{CoreError, Element};
use thiserror::Error;

/// Errors that can occur while reconciling.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The peers disagree on protocol or parameters. No element data was exchanged.
    #[error("parameter mismatch: {0}")]
    ParameterMismatch(String),

    /// Too few or inconsistent sample points to interpolate.
    #[error("interpolation failed: {0}")]
    InterpolationFailure(String),

    /// An interpolated polynomial did not split into distinct linear factors.
    #[error("factorization failed: {0}")]
    FactorizationFailure(String),

    /// Redundant sample points disagree with an interpolated result.
    #[error("checksum mismatch: {0}")]
    ChecksumMismatch(String),

    /// The element domain is exhausted or the element cannot be represented.
    #[error("capacity exceeded: {0}")]
    CapacityExceeded(String),

    /// IBLT peeling stalled. The recovered differences were still reported.
    #[error("peeling incomplete: recovered {recovered} differences")]
    PeelIncomplete { recovered: usize },

    /// Channel failure. The session must be abandoned.
    #[error("transport error: {0}")]
    Transport(#[from] ChannelError),

    /// Deleting an element that was never added.
    #[error("element not found: {0:?}")]
    NotFound(Element),

    /// Engine construction parameters are unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The peer sent something the protocol does not allow here.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// Other computation failures.
    #[error("core error: {0}")]
    Core(CoreError),
}

impl SyncError {
    /// Failures that more sample points or a finer partition may resolve.
    pub fn is_reconciliation_failure(&self) -> bool {
        matches!(
            self,
            SyncError::InterpolationFailure(_)
                | SyncError::FactorizationFailure(_)
                | SyncError::ChecksumMismatch(_)
        )
    }
}

impl From<CoreError> for SyncError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::InterpolationFailure(m) => SyncError::InterpolationFailure(m),
            CoreError::FactorizationFailure(m) => SyncError::FactorizationFailure(m),
            CoreError::InvalidParameter(m) => SyncError::InvalidConfig(m),
            CoreError::TableMismatch(m) => SyncError::ParameterMismatch(m),
            e @ CoreError::ValueTooLarge { .. } => SyncError::CapacityExceeded(e.to_string()),
            other => SyncError::Core(other),
        }
    }
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
