//! Error types for the set reconciliation core.

use thiserror::Error;

/// Errors raised by the pure computation layer.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A construction parameter is out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The linear system behind rational interpolation has no solution
    /// within the assumed degree bounds.
    #[error("interpolation failed: {0}")]
    InterpolationFailure(String),

    /// A polynomial is not a product of distinct linear factors.
    #[error("factorization failed: {0}")]
    FactorizationFailure(String),

    /// Division by an element with no inverse.
    #[error("element not invertible modulo the field prime")]
    NotInvertible,

    /// Two tables that must share a shape do not.
    #[error("table mismatch: {0}")]
    TableMismatch(String),

    /// A value does not fit in the configured value size.
    #[error("value of {bits} bits exceeds value size {max}")]
    ValueTooLarge { bits: u64, max: u64 },

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
