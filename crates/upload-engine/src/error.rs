//! Engine error types.

use sice_transfer::{TransferError, ValidationError};

/// Synchronous rejections from starting an upload.
///
/// Failures after an upload has started are reported through its progress
/// stream, never as an `EngineError`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("another upload is in progress, wait for it to finish or cancel it")]
    ConcurrencyRejected,

    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
