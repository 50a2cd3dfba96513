//! Chunk planning, upload session state and progress events.
//!
//! Everything here is transport-agnostic: the upload engine combines these
//! pieces with an HTTP transport to move one file to the backend.

mod chunked;
mod progress;
mod types;
mod validation;

pub use chunked::{Chunk, ChunkPlan, ChunkReader, ChunkSource, MemorySource};
pub use progress::{ProgressEmitter, SpeedCalculator};
pub use types::{SessionState, UploadFile, UploadSession};
pub use validation::{ValidationError, ValidationPolicy, validate_file, validate_file_name};

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid chunk size: {0}")]
    InvalidChunkSize(u64),

    #[error("chunk {index} out of range (total {total})")]
    ChunkOutOfRange { index: u32, total: u32 },

    #[error("chunk {got} acknowledged out of order (expected {expected})")]
    ChunkOutOfOrder { expected: u32, got: u32 },

    #[error("session not active: {0}")]
    SessionNotActive(String),

    #[error("transfer incomplete: {acknowledged}/{total} chunks acknowledged")]
    IncompleteTransfer { acknowledged: u32, total: u32 },
}
