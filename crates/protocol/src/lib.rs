pub mod constants;
pub mod messages;
pub mod types;

// Re-export primary types for convenience.
pub use constants::{
    ALLOWED_MIME_TYPES, CHUNK_UPLOAD_PATH, DEFAULT_ALLOWED_EXTENSIONS, DEFAULT_CHUNK_SIZE,
    DEFAULT_CHUNK_TIMEOUT, DEFAULT_MAX_FILE_SIZE_MB, GENERIC_MIME_TYPE, MIN_CHUNK_SIZE,
};
pub use messages::{ChunkResponse, CompletedUpload, ErrorBody};
pub use types::{FileKind, ParseFileKindError, UploadProgress, UploadStatus};
