use std::time::Duration;

/// Path (relative to the API base URL) of the chunk upload endpoint.
///
/// `POST` sends one chunk; `DELETE {path}/{uploadId}` discards partial chunks.
pub const CHUNK_UPLOAD_PATH: &str = "/upload/chunk";

/// Multipart field names of a chunk upload request.
pub mod fields {
    pub const CHUNK: &str = "chunk";
    pub const CHUNK_INDEX: &str = "chunkIndex";
    pub const TOTAL_CHUNKS: &str = "totalChunks";
    pub const FILE_NAME: &str = "fileName";
    pub const UPLOAD_ID: &str = "uploadId";
    pub const FILE_TYPE: &str = "fileType";
}

/// Default chunk size: 1.5 MiB.
///
/// The backend rejects request bodies above 2 MiB, so a chunk plus its
/// multipart framing must stay below that.
pub const DEFAULT_CHUNK_SIZE: u64 = 1_572_864;

/// Smallest chunk size an engine accepts: 64 KiB.
pub const MIN_CHUNK_SIZE: u64 = 64 * 1024;

/// Time allowed for a single chunk request to settle.
pub const DEFAULT_CHUNK_TIMEOUT: Duration = Duration::from_secs(300);

/// Maximum accepted file size in MiB.
pub const DEFAULT_MAX_FILE_SIZE_MB: u64 = 250;

/// File extensions accepted for order documents.
pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &["pdf", "xlsx", "xls"];

/// MIME type reported for content whose type is unknown.
pub const GENERIC_MIME_TYPE: &str = "application/octet-stream";

/// MIME types accepted when a file reports a specific type.
pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/vnd.ms-excel.sheet.macroEnabled.12",
    GENERIC_MIME_TYPE,
];
