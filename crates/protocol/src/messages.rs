use serde::{Deserialize, Serialize};

use crate::types::FileKind;

// ---------------------------------------------------------------------------
// Response payloads
// ---------------------------------------------------------------------------

/// Response to a chunk upload request.
///
/// Only the response to the last chunk has `completed == true`, and only
/// that response carries `temp_path`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkResponse {
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_path: Option<String>,
    /// Number of chunks the server holds for this upload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received: Option<u64>,
    /// Number of chunks the server expects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Error body returned by the backend on non-2xx responses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// ---------------------------------------------------------------------------
// Handoff
// ---------------------------------------------------------------------------

/// A finished transfer, handed to the order form for submission.
///
/// The backend moves `temp_path` to its permanent location when the order
/// create/update request referencing it is committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedUpload {
    #[serde(rename = "fileType")]
    pub file_kind: FileKind,
    pub temp_path: String,
}
