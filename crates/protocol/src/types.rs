use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Purpose of an uploaded order document.
///
/// Sent as the `fileType` multipart field; the backend uses it to pick the
/// temporary storage area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileKind {
    #[serde(rename = "picking_list")]
    PickingList,
    #[serde(rename = "invoice")]
    Invoice,
    #[serde(rename = "performa_pdf")]
    PerformaPdf,
}

impl FileKind {
    /// All kinds, in the order the order form lists them.
    pub const ALL: [FileKind; 3] = [FileKind::PerformaPdf, FileKind::PickingList, FileKind::Invoice];

    /// Returns the wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::PickingList => "picking_list",
            FileKind::Invoice => "invoice",
            FileKind::PerformaPdf => "performa_pdf",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown file kind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown file kind: {0}")]
pub struct ParseFileKindError(pub String);

impl FromStr for FileKind {
    type Err = ParseFileKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "picking_list" => Ok(FileKind::PickingList),
            "invoice" => Ok(FileKind::Invoice),
            "performa_pdf" => Ok(FileKind::PerformaPdf),
            other => Err(ParseFileKindError(other.to_string())),
        }
    }
}

/// Status carried by a progress event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UploadStatus {
    #[serde(rename = "uploading")]
    Uploading,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "error")]
    Error,
    #[serde(rename = "cancelled")]
    Cancelled,
}

impl UploadStatus {
    /// Returns `true` for `Completed`, `Error` and `Cancelled`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, UploadStatus::Uploading)
    }
}

/// Progress information for one chunked upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadProgress {
    pub upload_id: String,
    pub file_name: String,
    #[serde(rename = "fileType")]
    pub file_kind: FileKind,
    /// Bytes acknowledged by the server.
    #[serde(rename = "loaded")]
    pub loaded_bytes: u64,
    /// Total file size in bytes.
    #[serde(rename = "total")]
    pub total_bytes: u64,
    /// 0-100, rounded.
    pub percentage: u8,
    pub status: UploadStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Server-assigned temporary path, present only on completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_path: Option<String>,
}

impl UploadProgress {
    /// Computes the rounded percentage of `loaded` over `total`.
    pub fn percentage_of(loaded: u64, total: u64) -> u8 {
        if total == 0 {
            return 0;
        }
        let pct = (loaded as f64 / total as f64 * 100.0).round();
        pct.clamp(0.0, 100.0) as u8
    }

    /// Returns `true` if this is the last event of its upload.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
