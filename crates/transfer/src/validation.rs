use std::path::{Component, Path};

use sice_protocol::{
    ALLOWED_MIME_TYPES, DEFAULT_ALLOWED_EXTENSIONS, DEFAULT_MAX_FILE_SIZE_MB, GENERIC_MIME_TYPE,
};

use crate::types::UploadFile;

/// Pre-flight rejection of a selected file. No session is created.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid file name: {0}")]
    InvalidName(String),

    #[error("file is empty")]
    Empty,

    #[error("file exceeds the maximum allowed size of {max_mb}MB")]
    TooLarge { size: u64, max_mb: u64 },

    #[error("extension not allowed, only {} are accepted", .allowed.join(", "))]
    ExtensionNotAllowed {
        extension: Option<String>,
        allowed: Vec<String>,
    },

    #[error("invalid file type {0}, the file must be PDF, XLS or XLSX")]
    MimeNotAllowed(String),
}

/// File acceptance policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationPolicy {
    pub max_file_size_mb: u64,
    /// Lowercase extensions without the leading dot.
    pub allowed_extensions: Vec<String>,
    pub allowed_mime_types: Vec<String>,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            max_file_size_mb: DEFAULT_MAX_FILE_SIZE_MB,
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
            allowed_mime_types: ALLOWED_MIME_TYPES.iter().map(|m| m.to_string()).collect(),
        }
    }
}

impl ValidationPolicy {
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }
}

/// Validates that a file name is a single, non-empty path component.
///
/// Rejects:
/// - Empty names
/// - Any separator (`/` or `\`) or absolute prefix
/// - `.` and `..`
pub fn validate_file_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::InvalidName("empty name".into()));
    }
    if name.contains(['/', '\\']) {
        return Err(ValidationError::InvalidName(format!(
            "path separators not allowed: {name}"
        )));
    }

    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(ValidationError::InvalidName(format!(
            "not a plain file name: {name}"
        ))),
    }
}

/// Checks a file against `policy` before any network call.
///
/// The MIME check only applies when the file reports a specific type;
/// an absent or generic (`application/octet-stream`) type is accepted.
pub fn validate_file(file: &UploadFile, policy: &ValidationPolicy) -> Result<(), ValidationError> {
    validate_file_name(file.name())?;

    if file.size() == 0 {
        return Err(ValidationError::Empty);
    }
    if file.size() > policy.max_file_size_bytes() {
        return Err(ValidationError::TooLarge {
            size: file.size(),
            max_mb: policy.max_file_size_mb,
        });
    }

    let extension = file
        .name()
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty());
    let allowed = extension
        .as_ref()
        .is_some_and(|ext| policy.allowed_extensions.iter().any(|a| a == ext));
    if !allowed {
        return Err(ValidationError::ExtensionNotAllowed {
            extension,
            allowed: policy.allowed_extensions.clone(),
        });
    }

    if let Some(mime) = file.mime_type()
        && !mime.is_empty()
        && mime != GENERIC_MIME_TYPE
        && !policy.allowed_mime_types.iter().any(|m| m == mime)
    {
        return Err(ValidationError::MimeNotAllowed(mime.to_string()));
    }

    Ok(())
}
