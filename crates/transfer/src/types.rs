use std::path::Path;
use std::sync::RwLock;

use sice_protocol::{FileKind, UploadProgress, UploadStatus};

use crate::TransferError;
use crate::chunked::{ChunkPlan, ChunkReader, ChunkSource, MemorySource};

// ---------------------------------------------------------------------------
// UploadFile
// ---------------------------------------------------------------------------

/// A file selected for upload: its metadata plus a readable source.
pub struct UploadFile {
    name: String,
    size: u64,
    mime_type: Option<String>,
    source: Box<dyn ChunkSource>,
}

impl UploadFile {
    /// Opens a file on disk.
    ///
    /// The MIME type comes from the extension. Content sniffing is used
    /// only when the extension maps to no type; unknown content leaves it
    /// unset.
    pub fn open(path: &Path) -> Result<Self, TransferError> {
        let reader = ChunkReader::new(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mime_type = match mime_guess::from_path(path).first_raw() {
            Some(mime) => Some(mime.to_string()),
            None => infer::get_from_path(path)?.map(|t| t.mime_type().to_string()),
        };
        Ok(Self {
            name,
            size: reader.file_size(),
            mime_type,
            source: Box::new(reader),
        })
    }

    /// Wraps an in-memory buffer.
    pub fn from_bytes(name: impl Into<String>, data: Vec<u8>, mime_type: Option<String>) -> Self {
        let source = MemorySource::new(data);
        Self {
            name: name.into(),
            size: source.len(),
            mime_type,
            source: Box::new(source),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    /// Consumes the file, returning its byte source.
    pub fn into_source(self) -> Box<dyn ChunkSource> {
        self.source
    }
}

impl std::fmt::Debug for UploadFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadFile")
            .field("name", &self.name)
            .field("size", &self.size)
            .field("mime_type", &self.mime_type)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// UploadSession
// ---------------------------------------------------------------------------

/// Lifecycle state of an upload session.
///
/// Starts at `Uploading` and moves exactly once to a terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Uploading,
    Completed { temp_path: String },
    Cancelled,
    Failed { error: String },
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionState::Uploading)
    }

    /// Status reported in progress events.
    pub fn status(&self) -> UploadStatus {
        match self {
            SessionState::Uploading => UploadStatus::Uploading,
            SessionState::Completed { .. } => UploadStatus::Completed,
            SessionState::Cancelled => UploadStatus::Cancelled,
            SessionState::Failed { .. } => UploadStatus::Error,
        }
    }
}

/// Tracks one file's chunked transfer (thread-safe).
pub struct UploadSession {
    upload_id: String,
    file_name: String,
    file_kind: FileKind,
    plan: ChunkPlan,
    inner: RwLock<SessionInner>,
}

struct SessionInner {
    next_chunk_index: u32,
    state: SessionState,
}

impl UploadSession {
    /// Creates a session in the `Uploading` state.
    pub fn new(
        upload_id: String,
        file_name: String,
        file_kind: FileKind,
        file_size: u64,
        chunk_size: u64,
    ) -> Result<Self, TransferError> {
        let plan = ChunkPlan::new(file_size, chunk_size)?;
        Ok(Self {
            upload_id,
            file_name,
            file_kind,
            plan,
            inner: RwLock::new(SessionInner {
                next_chunk_index: 0,
                state: SessionState::Uploading,
            }),
        })
    }

    /// Records the server's acknowledgment of chunk `index`.
    ///
    /// Chunks must be acknowledged strictly in order. Returns the number of
    /// bytes acknowledged so far.
    pub fn acknowledge_chunk(&self, index: u32) -> Result<u64, TransferError> {
        let mut s = self.inner.write().unwrap();
        if s.state.is_terminal() {
            return Err(TransferError::SessionNotActive(self.upload_id.clone()));
        }
        if index >= self.plan.total_chunks() {
            return Err(TransferError::ChunkOutOfRange {
                index,
                total: self.plan.total_chunks(),
            });
        }
        if index != s.next_chunk_index {
            return Err(TransferError::ChunkOutOfOrder {
                expected: s.next_chunk_index,
                got: index,
            });
        }
        s.next_chunk_index += 1;
        Ok(self.plan.bytes_through(s.next_chunk_index))
    }

    /// Moves to `Completed`.
    ///
    /// Only legal once every chunk has been acknowledged.
    pub fn complete(&self, temp_path: String) -> Result<(), TransferError> {
        let mut s = self.inner.write().unwrap();
        if s.state.is_terminal() {
            return Err(TransferError::SessionNotActive(self.upload_id.clone()));
        }
        if s.next_chunk_index != self.plan.total_chunks() {
            return Err(TransferError::IncompleteTransfer {
                acknowledged: s.next_chunk_index,
                total: self.plan.total_chunks(),
            });
        }
        s.state = SessionState::Completed { temp_path };
        Ok(())
    }

    /// Moves to `Cancelled`. Returns `false` if already terminal.
    pub fn cancel(&self) -> bool {
        let mut s = self.inner.write().unwrap();
        if s.state.is_terminal() {
            return false;
        }
        s.state = SessionState::Cancelled;
        true
    }

    /// Moves to `Failed`. Returns `false` if already terminal.
    pub fn fail(&self, error: &str) -> bool {
        let mut s = self.inner.write().unwrap();
        if s.state.is_terminal() {
            return false;
        }
        s.state = SessionState::Failed {
            error: error.to_string(),
        };
        true
    }

    /// Returns a progress snapshot.
    pub fn progress(&self) -> UploadProgress {
        let s = self.inner.read().unwrap();
        let total = self.plan.file_size();
        let loaded = self.plan.bytes_through(s.next_chunk_index);
        let (percentage, error, temp_path) = match &s.state {
            SessionState::Completed { temp_path } => (100, None, Some(temp_path.clone())),
            SessionState::Failed { error } => (
                UploadProgress::percentage_of(loaded, total),
                Some(error.clone()),
                None,
            ),
            _ => (UploadProgress::percentage_of(loaded, total), None, None),
        };
        UploadProgress {
            upload_id: self.upload_id.clone(),
            file_name: self.file_name.clone(),
            file_kind: self.file_kind,
            loaded_bytes: loaded,
            total_bytes: total,
            percentage,
            status: s.state.status(),
            error,
            temp_path,
        }
    }

    /// Returns `true` while the session is `Uploading`.
    pub fn is_active(&self) -> bool {
        let s = self.inner.read().unwrap();
        !s.state.is_terminal()
    }

    pub fn state(&self) -> SessionState {
        let s = self.inner.read().unwrap();
        s.state.clone()
    }

    /// Server-assigned temporary path; set only once `Completed`.
    pub fn result_path(&self) -> Option<String> {
        let s = self.inner.read().unwrap();
        match &s.state {
            SessionState::Completed { temp_path } => Some(temp_path.clone()),
            _ => None,
        }
    }

    /// Failure reason; set only once `Failed`.
    pub fn last_error(&self) -> Option<String> {
        let s = self.inner.read().unwrap();
        match &s.state {
            SessionState::Failed { error } => Some(error.clone()),
            _ => None,
        }
    }

    pub fn next_chunk_index(&self) -> u32 {
        let s = self.inner.read().unwrap();
        s.next_chunk_index
    }

    pub fn upload_id(&self) -> &str {
        &self.upload_id
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn file_kind(&self) -> FileKind {
        self.file_kind
    }

    pub fn file_size(&self) -> u64 {
        self.plan.file_size()
    }

    pub fn chunk_size(&self) -> u64 {
        self.plan.chunk_size()
    }

    pub fn total_chunks(&self) -> u32 {
        self.plan.total_chunks()
    }

    pub fn plan(&self) -> &ChunkPlan {
        &self.plan
    }
}
