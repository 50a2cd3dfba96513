//! Scripted transport and cleanup mocks shared by the engine tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sice_protocol::{ChunkResponse, FileKind, UploadProgress};
use sice_transfer::{ChunkSource, MemorySource, TransferError, UploadFile, UploadSession};
use sice_upload_client::{
    ChunkRequest, ChunkTransport, CleanupClient, TransportError, TransportFuture,
};
use tokio::sync::{Notify, broadcast};

use crate::cancel::CancellationController;

/// What the mock transport does for one chunk index.
pub enum Behavior {
    Fail(TransportError),
    Respond(ChunkResponse),
    /// Signals `started`, then waits for `release` before acknowledging.
    Hold {
        started: Arc<Notify>,
        release: Arc<Notify>,
    },
    /// Fires the controller while producing a normal acknowledgment.
    CancelThenRespond(CancellationController),
}

#[derive(Debug, Clone)]
pub struct SentChunk {
    pub upload_id: String,
    pub index: u32,
    pub total: u32,
    pub len: usize,
    pub kind: FileKind,
}

/// Acknowledges every chunk, finalizing on the last one, unless a
/// [`Behavior`] is scripted for its index.
#[derive(Default)]
pub struct MockTransport {
    sent: Mutex<Vec<SentChunk>>,
    script: Mutex<HashMap<u32, Behavior>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, index: u32, behavior: Behavior) {
        self.script.lock().unwrap().insert(index, behavior);
    }

    pub fn sent(&self) -> Vec<SentChunk> {
        self.sent.lock().unwrap().clone()
    }
}

impl ChunkTransport for MockTransport {
    fn send_chunk(&self, request: ChunkRequest) -> TransportFuture<'_, ChunkResponse> {
        Box::pin(async move {
            self.sent.lock().unwrap().push(SentChunk {
                upload_id: request.upload_id.clone(),
                index: request.chunk_index,
                total: request.total_chunks,
                len: request.data.len(),
                kind: request.file_kind,
            });

            let behavior = self.script.lock().unwrap().remove(&request.chunk_index);
            match behavior {
                Some(Behavior::Fail(err)) => return Err(err),
                Some(Behavior::Respond(response)) => return Ok(response),
                Some(Behavior::Hold { started, release }) => {
                    started.notify_one();
                    release.notified().await;
                }
                Some(Behavior::CancelThenRespond(cancel)) => {
                    cancel.cancel();
                }
                None => {}
            }
            Ok(default_response(&request))
        })
    }
}

fn default_response(request: &ChunkRequest) -> ChunkResponse {
    let received = u64::from(request.chunk_index) + 1;
    let completed = request.chunk_index + 1 == request.total_chunks;
    ChunkResponse {
        completed,
        temp_path: completed.then(|| format!("temp/{}.pdf", request.upload_id)),
        received: Some(received),
        total: Some(u64::from(request.total_chunks)),
        message: None,
    }
}

/// Records cleanup requests; optionally fails them.
#[derive(Default)]
pub struct MockCleanup {
    calls: Mutex<Vec<String>>,
    failure: Mutex<Option<TransportError>>,
    pub called: Notify,
}

impl MockCleanup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_with(&self, err: TransportError) {
        *self.failure.lock().unwrap() = Some(err);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Waits until at least one cleanup request was made.
    pub async fn wait_called(&self) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.calls().is_empty() {
                self.called.notified().await;
            }
        })
        .await
        .expect("cleanup was never requested");
    }
}

impl CleanupClient for MockCleanup {
    fn cancel_upload<'a>(&'a self, upload_id: &'a str) -> TransportFuture<'a, ()> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(upload_id.to_string());
            self.called.notify_one();
            match self.failure.lock().unwrap().take() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        })
    }
}

/// Source whose reads always fail.
pub struct FailingSource;

impl ChunkSource for FailingSource {
    fn read_range(&mut self, _range: std::ops::Range<u64>) -> Result<Vec<u8>, TransferError> {
        Err(TransferError::Io(std::io::Error::other("disk unplugged")))
    }
}

/// In-memory source that records the thread each read runs on.
pub struct ThreadRecordingSource {
    inner: MemorySource,
    pub threads: Arc<Mutex<Vec<std::thread::ThreadId>>>,
}

impl ThreadRecordingSource {
    pub fn new(size: u64) -> Self {
        Self {
            inner: MemorySource::new(vec![0x5a; size as usize]),
            threads: Arc::default(),
        }
    }
}

impl ChunkSource for ThreadRecordingSource {
    fn read_range(&mut self, range: std::ops::Range<u64>) -> Result<Vec<u8>, TransferError> {
        self.threads.lock().unwrap().push(std::thread::current().id());
        self.inner.read_range(range)
    }
}

pub fn file_of(size: u64) -> Box<dyn ChunkSource> {
    Box::new(MemorySource::new(vec![0x5a; size as usize]))
}

pub fn pdf(name: &str, size: u64) -> UploadFile {
    UploadFile::from_bytes(
        name,
        vec![0x25; size as usize],
        Some("application/pdf".to_string()),
    )
}

pub fn test_session(kind: FileKind, size: u64, chunk_size: u64) -> Arc<UploadSession> {
    Arc::new(
        UploadSession::new(
            uuid::Uuid::new_v4().to_string(),
            "doc.pdf".into(),
            kind,
            size,
            chunk_size,
        )
        .unwrap(),
    )
}

/// Collects events until the stream closes.
pub async fn drain(rx: &mut broadcast::Receiver<UploadProgress>) -> Vec<UploadProgress> {
    tokio::time::timeout(Duration::from_secs(5), async {
        let mut events = Vec::new();
        while let Ok(event) = rx.recv().await {
            events.push(event);
        }
        events
    })
    .await
    .expect("progress stream never closed")
}
