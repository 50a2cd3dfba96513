//! Transport seams used by the upload engine.

use std::future::Future;
use std::pin::Pin;

use sice_protocol::{ChunkResponse, FileKind};

use crate::error::TransportError;

/// Boxed future returned by transport operations.
pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, TransportError>> + Send + 'a>>;

/// One chunk of one upload, as sent to the backend.
#[derive(Debug, Clone)]
pub struct ChunkRequest {
    pub upload_id: String,
    pub chunk_index: u32,
    pub total_chunks: u32,
    pub file_name: String,
    pub file_kind: FileKind,
    pub data: Vec<u8>,
}

/// Sends single chunks and decodes the server's acknowledgment.
///
/// Implementations are stateless with respect to the upload: they never
/// track sessions, and they enforce the per-chunk timeout themselves.
pub trait ChunkTransport: Send + Sync {
    fn send_chunk(&self, request: ChunkRequest) -> TransportFuture<'_, ChunkResponse>;
}

/// Asks the backend to discard chunks persisted under an upload id.
pub trait CleanupClient: Send + Sync {
    fn cancel_upload<'a>(&'a self, upload_id: &'a str) -> TransportFuture<'a, ()>;
}
