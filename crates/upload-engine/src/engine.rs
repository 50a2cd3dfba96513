//! Upload admission and startup.

use std::sync::Arc;

use sice_protocol::FileKind;
use sice_transfer::{ProgressEmitter, UploadFile, UploadSession, validate_file};
use sice_upload_client::{ChunkTransport, CleanupClient};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cancel::CancellationController;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::gate::ConcurrencyGate;
use crate::scheduler::{ChunkScheduler, UploadJob};
use crate::slot::UploadSlot;

/// Upper bound on buffered progress events per upload.
const MAX_EVENT_BUFFER: usize = 4096;

/// Room for every chunk event plus the terminal one, within
/// [`MAX_EVENT_BUFFER`]. Past the bound a slow receiver sees `Lagged`.
fn event_capacity(total_chunks: u32) -> usize {
    (total_chunks as usize)
        .saturating_add(2)
        .clamp(16, MAX_EVENT_BUFFER)
}

/// Starts chunked uploads, one at a time.
///
/// Clones share the same [`ConcurrencyGate`]. Build one engine per form so
/// that separate forms do not block each other.
#[derive(Clone)]
pub struct UploadEngine {
    config: Arc<EngineConfig>,
    gate: ConcurrencyGate,
    scheduler: Arc<ChunkScheduler>,
}

impl UploadEngine {
    pub fn new(
        config: EngineConfig,
        transport: Arc<dyn ChunkTransport>,
        cleanup: Arc<dyn CleanupClient>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            gate: ConcurrencyGate::new(),
            scheduler: Arc::new(ChunkScheduler::new(transport, cleanup)),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn gate(&self) -> &ConcurrencyGate {
        &self.gate
    }

    /// Returns `true` while an upload holds the gate.
    pub fn is_uploading(&self) -> bool {
        self.gate.is_busy()
    }

    /// Validates `file` and, if no other upload is active, starts sending it.
    ///
    /// Rejections happen before any upload id exists and before any network
    /// call. Must be called from within a Tokio runtime.
    pub fn start(&self, kind: FileKind, file: UploadFile) -> Result<UploadSlot, EngineError> {
        if let Err(e) = validate_file(&file, &self.config.validation) {
            warn!(file = file.name(), kind = %kind, error = %e, "file rejected");
            return Err(e.into());
        }

        let ticket = self
            .gate
            .admit(kind.as_str())
            .ok_or(EngineError::ConcurrencyRejected)?;

        let upload_id = Uuid::new_v4().to_string();
        let session = Arc::new(UploadSession::new(
            upload_id,
            file.name().to_string(),
            kind,
            file.size(),
            self.config.chunk_size,
        )?);

        let emitter = ProgressEmitter::new(Some(event_capacity(session.total_chunks())));
        let events = emitter.subscribe();
        let cancel = CancellationController::new();

        debug!(
            upload_id = session.upload_id(),
            kind = %kind,
            chunks = session.total_chunks(),
            "upload admitted"
        );

        let job = UploadJob {
            session: Arc::clone(&session),
            source: file.into_source(),
            cancel: cancel.clone(),
            emitter: emitter.clone(),
            ticket,
        };
        let scheduler = Arc::clone(&self.scheduler);
        let driver = tokio::spawn(async move { scheduler.run(job).await });

        Ok(UploadSlot::new(kind, session, cancel, emitter, events, driver))
    }
}
