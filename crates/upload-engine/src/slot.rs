//! Owner handle for one running or finished upload.

use std::sync::Arc;

use sice_protocol::{CompletedUpload, FileKind, UploadProgress};
use sice_transfer::{ProgressEmitter, SessionState, UploadSession};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::cancel::CancellationController;
use crate::scheduler::UploadOutcome;

/// One file-input slot's upload.
///
/// Dropping the slot while the upload is still running cancels it, which
/// also asks the server to discard the chunks sent so far. A completed
/// upload is left alone.
pub struct UploadSlot {
    kind: FileKind,
    session: Arc<UploadSession>,
    cancel: CancellationController,
    emitter: ProgressEmitter,
    events: Option<broadcast::Receiver<UploadProgress>>,
    driver: Option<JoinHandle<UploadOutcome>>,
}

impl UploadSlot {
    pub(crate) fn new(
        kind: FileKind,
        session: Arc<UploadSession>,
        cancel: CancellationController,
        emitter: ProgressEmitter,
        events: broadcast::Receiver<UploadProgress>,
        driver: JoinHandle<UploadOutcome>,
    ) -> Self {
        Self {
            kind,
            session,
            cancel,
            emitter,
            events: Some(events),
            driver: Some(driver),
        }
    }

    pub fn kind(&self) -> FileKind {
        self.kind
    }

    pub fn upload_id(&self) -> &str {
        self.session.upload_id()
    }

    pub fn file_name(&self) -> &str {
        self.session.file_name()
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn is_uploading(&self) -> bool {
        self.session.is_active()
    }

    /// Latest progress snapshot.
    pub fn progress(&self) -> UploadProgress {
        self.session.progress()
    }

    /// Takes the receiver subscribed before the first chunk was sent.
    ///
    /// It sees every event of the upload. Can only be called once.
    pub fn take_progress(&mut self) -> Option<broadcast::Receiver<UploadProgress>> {
        self.events.take()
    }

    /// Subscribes to events emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<UploadProgress> {
        self.emitter.subscribe()
    }

    /// Requests cancellation. Returns `false` if the upload already reached
    /// a terminal state or was already cancelled.
    pub fn cancel(&self) -> bool {
        if !self.session.is_active() {
            return false;
        }
        self.cancel.cancel()
    }

    /// The server-side result, once completed.
    pub fn completed_upload(&self) -> Option<CompletedUpload> {
        self.session.result_path().map(|temp_path| CompletedUpload {
            file_kind: self.kind,
            temp_path,
        })
    }

    /// Waits for the upload to reach a terminal state.
    pub async fn wait(&mut self) -> UploadOutcome {
        if let Some(driver) = self.driver.take() {
            return driver
                .await
                .unwrap_or_else(|e| UploadOutcome::Failed(format!("upload task failed: {e}")));
        }
        match self.session.state() {
            SessionState::Completed { temp_path } => UploadOutcome::Completed(CompletedUpload {
                file_kind: self.kind,
                temp_path,
            }),
            SessionState::Failed { error } => UploadOutcome::Failed(error),
            SessionState::Cancelled | SessionState::Uploading => UploadOutcome::Cancelled,
        }
    }
}

impl Drop for UploadSlot {
    fn drop(&mut self) {
        // The driver task keeps running detached so it can clean up.
        if self.session.is_active() && self.cancel.cancel() {
            debug!(
                upload_id = self.session.upload_id(),
                kind = %self.kind,
                "slot dropped mid-upload, cancelling"
            );
        }
    }
}

impl std::fmt::Debug for UploadSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadSlot")
            .field("kind", &self.kind)
            .field("upload_id", &self.session.upload_id())
            .field("state", &self.session.state())
            .finish_non_exhaustive()
    }
}
