//! Multi-slot upload form.

use std::collections::HashMap;

use sice_protocol::{CompletedUpload, FileKind, UploadProgress};
use sice_transfer::UploadFile;
use tokio::sync::broadcast;
use tracing::info;

use crate::engine::UploadEngine;
use crate::error::EngineError;
use crate::slot::UploadSlot;

/// One upload slot per [`FileKind`], sharing one concurrency gate.
///
/// Selecting a new file for a slot replaces the previous upload only once
/// the new one has been admitted; a rejected selection leaves every slot
/// untouched.
pub struct UploadForm {
    engine: UploadEngine,
    slots: HashMap<FileKind, UploadSlot>,
}

impl UploadForm {
    pub fn new(engine: UploadEngine) -> Self {
        Self {
            engine,
            slots: HashMap::new(),
        }
    }

    /// Starts uploading `file` into the `kind` slot.
    ///
    /// Returns a receiver that sees every event of the new upload.
    pub fn select_file(
        &mut self,
        kind: FileKind,
        file: UploadFile,
    ) -> Result<broadcast::Receiver<UploadProgress>, EngineError> {
        let mut slot = self.engine.start(kind, file)?;
        let events = slot.take_progress().unwrap_or_else(|| slot.subscribe());
        if let Some(previous) = self.slots.insert(kind, slot) {
            info!(
                kind = %kind,
                replaced = previous.upload_id(),
                "file replaced"
            );
        }
        Ok(events)
    }

    /// Clears a slot, cancelling its upload if still running.
    pub fn remove_file(&mut self, kind: FileKind) -> bool {
        self.slots.remove(&kind).is_some()
    }

    /// Cancels the upload in `kind`'s slot. The slot keeps its cancelled
    /// upload until replaced or removed.
    pub fn cancel(&self, kind: FileKind) -> bool {
        self.slots.get(&kind).is_some_and(UploadSlot::cancel)
    }

    pub fn slot(&self, kind: FileKind) -> Option<&UploadSlot> {
        self.slots.get(&kind)
    }

    pub fn slot_mut(&mut self, kind: FileKind) -> Option<&mut UploadSlot> {
        self.slots.get_mut(&kind)
    }

    /// Returns `true` while any slot is uploading.
    pub fn is_uploading(&self) -> bool {
        self.engine.is_uploading()
    }

    /// Completed uploads, in slot order, for the record that references them.
    pub fn attachments(&self) -> Vec<CompletedUpload> {
        FileKind::ALL
            .iter()
            .filter_map(|kind| self.slots.get(kind))
            .filter_map(UploadSlot::completed_upload)
            .collect()
    }

    /// Tears the form down: running uploads are cancelled, completed ones
    /// are kept on the server.
    pub fn close(&mut self) {
        let running = self.slots.values().filter(|s| s.is_uploading()).count();
        if running > 0 {
            info!(running, "closing form with uploads in progress");
        }
        self.slots.clear();
    }
}
