//! Sequential chunked upload engine.
//!
//! Moves one file at a time to the backend, one chunk per request, and
//! reports progress as a stream of events. A library crate with no UI: the
//! caller supplies a [`ChunkTransport`](sice_upload_client::ChunkTransport)
//! and a [`CleanupClient`](sice_upload_client::CleanupClient).
//!
//! # Flow
//!
//! 1. **Validate** the selected file (name, size, extension, MIME type)
//! 2. **Admit** it through the form's [`ConcurrencyGate`]
//! 3. **Send** chunks in order, waiting for each acknowledgment
//! 4. **Finish** with the server's temporary path, or fail, or cancel and
//!    ask the server to discard what it received

pub mod cancel;
pub mod config;
pub mod engine;
pub mod error;
pub mod form;
pub mod gate;
pub mod scheduler;
pub mod slot;

#[cfg(test)]
mod testing;

pub use cancel::CancellationController;
pub use config::EngineConfig;
pub use engine::UploadEngine;
pub use error::EngineError;
pub use form::UploadForm;
pub use gate::{ConcurrencyGate, GateTicket};
pub use scheduler::{ChunkScheduler, UploadJob, UploadOutcome};
pub use slot::UploadSlot;
