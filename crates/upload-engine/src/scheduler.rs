//! Sequential chunk scheduler.
//!
//! Drives one upload session from its first chunk to a terminal state:
//! reads a chunk, sends it, waits for the acknowledgment, reports progress
//! and moves on. At most one chunk is in flight at any time.

use std::sync::Arc;
use std::time::Duration;

use sice_protocol::{ChunkResponse, CompletedUpload};
use sice_transfer::{Chunk, ChunkPlan, ChunkSource, ProgressEmitter, UploadSession};
use sice_upload_client::{ChunkRequest, ChunkTransport, CleanupClient};
use tracing::{debug, error, info, warn};

use crate::cancel::CancellationController;
use crate::gate::GateTicket;

/// Upper bound for the best-effort server cleanup after a cancellation.
const CLEANUP_TIMEOUT: Duration = Duration::from_secs(30);

/// Terminal result of a scheduled upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Completed(CompletedUpload),
    Cancelled,
    Failed(String),
}

/// Everything the scheduler needs to drive one admitted upload.
pub struct UploadJob {
    pub session: Arc<UploadSession>,
    pub source: Box<dyn ChunkSource>,
    pub cancel: CancellationController,
    pub emitter: ProgressEmitter,
    /// Released before the session reaches a terminal state.
    pub ticket: GateTicket,
}

enum Step {
    Finished(String),
    Cancelled,
    Failed(String),
}

/// Sends a session's chunks strictly in order over a [`ChunkTransport`].
pub struct ChunkScheduler {
    transport: Arc<dyn ChunkTransport>,
    cleanup: Arc<dyn CleanupClient>,
}

impl ChunkScheduler {
    pub fn new(transport: Arc<dyn ChunkTransport>, cleanup: Arc<dyn CleanupClient>) -> Self {
        Self { transport, cleanup }
    }

    /// Runs the upload to a terminal state.
    ///
    /// Emits one progress event per acknowledged chunk and exactly one
    /// terminal event. On cancellation the server is asked to discard the
    /// upload once, after the terminal event.
    pub async fn run(&self, job: UploadJob) -> UploadOutcome {
        let UploadJob {
            session,
            source,
            cancel,
            emitter,
            ticket,
        } = job;

        info!(
            upload_id = session.upload_id(),
            file = session.file_name(),
            kind = %session.file_kind(),
            size = session.file_size(),
            chunks = session.total_chunks(),
            "upload started"
        );

        let step = self.transfer(&session, source, &cancel, &emitter).await;

        // The gate opens before the session turns terminal, so an observer
        // that sees a terminal state can always be admitted.
        drop(ticket);

        match step {
            Step::Finished(temp_path) => {
                if let Err(e) = session.complete(temp_path.clone()) {
                    let message = e.to_string();
                    session.fail(&message);
                    error!(upload_id = session.upload_id(), error = %message, "upload failed");
                    emitter.emit(session.progress());
                    return UploadOutcome::Failed(message);
                }
                info!(
                    upload_id = session.upload_id(),
                    temp_path = %temp_path,
                    "upload completed"
                );
                emitter.emit(session.progress());
                UploadOutcome::Completed(CompletedUpload {
                    file_kind: session.file_kind(),
                    temp_path,
                })
            }
            Step::Cancelled => {
                if session.cancel() {
                    info!(
                        upload_id = session.upload_id(),
                        acknowledged = session.next_chunk_index(),
                        "upload cancelled"
                    );
                    emitter.emit(session.progress());
                    self.discard_remote(session.upload_id()).await;
                }
                UploadOutcome::Cancelled
            }
            Step::Failed(message) => {
                session.fail(&message);
                error!(upload_id = session.upload_id(), error = %message, "upload failed");
                emitter.emit(session.progress());
                UploadOutcome::Failed(message)
            }
        }
    }

    async fn transfer(
        &self,
        session: &UploadSession,
        mut source: Box<dyn ChunkSource>,
        cancel: &CancellationController,
        emitter: &ProgressEmitter,
    ) -> Step {
        let plan = *session.plan();
        let transport = &self.transport;

        loop {
            if cancel.is_cancelled() {
                return Step::Cancelled;
            }

            let index = session.next_chunk_index();
            let upload_id = session.upload_id();

            // Reading and sending form a single cancellable exchange.
            let exchange = async move {
                let (source, chunk) = read_chunk(plan, source, index).await?;
                let request = ChunkRequest {
                    upload_id: upload_id.to_string(),
                    chunk_index: index,
                    total_chunks: plan.total_chunks(),
                    file_name: session.file_name().to_string(),
                    file_kind: session.file_kind(),
                    data: chunk.data,
                };
                match transport.send_chunk(request).await {
                    Ok(response) => Ok::<_, String>((source, response)),
                    Err(e) => {
                        warn!(upload_id, chunk = index, error = %e, "chunk request failed");
                        Err(e.to_string())
                    }
                }
            };

            let Some(result) = cancel.race(exchange).await else {
                debug!(upload_id, chunk = index, "in-flight chunk abandoned");
                return Step::Cancelled;
            };

            let response = match result {
                Ok((returned, response)) => {
                    source = returned;
                    response
                }
                Err(message) => return Step::Failed(message),
            };

            let last = plan.is_last(index);
            if response.completed && !last {
                return Step::Failed("server finalized upload before the last chunk".into());
            }

            let loaded = match session.acknowledge_chunk(index) {
                Ok(loaded) => loaded,
                Err(e) => return Step::Failed(e.to_string()),
            };
            debug!(
                upload_id,
                chunk = index,
                loaded,
                total = plan.file_size(),
                "chunk acknowledged"
            );
            emitter.emit(session.progress());

            if last {
                return finish(response, cancel);
            }
        }
    }

    /// Best-effort discard of server-side chunks. Failures are logged only.
    async fn discard_remote(&self, upload_id: &str) {
        match tokio::time::timeout(CLEANUP_TIMEOUT, self.cleanup.cancel_upload(upload_id)).await {
            Ok(Ok(())) => debug!(upload_id, "server discarded upload"),
            Ok(Err(e)) => warn!(upload_id, error = %e, "server cleanup failed"),
            Err(_) => warn!(upload_id, "server cleanup timed out"),
        }
    }
}

/// Reads chunk `index` on the blocking pool, handing the source back.
async fn read_chunk(
    plan: ChunkPlan,
    mut source: Box<dyn ChunkSource>,
    index: u32,
) -> Result<(Box<dyn ChunkSource>, Chunk), String> {
    let (source, chunk) = tokio::task::spawn_blocking(move || {
        let chunk = plan.read_chunk(source.as_mut(), index);
        (source, chunk)
    })
    .await
    .map_err(|e| format!("chunk read task failed: {e}"))?;
    match chunk {
        Ok(chunk) => Ok((source, chunk)),
        Err(e) => Err(format!("failed to read chunk {index}: {e}")),
    }
}

/// Interprets the acknowledgment of the last chunk.
fn finish(response: ChunkResponse, cancel: &CancellationController) -> Step {
    if !response.completed {
        return Step::Failed("server did not finalize upload after the last chunk".into());
    }
    let Some(temp_path) = response.temp_path.filter(|p| !p.trim().is_empty()) else {
        return Step::Failed("server completed upload without a temporary path".into());
    };
    if cancel.is_cancelled() {
        return Step::Cancelled;
    }
    Step::Finished(temp_path)
}
