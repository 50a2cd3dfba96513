//! Application orchestrator: wires the HTTP client, engine and form together.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use sice_protocol::{FileKind, UploadProgress, UploadStatus};
use sice_transfer::{SpeedCalculator, UploadFile};
use sice_upload_client::Client;
use sice_upload_engine::{UploadEngine, UploadForm, UploadOutcome};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use crate::config::Config;

pub const USAGE: &str = "usage: sice-uploader <kind>=<path> [<kind>=<path> ...]\n\
    kinds: picking_list, invoice, performa_pdf";

/// One file to upload into one form slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub kind: FileKind,
    pub path: PathBuf,
}

/// Parses `<kind>=<path>` arguments. Each kind may appear once.
pub fn parse_args(args: impl Iterator<Item = String>) -> anyhow::Result<Vec<Job>> {
    let mut jobs: Vec<Job> = Vec::new();
    for arg in args {
        let (kind, path) = arg
            .split_once('=')
            .with_context(|| format!("expected <kind>=<path>, got {arg:?}"))?;
        let kind: FileKind = kind.parse()?;
        if path.is_empty() {
            anyhow::bail!("missing path for {kind}");
        }
        if jobs.iter().any(|j| j.kind == kind) {
            anyhow::bail!("{kind} given more than once");
        }
        jobs.push(Job {
            kind,
            path: PathBuf::from(path),
        });
    }
    if jobs.is_empty() {
        anyhow::bail!("no files given");
    }
    Ok(jobs)
}

/// Uploads every job in order, then prints the attachments as JSON.
///
/// Ctrl-C cancels the running upload, waits for the server cleanup and
/// stops. Uploads that already completed are still reported.
pub async fn run(config: Config, jobs: Vec<Job>) -> anyhow::Result<()> {
    let client = Arc::new(
        Client::new(&config.api_url, config.auth_token.as_deref())?
            .with_chunk_timeout(config.chunk_timeout()),
    );
    let engine = UploadEngine::new(config.engine_config(), client.clone(), client)?;
    let mut form = UploadForm::new(engine);

    let mut failed = 0usize;
    let mut interrupted = false;

    for job in jobs {
        let file = tokio::task::spawn_blocking({
            let path = job.path.clone();
            move || UploadFile::open(&path)
        })
        .await
        .context("file open task failed")?
        .with_context(|| format!("cannot open {}", job.path.display()))?;

        let mut events = match form.select_file(job.kind, file) {
            Ok(events) => events,
            Err(e) => {
                tracing::error!(kind = %job.kind, path = %job.path.display(), "{e}");
                failed += 1;
                continue;
            }
        };

        let speed = SpeedCalculator::default();
        tokio::select! {
            _ = report_progress(&mut events, &speed) => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown signal received");
                interrupted = true;
                form.cancel(job.kind);
            }
        }

        let Some(slot) = form.slot_mut(job.kind) else {
            continue;
        };
        match slot.wait().await {
            UploadOutcome::Completed(done) => {
                tracing::info!(kind = %done.file_kind, temp_path = %done.temp_path, "file uploaded");
            }
            UploadOutcome::Failed(error) => {
                tracing::error!(kind = %job.kind, error = %error, "upload failed");
                failed += 1;
            }
            UploadOutcome::Cancelled => {
                tracing::warn!(kind = %job.kind, "upload cancelled");
            }
        }

        if interrupted {
            break;
        }
    }

    let attachments = form.attachments();
    form.close();
    println!("{}", serde_json::to_string_pretty(&attachments)?);

    if interrupted {
        anyhow::bail!("interrupted");
    }
    if failed > 0 {
        anyhow::bail!("{failed} upload(s) failed");
    }
    Ok(())
}

/// Logs progress events until the terminal one.
async fn report_progress(
    events: &mut broadcast::Receiver<UploadProgress>,
    speed: &SpeedCalculator,
) {
    loop {
        match events.recv().await {
            Ok(event) if event.status == UploadStatus::Uploading => {
                speed.record(event.loaded_bytes);
                let remaining = event.total_bytes.saturating_sub(event.loaded_bytes);
                tracing::info!(
                    file = %event.file_name,
                    percentage = event.percentage,
                    kib_per_sec = (speed.bytes_per_second() / 1024.0).round(),
                    eta_secs = speed.eta(remaining).map(|d| d.as_secs()),
                    "uploading"
                );
            }
            Ok(_) => return,
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "progress reporter lagged");
            }
            Err(RecvError::Closed) => return,
        }
    }
}
