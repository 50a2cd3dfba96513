//! Per-upload cancellation signal.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;

/// Single-fire cancellation for one upload session.
///
/// Cancellation is distinct from completion: a finished upload is never
/// cancelled, the owner checks the session state first.
#[derive(Debug, Clone, Default)]
pub struct CancellationController {
    token: CancellationToken,
    fired: Arc<AtomicBool>,
}

impl CancellationController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires the signal. Idempotent; returns `true` only on the first call.
    pub fn cancel(&self) -> bool {
        let first = !self.fired.swap(true, Ordering::AcqRel);
        self.token.cancel();
        first
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the signal has fired.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// Runs `fut` unless cancellation fires first.
    ///
    /// Returns `None` if the signal fired before `fut` settled, or while its
    /// output was being produced; that output is discarded.
    pub async fn race<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            out = fut => {
                if self.token.is_cancelled() {
                    None
                } else {
                    Some(out)
                }
            }
        }
    }
}
