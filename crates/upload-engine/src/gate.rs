//! One-upload-at-a-time admission control.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

/// Admits at most one active chunked upload across the slots of one form.
///
/// Admission hands out a [`GateTicket`]; dropping the ticket releases the
/// gate, so every exit path of the holder releases it exactly once.
#[derive(Debug, Clone, Default)]
pub struct ConcurrencyGate {
    holder: Arc<Mutex<Option<String>>>,
}

impl ConcurrencyGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tries to take the gate for `holder` (used in logs).
    ///
    /// Returns `None` without side effects while another ticket is alive.
    pub fn admit(&self, holder: impl Into<String>) -> Option<GateTicket> {
        let mut current = self.holder.lock().unwrap();
        if let Some(active) = current.as_deref() {
            warn!(active, "upload rejected: another upload is active");
            return None;
        }
        let holder = holder.into();
        debug!(holder = %holder, "upload gate acquired");
        *current = Some(holder);
        Some(GateTicket {
            holder: Arc::clone(&self.holder),
        })
    }

    /// Returns `true` while a ticket is held.
    pub fn is_busy(&self) -> bool {
        self.holder.lock().unwrap().is_some()
    }

    /// Name of the current holder, if any.
    pub fn active_holder(&self) -> Option<String> {
        self.holder.lock().unwrap().clone()
    }
}

/// Proof of admission. Releases the gate on drop.
#[derive(Debug)]
pub struct GateTicket {
    holder: Arc<Mutex<Option<String>>>,
}

impl Drop for GateTicket {
    fn drop(&mut self) {
        let released = self
            .holder
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(holder) = released {
            debug!(holder = %holder, "upload gate released");
        }
    }
}
