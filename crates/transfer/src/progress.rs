use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use sice_protocol::UploadProgress;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Default event buffer per subscriber.
const DEFAULT_CAPACITY: usize = 64;

// ---------------------------------------------------------------------------
// ProgressEmitter
// ---------------------------------------------------------------------------

/// Push-based, multi-subscriber progress stream for one upload.
///
/// Events are broadcast in emission order. Late subscribers only see events
/// emitted after they subscribed. Once a terminal event has been emitted the
/// stream closes: receivers drain the buffered events and then observe
/// `RecvError::Closed`.
#[derive(Clone)]
pub struct ProgressEmitter {
    inner: Arc<Mutex<EmitterInner>>,
}

struct EmitterInner {
    tx: Option<broadcast::Sender<UploadProgress>>,
    last_loaded: Option<u64>,
}

impl Default for ProgressEmitter {
    fn default() -> Self {
        Self::new(None)
    }
}

impl ProgressEmitter {
    /// Creates an emitter buffering up to `capacity` events per subscriber.
    ///
    /// If `capacity` is `None`, defaults to 64.
    pub fn new(capacity: Option<usize>) -> Self {
        let (tx, _) = broadcast::channel(capacity.unwrap_or(DEFAULT_CAPACITY).max(1));
        Self {
            inner: Arc::new(Mutex::new(EmitterInner {
                tx: Some(tx),
                last_loaded: None,
            })),
        }
    }

    /// Subscribes to future events.
    pub fn subscribe(&self) -> broadcast::Receiver<UploadProgress> {
        let inner = self.inner.lock().unwrap();
        match &inner.tx {
            Some(tx) => tx.subscribe(),
            None => {
                // Already finished: hand out a receiver that reports Closed.
                let (tx, rx) = broadcast::channel(1);
                drop(tx);
                rx
            }
        }
    }

    /// Emits an event. Returns `false` if the event was dropped.
    ///
    /// Non-terminal events must strictly increase `loaded_bytes`, so a chunk
    /// is never reported twice. Nothing is emitted after a terminal event.
    pub fn emit(&self, progress: UploadProgress) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.tx.is_none() {
            warn!(
                upload_id = %progress.upload_id,
                status = ?progress.status,
                "progress emitted after terminal event, dropping"
            );
            return false;
        }

        if !progress.is_terminal() {
            if let Some(last) = inner.last_loaded
                && progress.loaded_bytes <= last
            {
                debug!(
                    upload_id = %progress.upload_id,
                    loaded = progress.loaded_bytes,
                    last,
                    "non-advancing progress, dropping"
                );
                return false;
            }
            inner.last_loaded = Some(progress.loaded_bytes);
        }

        let terminal = progress.is_terminal();
        if let Some(tx) = &inner.tx {
            // No receivers is not an error: nobody is watching.
            let _ = tx.send(progress);
        }
        if terminal {
            inner.tx = None;
        }
        true
    }

    /// Returns `true` once a terminal event has been emitted.
    pub fn is_finished(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.tx.is_none()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.tx.as_ref().map_or(0, |tx| tx.receiver_count())
    }
}

// ---------------------------------------------------------------------------
// SpeedCalculator
// ---------------------------------------------------------------------------

struct SpeedSample {
    loaded: u64,
    timestamp: Instant,
}

/// Estimates transfer speed from cumulative byte counts over a sliding window.
pub struct SpeedCalculator {
    inner: Mutex<SpeedInner>,
}

struct SpeedInner {
    samples: VecDeque<SpeedSample>,
    max_samples: usize,
    window_size: Duration,
}

impl Default for SpeedCalculator {
    fn default() -> Self {
        Self::new(None, None)
    }
}

impl SpeedCalculator {
    /// Creates a new calculator.
    ///
    /// - `window_size`: time window for speed calculation (default 10 s).
    /// - `max_samples`: maximum retained samples (default 50).
    pub fn new(window_size: Option<Duration>, max_samples: Option<usize>) -> Self {
        Self {
            inner: Mutex::new(SpeedInner {
                samples: VecDeque::new(),
                max_samples: max_samples.unwrap_or(50).max(2),
                window_size: window_size.unwrap_or(Duration::from_secs(10)),
            }),
        }
    }

    /// Records the cumulative number of bytes transferred so far.
    pub fn record(&self, loaded: u64) {
        let mut s = self.inner.lock().unwrap();
        let now = Instant::now();
        s.samples.push_back(SpeedSample {
            loaded,
            timestamp: now,
        });

        let window = s.window_size;
        while s.samples.len() > 2
            && s.samples
                .front()
                .is_some_and(|first| now.duration_since(first.timestamp) > window)
        {
            s.samples.pop_front();
        }
        while s.samples.len() > s.max_samples {
            s.samples.pop_front();
        }
    }

    /// Average speed in bytes/second across the window.
    ///
    /// Returns 0.0 with fewer than 2 samples.
    pub fn bytes_per_second(&self) -> f64 {
        let s = self.inner.lock().unwrap();
        let (Some(first), Some(last)) = (s.samples.front(), s.samples.back()) else {
            return 0.0;
        };
        let elapsed = last.timestamp.duration_since(first.timestamp);
        if elapsed.is_zero() || last.loaded <= first.loaded {
            return 0.0;
        }
        (last.loaded - first.loaded) as f64 / elapsed.as_secs_f64()
    }

    /// Estimates time remaining to transfer `remaining_bytes`.
    ///
    /// Returns `None` if speed is zero.
    pub fn eta(&self, remaining_bytes: u64) -> Option<Duration> {
        let speed = self.bytes_per_second();
        if speed <= 0.0 {
            return None;
        }
        Some(Duration::from_secs_f64(remaining_bytes as f64 / speed))
    }

    /// Clears all recorded samples.
    pub fn reset(&self) {
        let mut s = self.inner.lock().unwrap();
        s.samples.clear();
    }
}
