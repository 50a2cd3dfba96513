//! Transport error types.

use reqwest::StatusCode;
use sice_protocol::ErrorBody;

/// Errors from a chunk or cleanup request.
///
/// `Display` is the message shown to the user in a failed progress event.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Carries the underlying cause for logs; `Display` stays fixed.
    #[error("connection error, check your network connection")]
    Network(String),

    #[error("chunk request timed out")]
    Timeout,

    #[error("{message}")]
    Server { status: u16, message: String },

    #[error("invalid server response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid auth token")]
    InvalidToken,
}

impl TransportError {
    /// Builds a server error from a non-2xx status and its body.
    ///
    /// Uses the body's `message` field when present, otherwise the status
    /// code and reason phrase.
    pub fn from_response(status: StatusCode, body: &[u8]) -> Self {
        let message = serde_json::from_slice::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.message)
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| {
                format!(
                    "server error: {} {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or_default()
                )
                .trim_end()
                .to_string()
            });
        TransportError::Server {
            status: status.as_u16(),
            message,
        }
    }

    /// Returns `true` for the per-chunk timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout)
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return TransportError::Timeout;
        }
        if let Some(status) = e.status() {
            return TransportError::from_response(status, &[]);
        }
        let detail = e.to_string();
        tracing::warn!(error = %detail, "network error");
        TransportError::Network(detail)
    }
}
