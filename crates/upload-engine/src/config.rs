//! Engine configuration.

use sice_protocol::{DEFAULT_CHUNK_SIZE, MIN_CHUNK_SIZE};
use sice_transfer::ValidationPolicy;

use crate::error::EngineError;

/// Settings applied to every upload started by an engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Fixed chunk size in bytes for new sessions. At least [`MIN_CHUNK_SIZE`].
    pub chunk_size: u64,
    pub validation: ValidationPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            validation: ValidationPolicy::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.chunk_size < MIN_CHUNK_SIZE {
            return Err(EngineError::InvalidConfig(format!(
                "chunk size must be at least {MIN_CHUNK_SIZE} bytes, got {}",
                self.chunk_size
            )));
        }
        if self.validation.allowed_extensions.is_empty() {
            return Err(EngineError::InvalidConfig(
                "at least one file extension must be allowed".into(),
            ));
        }
        Ok(())
    }
}
