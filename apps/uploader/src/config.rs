//! Uploader configuration management.
//!
//! Configuration is stored as TOML:
//! - `$SICE_UPLOADER_CONFIG` when set
//! - Linux: `~/.config/sice/uploader.toml`
//! - Windows: `%APPDATA%/sice/uploader.toml`

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sice_protocol::{
    ALLOWED_MIME_TYPES, DEFAULT_ALLOWED_EXTENSIONS, DEFAULT_CHUNK_TIMEOUT,
    DEFAULT_MAX_FILE_SIZE_MB, MIN_CHUNK_SIZE,
};
use sice_transfer::ValidationPolicy;
use sice_upload_engine::EngineConfig;

const CONFIG_ENV: &str = "SICE_UPLOADER_CONFIG";

/// Uploader configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Backend API base URL, without the endpoint path.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Bearer token sent with every request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,

    #[serde(default)]
    pub upload: UploadConfig,
}

/// `[upload]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,

    /// Chunk size in MiB; fractional values allowed.
    #[serde(default = "default_chunk_size_mb")]
    pub chunk_size_mb: f64,

    #[serde(default = "default_chunk_timeout_ms")]
    pub chunk_timeout_ms: u64,

    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
}

fn default_api_url() -> String {
    "http://localhost:8000/api".into()
}

fn default_max_file_size_mb() -> u64 {
    DEFAULT_MAX_FILE_SIZE_MB
}

fn default_chunk_size_mb() -> f64 {
    1.5
}

fn default_chunk_timeout_ms() -> u64 {
    DEFAULT_CHUNK_TIMEOUT.as_millis() as u64
}

fn default_allowed_extensions() -> Vec<String> {
    DEFAULT_ALLOWED_EXTENSIONS
        .iter()
        .map(|e| e.to_string())
        .collect()
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: default_max_file_size_mb(),
            chunk_size_mb: default_chunk_size_mb(),
            chunk_timeout_ms: default_chunk_timeout_ms(),
            allowed_extensions: default_allowed_extensions(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            auth_token: None,
            upload: UploadConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from disk, or creates a default if not found.
    pub fn load() -> anyhow::Result<Self> {
        let path = config_path(std::env::var_os(CONFIG_ENV));
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Writes the configuration to `path`.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        // The file may hold a bearer token.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// Rejects settings the engine cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_url.trim().is_empty() {
            anyhow::bail!("api_url must not be empty");
        }
        if self.chunk_size_bytes() < MIN_CHUNK_SIZE {
            anyhow::bail!(
                "upload.chunk_size_mb must be at least {} (got {})",
                MIN_CHUNK_SIZE as f64 / (1024.0 * 1024.0),
                self.upload.chunk_size_mb
            );
        }
        if self.upload.chunk_timeout_ms == 0 {
            anyhow::bail!("upload.chunk_timeout_ms must be > 0");
        }
        self.engine_config().validate()?;
        Ok(())
    }

    /// Chunk size in bytes. Zero for non-positive or non-finite values.
    pub fn chunk_size_bytes(&self) -> u64 {
        let mb = self.upload.chunk_size_mb;
        if !mb.is_finite() || mb <= 0.0 {
            return 0;
        }
        (mb * 1024.0 * 1024.0).round() as u64
    }

    pub fn chunk_timeout(&self) -> Duration {
        Duration::from_millis(self.upload.chunk_timeout_ms)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            chunk_size: self.chunk_size_bytes(),
            validation: ValidationPolicy {
                max_file_size_mb: self.upload.max_file_size_mb,
                allowed_extensions: self
                    .upload
                    .allowed_extensions
                    .iter()
                    .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                    .collect(),
                allowed_mime_types: ALLOWED_MIME_TYPES.iter().map(|m| m.to_string()).collect(),
            },
        }
    }
}

/// Returns the configuration file path, honoring an explicit override.
fn config_path(override_path: Option<OsString>) -> PathBuf {
    if let Some(path) = override_path.filter(|p| !p.is_empty()) {
        return PathBuf::from(path);
    }

    #[cfg(target_os = "linux")]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home)
            .join(".config")
            .join("sice")
            .join("uploader.toml")
    }

    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata).join("sice").join("uploader.toml")
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        PathBuf::from("/tmp/sice/uploader.toml")
    }
}
