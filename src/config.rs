use serde::Deserialize;
use std::path::PathBuf;
use crate::error::{InventoryError, Result};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// HTTP server configuration (optional).
    #[serde(default)]
    pub server: ServerConfig,
}

/// HTTP server configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Port to listen on.
    #[serde(default = "default_server_port")]
    pub port: u16,
    /// Maximum multipart request body size in megabytes.
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_server_port(),
            max_upload_mb: default_max_upload_mb(),
        }
    }
}

/// Upper bound for `max_upload_mb`.
pub const MAX_UPLOAD_MB_LIMIT: u64 = 4096;

impl ServerConfig {
    /// Body limit in bytes. `max_upload_mb` is bounded by `validate`.
    pub fn max_upload_bytes(&self) -> usize {
        usize::try_from(self.max_upload_mb.min(MAX_UPLOAD_MB_LIMIT) << 20).unwrap_or(usize::MAX)
    }
}

fn default_server_port() -> u16 { 8000 }
fn default_max_upload_mb() -> u64 { 10 }

/// Where the car collection and image blobs live.
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Base directory holding `cars.json` and `blobs/`.
    pub base_path: PathBuf,
}

impl Config {
    /// Load configuration from a TOML file at `path`.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| InventoryError::Config(format!("Cannot read config file: {e}")))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| InventoryError::Config(format!("Invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.storage.base_path.as_os_str().is_empty() {
            return Err(InventoryError::Config("base_path must not be empty".into()));
        }
        if self.server.port == 0 {
            return Err(InventoryError::Config("port must be > 0".into()));
        }
        if self.server.max_upload_mb == 0 {
            return Err(InventoryError::Config("max_upload_mb must be > 0".into()));
        }
        if self.server.max_upload_mb > MAX_UPLOAD_MB_LIMIT {
            return Err(InventoryError::Config(format!(
                "max_upload_mb must be <= {MAX_UPLOAD_MB_LIMIT}"
            )));
        }
        Ok(())
    }
}
