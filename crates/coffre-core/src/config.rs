use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CoffreError, CoffreResult};

/// Top-level configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoffreConfig {
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
    pub index: IndexConfig,
    pub vault: VaultConfig,
    pub policy: PolicyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (default: info). `RUST_LOG` takes precedence.
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

/// Which OpenDAL service backs the blob store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// S3-compatible object storage
    S3,
    /// Local directory
    Fs,
    /// In-process memory (tests, dry runs)
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// S3 endpoint
    pub endpoint: String,
    /// S3 region (default: us-east-1)
    pub region: String,
    /// Bucket name
    pub bucket: String,
    /// Root directory for the `fs` backend
    pub root: PathBuf,
    /// Refuse plaintext HTTP S3 endpoints instead of warning
    pub enforce_tls: bool,
}

/// Metadata index location
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// JSON file holding one record per stored blob
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Owner id recorded on every upload and used to filter listings
    pub owner: String,
    /// Top-level prefix for blob paths (`{prefix}/{owner}/...`)
    pub prefix: String,
    /// Encryption worker threads (0 = cpu_count)
    pub workers: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Minimum password length for new uploads
    pub min_password_len: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Fs,
            endpoint: "http://localhost:9000".into(),
            region: "us-east-1".into(),
            bucket: "coffre".into(),
            root: PathBuf::from("~/.local/share/coffre/blobs"),
            enforce_tls: false,
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("~/.local/share/coffre/index.json"),
        }
    }
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            owner: "local".into(),
            prefix: "users".into(),
            workers: 0,
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            min_password_len: crate::policy::DEFAULT_MIN_PASSWORD_LEN,
        }
    }
}

impl CoffreConfig {
    /// Load configuration from `path`, falling back to defaults when the file
    /// does not exist.
    pub fn load(path: &Path) -> CoffreResult<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| CoffreError::Config(format!("parsing {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would only fail later, deep inside an upload.
    pub fn validate(&self) -> CoffreResult<()> {
        if self.vault.owner.is_empty() || self.vault.owner.contains('/') {
            return Err(CoffreError::Config(format!(
                "vault.owner must be a non-empty path segment, got {:?}",
                self.vault.owner
            )));
        }
        if self.vault.prefix.trim_matches('/').is_empty() {
            return Err(CoffreError::Config("vault.prefix must not be empty".into()));
        }
        if self.storage.backend == StorageBackend::S3 && self.storage.bucket.is_empty() {
            return Err(CoffreError::Config("storage.bucket is required for s3".into()));
        }
        Ok(())
    }
}

/// Expand `~` in path to the user's home directory
pub fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~/") {
        let home = std::env::var("HOME").unwrap_or_default();
        PathBuf::from(home).join(rest)
    } else {
        path.to_path_buf()
    }
}
