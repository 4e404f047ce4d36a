//! Configuration for the artifact store

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{StorageError, StorageResult};

/// Default retrieval chunk size in bytes
pub const DEFAULT_CHUNK_SIZE: usize = 8192;

/// Largest accepted retrieval chunk size (16 MiB)
pub const MAX_CHUNK_SIZE: usize = 16 * 1024 * 1024;

/// Configuration for an [`ArtifactStore`](crate::ArtifactStore)
///
/// Every field has a default, so a TOML file only needs the keys it
/// changes:
///
/// ```toml
/// root = "/var/lib/shutter"
/// keys_dir = "/etc/shutter/keys"
/// chunk_size = 65536
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Storage root directory
    pub root: PathBuf,
    /// Directory for object files (defaults to `<root>/objects`)
    pub objects_dir: Option<PathBuf>,
    /// Directory for the key pair (defaults to `<root>/keys`)
    pub keys_dir: Option<PathBuf>,
    /// Maximum size of one retrieved chunk in bytes
    pub chunk_size: usize,
    /// Remove scratch files left by a previous process on open
    ///
    /// Skipped while another store holds the objects directory.
    pub sweep_scratch_on_open: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./shutter-data"),
            objects_dir: None,
            keys_dir: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            sweep_scratch_on_open: true,
        }
    }
}

impl StoreConfig {
    /// Create a configuration rooted at the given directory
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    /// Parse a configuration from TOML text
    pub fn from_toml_str(text: &str) -> StorageResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| StorageError::config(format!("Invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a TOML file
    pub fn from_file(path: &Path) -> StorageResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            StorageError::config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    /// Set an explicit objects directory
    pub fn with_objects_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.objects_dir = Some(dir.into());
        self
    }

    /// Set an explicit key directory
    pub fn with_keys_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.keys_dir = Some(dir.into());
        self
    }

    /// Set the retrieval chunk size
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Enable or disable the startup scratch sweep
    pub fn with_sweep_scratch_on_open(mut self, sweep: bool) -> Self {
        self.sweep_scratch_on_open = sweep;
        self
    }

    /// Resolved objects directory
    pub fn objects_path(&self) -> PathBuf {
        self.objects_dir
            .clone()
            .unwrap_or_else(|| self.root.join("objects"))
    }

    /// Resolved key directory
    pub fn keys_path(&self) -> PathBuf {
        self.keys_dir.clone().unwrap_or_else(|| self.root.join("keys"))
    }

    /// Check that the values are usable
    pub fn validate(&self) -> StorageResult<()> {
        if self.chunk_size == 0 || self.chunk_size > MAX_CHUNK_SIZE {
            return Err(StorageError::config(format!(
                "chunk_size must be between 1 and {}, got {}",
                MAX_CHUNK_SIZE, self.chunk_size
            )));
        }
        if self.objects_path() == self.keys_path() {
            return Err(StorageError::config(
                "objects and keys must live in different directories",
            ));
        }
        Ok(())
    }
}
