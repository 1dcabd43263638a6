use crate::config::{CompressionMode, StorageConfig};
use crate::util::expand_tilde;
use anyhow::{Result, anyhow};
use std::path::{Path, PathBuf};

use super::types::ItemId;

pub const DEFAULT_AUTO_COMPRESS_THRESHOLD_BYTES: u64 = 64 * 1024; // 64 KiB

/// Runtime options for the on-disk store.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub base_dir: PathBuf,
    pub compression: CompressionMode,
    pub auto_compress_threshold_bytes: u64,
    /// Keep a copy of the previous catalog next to the live one.
    pub keep_backup: bool,
}

impl StoreOptions {
    /// Creates options rooted at `base_dir` with default tuning. Intended mainly for tests.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            compression: CompressionMode::Auto,
            auto_compress_threshold_bytes: DEFAULT_AUTO_COMPRESS_THRESHOLD_BYTES,
            keep_backup: true,
        }
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.base_dir.join("catalog.json")
    }

    pub fn backup_path(&self) -> PathBuf {
        self.base_dir.join("catalog.json.bak")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.base_dir.join("catalog.lock")
    }

    pub fn blob_dir(&self) -> PathBuf {
        self.base_dir.join("blobs")
    }

    pub fn blob_file_name(id: ItemId) -> String {
        format!("{id}.png")
    }

    pub fn blob_path(&self, file_name: &str) -> PathBuf {
        self.blob_dir().join(file_name)
    }
}

/// Build runtime store options from configuration values.
///
/// `override_dir` takes precedence over `storage.data_directory`.
pub fn options_from_config(
    storage_cfg: &StorageConfig,
    override_dir: Option<&Path>,
) -> Result<StoreOptions> {
    let base_dir = match override_dir {
        Some(dir) => dir.to_path_buf(),
        None => expand_tilde(&storage_cfg.data_directory),
    };
    if base_dir.as_os_str().is_empty() {
        return Err(anyhow!("storage.data_directory resolved to an empty path"));
    }

    let mut options = StoreOptions::new(base_dir);
    options.compression = storage_cfg.compression;
    options.auto_compress_threshold_bytes = storage_cfg.auto_compress_threshold_bytes.max(1);
    Ok(options)
}
