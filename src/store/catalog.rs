//! On-disk catalog: the single file that records which collections and items
//! exist. Every mutation of the store is one catalog commit, which makes a
//! commit the unit of atomicity.

use super::options::StoreOptions;
use super::types::{Collection, ItemId};
use crate::config::CompressionMode;
use crate::util::write_atomic;
use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use flate2::{Compression, bufread::GzDecoder, write::GzEncoder};
use fs2::FileExt;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};

const CURRENT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ItemRecord {
    pub collection_id: String,
    pub timestamp: DateTime<Utc>,
    pub order: u64,
    /// Blob file name relative to the blob directory.
    pub blob: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Catalog {
    pub version: u32,
    #[serde(default)]
    pub last_modified: Option<String>,
    pub next_item_id: ItemId,
    #[serde(default)]
    pub collections: BTreeMap<String, Collection>,
    #[serde(default)]
    pub items: BTreeMap<ItemId, ItemRecord>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            last_modified: None,
            next_item_id: 1,
            collections: BTreeMap::new(),
            items: BTreeMap::new(),
        }
    }
}

impl Catalog {
    pub fn count_in(&self, collection_id: &str) -> usize {
        self.items
            .values()
            .filter(|record| record.collection_id == collection_id)
            .count()
    }

    pub fn items_in<'a>(
        &'a self,
        collection_id: &'a str,
    ) -> impl Iterator<Item = (ItemId, &'a ItemRecord)> + 'a {
        self.items
            .iter()
            .filter(move |(_, record)| record.collection_id == collection_id)
            .map(|(id, record)| (*id, record))
    }
}

/// Advisory lock on the catalog, released on drop.
pub(crate) struct CatalogLock {
    file: File,
    path: std::path::PathBuf,
}

impl CatalogLock {
    pub fn exclusive(options: &StoreOptions) -> Result<Self> {
        let (file, path) = open_lock_file(options)?;
        FileExt::lock_exclusive(&file)
            .with_context(|| format!("failed to lock catalog {}", path.display()))?;
        Ok(Self { file, path })
    }

    pub fn shared(options: &StoreOptions) -> Result<Self> {
        let (file, path) = open_lock_file(options)?;
        FileExt::lock_shared(&file)
            .with_context(|| format!("failed to acquire shared lock {}", path.display()))?;
        Ok(Self { file, path })
    }
}

impl Drop for CatalogLock {
    fn drop(&mut self) {
        FileExt::unlock(&self.file).unwrap_or_else(|err| {
            warn!("failed to unlock catalog {}: {}", self.path.display(), err)
        });
    }
}

fn open_lock_file(options: &StoreOptions) -> Result<(File, std::path::PathBuf)> {
    fs::create_dir_all(&options.base_dir).with_context(|| {
        format!(
            "failed to create store directory {}",
            options.base_dir.display()
        )
    })?;
    let lock_path = options.lock_path();
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)
        .with_context(|| format!("failed to open catalog lock file {}", lock_path.display()))?;
    Ok((file, lock_path))
}

/// Read the catalog. A missing file is an empty catalog.
///
/// Callers must hold a [`CatalogLock`].
pub(crate) fn load_catalog(options: &StoreOptions) -> Result<Catalog> {
    let path = options.catalog_path();
    if !path.exists() {
        debug!("No catalog at {}, starting empty", path.display());
        return Ok(Catalog::default());
    }

    let mut file_bytes = Vec::new();
    File::open(&path)
        .with_context(|| format!("failed to open catalog {}", path.display()))?
        .read_to_end(&mut file_bytes)
        .context("failed to read catalog")?;

    let decompressed = if is_gzip(&file_bytes) {
        let mut decoder = GzDecoder::new(&file_bytes[..]);
        let mut out = Vec::new();
        decoder
            .read_to_end(&mut out)
            .context("failed to decompress catalog")?;
        out
    } else {
        file_bytes
    };

    let catalog: Catalog =
        serde_json::from_slice(&decompressed).context("failed to parse catalog json")?;

    if catalog.version > CURRENT_VERSION {
        return Err(anyhow!(
            "catalog {} has version {} but only {} is supported",
            path.display(),
            catalog.version,
            CURRENT_VERSION
        ));
    }

    Ok(catalog)
}

/// Durably replace the catalog with `catalog`.
///
/// Callers must hold an exclusive [`CatalogLock`].
pub(crate) fn commit_catalog(catalog: &mut Catalog, options: &StoreOptions) -> Result<()> {
    catalog.version = CURRENT_VERSION;
    catalog.last_modified = Some(Utc::now().to_rfc3339());

    let mut json_bytes =
        serde_json::to_vec_pretty(catalog).context("failed to serialise catalog")?;

    let should_compress = match options.compression {
        CompressionMode::Off => false,
        CompressionMode::On => true,
        CompressionMode::Auto => (json_bytes.len() as u64) >= options.auto_compress_threshold_bytes,
    };
    if should_compress {
        json_bytes = compress_bytes(&json_bytes)?;
    }

    let catalog_path = options.catalog_path();
    if options.keep_backup && catalog_path.exists() {
        if let Err(err) = fs::copy(&catalog_path, options.backup_path()) {
            warn!(
                "failed to back up catalog {}: {}",
                catalog_path.display(),
                err
            );
        }
    }

    write_atomic(&catalog_path, &json_bytes)
        .with_context(|| format!("failed to write catalog {}", catalog_path.display()))?;

    debug!(
        "Catalog committed to {} ({} bytes, compression={}, {} collections, {} items)",
        catalog_path.display(),
        json_bytes.len(),
        should_compress,
        catalog.collections.len(),
        catalog.items.len()
    );
    Ok(())
}

fn compress_bytes(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .context("failed to compress catalog")?;
    encoder
        .finish()
        .context("failed to finalise compressed catalog")
}

fn is_gzip(bytes: &[u8]) -> bool {
    bytes.len() > 2 && bytes[0] == 0x1f && bytes[1] == 0x8b
}
