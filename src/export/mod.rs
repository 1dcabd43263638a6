//! Export pipeline for snapstack.
//!
//! A collection is read as a newest-first snapshot and handed to one of three
//! independent serializers:
//! - [`ExportFormat::Archive`]: zip of `slide-{rank}.png` entries
//! - [`ExportFormat::Report`]: CSV, one row per item, newest first
//! - [`ExportFormat::Slideshow`]: PPTX, one full-bleed slide per item, oldest first
//!
//! Output is built completely in memory and then written atomically, so a
//! failed export never leaves a partial file behind.

pub mod archive;
pub mod report;
pub mod slideshow;
pub mod types;


pub use types::{ExportError, ExportFormat, ExportOptions, ExportSummary};

use std::borrow::Cow;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::ImageFormat;
use tokio::task;

use crate::store::{Collection, Item, ScreenshotStore, StoreError};
use crate::util::{sanitize_file_stem, write_atomic};

/// Default output path for exporting `collection` as `format` into `output_dir`.
pub fn default_destination(
    output_dir: &Path,
    collection: &Collection,
    format: ExportFormat,
) -> PathBuf {
    output_dir.join(format!(
        "{}.{}",
        sanitize_file_stem(&collection.name),
        format.extension()
    ))
}

/// Export every item of `collection_id` to `destination`.
///
/// Errors are logged before being returned; the store is never modified.
pub async fn export_collection(
    store: &ScreenshotStore,
    collection_id: &str,
    format: ExportFormat,
    destination: &Path,
    options: &ExportOptions,
) -> Result<ExportSummary, ExportError> {
    match run_export(store, collection_id, format, destination, options).await {
        Ok(summary) => {
            log::info!(
                "Exported {} item(s) of collection {} as {} to {} ({} bytes)",
                summary.item_count,
                summary.collection_id,
                summary.format,
                summary.path.display(),
                summary.byte_len
            );
            Ok(summary)
        }
        Err(err) => {
            log::error!(
                "Export of collection {} as {} failed: {}",
                collection_id,
                format,
                err
            );
            Err(err)
        }
    }
}

async fn run_export(
    store: &ScreenshotStore,
    collection_id: &str,
    format: ExportFormat,
    destination: &Path,
    options: &ExportOptions,
) -> Result<ExportSummary, ExportError> {
    let collection = store
        .get_collection(collection_id)
        .await?
        .ok_or_else(|| StoreError::collection_not_found(collection_id))?;

    let items = store.items_newest_first(collection_id).await?;
    if items.is_empty() {
        return Err(ExportError::EmptyCollection(collection.name));
    }
    let item_count = items.len();

    let title = collection.name.clone();
    let options = options.clone();
    let path = destination.to_path_buf();
    let write_path = path.clone();

    let byte_len = task::spawn_blocking(move || -> Result<usize, ExportError> {
        let bytes = serialize(format, &items, &title, &options)?;
        write_atomic(&write_path, &bytes)?;
        Ok(bytes.len())
    })
    .await
    .map_err(|e| ExportError::ExportFailed(format!("export task failed: {}", e)))??;

    Ok(ExportSummary {
        format,
        collection_id: collection.id,
        path,
        item_count,
        byte_len,
    })
}

/// Serialize a newest-first item list in `format`.
pub fn serialize(
    format: ExportFormat,
    items: &[Item],
    title: &str,
    options: &ExportOptions,
) -> Result<Vec<u8>, ExportError> {
    match format {
        ExportFormat::Archive => archive::build_archive(items),
        ExportFormat::Report => report::build_report(items, options),
        ExportFormat::Slideshow => slideshow::build_slideshow(items, title, options),
    }
}

/// The item's image as PNG, re-encoding anything stored in another format.
pub(crate) fn png_bytes(item: &Item) -> Result<Cow<'_, [u8]>, ExportError> {
    if matches!(image::guess_format(&item.image), Ok(ImageFormat::Png)) {
        return Ok(Cow::Borrowed(&item.image));
    }

    let decoded = image::load_from_memory(&item.image).map_err(|e| {
        ExportError::ExportFailed(format!("image of item {} is unreadable: {}", item.id, e))
    })?;
    let mut out = Cursor::new(Vec::new());
    decoded.write_to(&mut out, ImageFormat::Png).map_err(|e| {
        ExportError::ExportFailed(format!("image of item {} cannot be re-encoded: {}", item.id, e))
    })?;
    log::debug!("Re-encoded item {} as PNG", item.id);
    Ok(Cow::Owned(out.into_inner()))
}
