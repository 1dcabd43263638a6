//! Zip archive with one PNG entry per item.

use std::io::{Cursor, Write};

use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

use super::png_bytes;
use super::types::ExportError;
use crate::store::Item;

/// Entry name for the item at `position` of a newest-first list of `count`.
///
/// The newest item gets the highest number, so `slide-1.png` is always the
/// oldest capture.
pub fn entry_name(count: usize, position: usize) -> String {
    format!("slide-{}.png", count - position)
}

/// Serialize `items` (newest first) into a complete zip archive in memory.
///
/// The archive is only returned once every entry has been written and the
/// central directory sealed.
pub(crate) fn build_archive(items: &[Item]) -> Result<Vec<u8>, ExportError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    // PNG data is already deflated.
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

    let count = items.len();
    for (position, item) in items.iter().enumerate() {
        let name = entry_name(count, position);
        let png = png_bytes(item)?;
        writer.start_file(name.as_str(), options)?;
        writer.write_all(&png)?;
        log::debug!("Archived item {} as {}", item.id, name);
    }

    Ok(writer.finish()?.into_inner())
}
