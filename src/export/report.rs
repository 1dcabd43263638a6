//! CSV report with one row per item.

use std::fmt::Write;

use super::types::{ExportError, ExportOptions};
use crate::store::Item;
use crate::util::format_local_timestamp;

/// CSV header row.
pub const REPORT_HEADER: &str = "rank,captured_at,item_id";

/// Render `items` (newest first) as CSV, keeping the given row order.
pub(crate) fn build_report(items: &[Item], options: &ExportOptions) -> Result<Vec<u8>, ExportError> {
    let count = items.len();
    let mut out = String::with_capacity(32 * (count + 1));
    writeln!(out, "{}", REPORT_HEADER).map_err(|e| ExportError::ExportFailed(e.to_string()))?;

    for (position, item) in items.iter().enumerate() {
        let captured_at = format_local_timestamp(&item.timestamp, &options.timestamp_format);
        // Format: rank,captured_at,item_id
        writeln!(
            out,
            "{},{},{}",
            count - position,
            csv_field(&captured_at),
            item.id
        )
        .map_err(|e| ExportError::ExportFailed(e.to_string()))?;
    }

    Ok(out.into_bytes())
}

/// Quote a field when it contains a delimiter, quote or line break.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
