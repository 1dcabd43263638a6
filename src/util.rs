//! Small filesystem, naming and time helpers shared by the store, the
//! preference file, and the export pipeline.

use std::fmt::Write as _;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};

/// Expand tilde (~) in path strings.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(stripped);
    }
    PathBuf::from(path)
}

/// Replace anything that is not ASCII alphanumeric, `-` or `_` so the value
/// can be used as a file stem.
pub fn sanitize_file_stem(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return "untitled".to_string();
    }

    trimmed
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Render `timestamp` in the local time zone using a chrono format string.
///
/// Falls back to RFC 3339 when `format` contains an invalid specifier.
pub fn format_local_timestamp(timestamp: &DateTime<Utc>, format: &str) -> String {
    let local = timestamp.with_timezone(&Local);
    let mut rendered = String::new();
    if write!(rendered, "{}", local.format(format)).is_err() {
        log::warn!("Invalid timestamp format '{}'; using RFC 3339", format);
        return local.to_rfc3339();
    }
    rendered
}

/// Pick a temporary sibling of `target` that does not exist yet.
pub fn temp_path(target: &Path) -> PathBuf {
    let file_name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "snapstack".to_string());

    let mut candidate = target.with_file_name(format!("{file_name}.tmp"));
    let mut counter = 0u32;
    while candidate.exists() {
        counter += 1;
        candidate = target.with_file_name(format!("{file_name}.tmp{counter}"));
    }
    candidate
}

/// Write `bytes` to `target` so that readers either see the previous content
/// or the complete new content, never a partial file.
///
/// The payload is written to a temporary sibling, synced, and renamed over
/// the target; the parent directory is then synced so the rename itself is
/// durable. On failure the temporary file is removed.
pub fn write_atomic(target: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = target.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let tmp_path = temp_path(target);
    let result = (|| {
        let mut tmp_file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp_path)?;
        tmp_file.write_all(bytes)?;
        tmp_file.sync_all()?;
        fs::rename(&tmp_path, target)?;
        sync_parent_dir(target)
    })();

    if result.is_err() && tmp_path.exists() {
        if let Err(err) = fs::remove_file(&tmp_path) {
            log::warn!(
                "failed to remove temporary file {}: {}",
                tmp_path.display(),
                err
            );
        }
    }

    result
}

#[cfg(unix)]
fn sync_parent_dir(target: &Path) -> io::Result<()> {
    let parent = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::File::open(parent)?.sync_all()
}

// Directory handles cannot be synced this way outside unix.
#[cfg(not(unix))]
fn sync_parent_dir(_target: &Path) -> io::Result<()> {
    Ok(())
}
