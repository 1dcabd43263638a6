//! Data types for the export pipeline.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

use crate::config::ExportConfig;
use crate::store::StoreError;

/// Output formats a collection can be exported to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Zip archive with one PNG per item.
    Archive,
    /// CSV table with one row per item.
    Report,
    /// PPTX slideshow with one full-bleed slide per item.
    Slideshow,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 3] = [
        ExportFormat::Archive,
        ExportFormat::Report,
        ExportFormat::Slideshow,
    ];

    /// File extension used for default output names.
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Archive => "zip",
            ExportFormat::Report => "csv",
            ExportFormat::Slideshow => "pptx",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExportFormat::Archive => "archive",
            ExportFormat::Report => "report",
            ExportFormat::Slideshow => "slideshow",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "archive" | "zip" => Ok(ExportFormat::Archive),
            "report" | "csv" => Ok(ExportFormat::Report),
            "slideshow" | "pptx" => Ok(ExportFormat::Slideshow),
            other => Err(format!(
                "unknown export format '{}' (expected archive, report or slideshow)",
                other
            )),
        }
    }
}

/// Tunables shared by the serializers.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    /// Slide size in EMU (English Metric Units, 914400 per inch).
    pub slide_width_emu: u64,
    pub slide_height_emu: u64,
    /// chrono format string for report timestamps (local time).
    pub timestamp_format: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self::from(&ExportConfig::default())
    }
}

impl From<&ExportConfig> for ExportOptions {
    fn from(config: &ExportConfig) -> Self {
        Self {
            slide_width_emu: config.slide_width_emu,
            slide_height_emu: config.slide_height_emu,
            timestamp_format: config.timestamp_format.clone(),
        }
    }
}

/// What a successful export wrote.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSummary {
    pub format: ExportFormat,
    pub collection_id: String,
    pub path: PathBuf,
    pub item_count: usize,
    pub byte_len: usize,
}

/// Errors that can occur while exporting a collection.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("could not read collection: {0}")]
    Store(#[from] StoreError),

    #[error("collection '{0}' has no items to export")]
    EmptyCollection(String),

    #[error("export failed: {0}")]
    ExportFailed(String),

    #[error("archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("export I/O error: {0}")]
    Io(#[from] std::io::Error),
}
