//! Configuration type definitions.

use super::enums::CompressionMode;
use crate::region::Rect;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Where and how captures are persisted.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StorageConfig {
    /// Directory holding the catalog and image blobs. `~` is expanded.
    /// Defaults to the platform data directory (e.g. `~/.local/share/snapstack`).
    #[serde(default = "default_data_directory")]
    pub data_directory: String,

    /// Catalog compression: "off", "on" or "auto"
    #[serde(default)]
    pub compression: CompressionMode,

    /// Catalog size in bytes above which "auto" compression kicks in
    #[serde(default = "default_auto_compress_threshold")]
    pub auto_compress_threshold_bytes: u64,

    /// Name used when a collection has to be created on first capture
    #[serde(default = "default_collection_name")]
    pub default_collection_name: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_directory: default_data_directory(),
            compression: CompressionMode::default(),
            auto_compress_threshold_bytes: default_auto_compress_threshold(),
            default_collection_name: default_collection_name(),
        }
    }
}

/// Region capture behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CaptureConfig {
    /// Milliseconds to wait after hiding the selector before grabbing the
    /// frame, so the host repaints without the overlay (valid range: 0 - 5000)
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Rectangle shown when no previous selection has been remembered
    #[serde(default = "default_rect")]
    pub default_rect: Rect,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: default_settle_delay_ms(),
            default_rect: default_rect(),
        }
    }
}

/// Export defaults.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExportConfig {
    /// Directory exports are written to when no explicit output path is given
    #[serde(default = "default_output_directory")]
    pub output_directory: String,

    /// Slide width in EMU (914400 per inch)
    #[serde(default = "default_slide_width")]
    pub slide_width_emu: u64,

    /// Slide height in EMU
    #[serde(default = "default_slide_height")]
    pub slide_height_emu: u64,

    /// chrono format string used for the report's timestamp column
    #[serde(default = "default_timestamp_format")]
    pub timestamp_format: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_directory: default_output_directory(),
            slide_width_emu: default_slide_width(),
            slide_height_emu: default_slide_height(),
            timestamp_format: default_timestamp_format(),
        }
    }
}

// =============================================================================
// Default value functions
// =============================================================================

fn default_data_directory() -> String {
    dirs::data_dir()
        .map(|dir| dir.join("snapstack").to_string_lossy().into_owned())
        .unwrap_or_else(|| "~/.local/share/snapstack".to_string())
}

fn default_auto_compress_threshold() -> u64 {
    64 * 1024
}

fn default_collection_name() -> String {
    "My Video Deck".to_string()
}

fn default_settle_delay_ms() -> u64 {
    150
}

fn default_rect() -> Rect {
    Rect::new(100.0, 100.0, 600.0, 337.0)
}

fn default_output_directory() -> String {
    dirs::picture_dir()
        .map(|dir| dir.join("SnapStack").to_string_lossy().into_owned())
        .unwrap_or_else(|| "~/Pictures/SnapStack".to_string())
}

fn default_slide_width() -> u64 {
    12_192_000
}

fn default_slide_height() -> u64 {
    6_858_000
}

fn default_timestamp_format() -> String {
    "%Y-%m-%d %H:%M:%S".to_string()
}
