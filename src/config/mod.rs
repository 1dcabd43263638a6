//! Configuration file support for snapstack.
//!
//! This module handles loading and validating user settings from the configuration file
//! located at `~/.config/snapstack/config.toml`. Settings cover where captures are stored,
//! how long the selector is given to disappear before a frame is grabbed, and export
//! defaults.
//!
//! If no config file exists, sensible defaults are used automatically.

pub mod enums;
pub mod types;

pub use enums::CompressionMode;
pub use types::{CaptureConfig, ExportConfig, StorageConfig};

use crate::region::Rect;
use crate::util::expand_tilde;
use anyhow::{Context, Result};
use log::{debug, info};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const MAX_SETTLE_DELAY_MS: u64 = 5_000;
// PowerPoint accepts slide edges between 1 and 56 inches.
const MIN_SLIDE_EMU: u64 = 914_400;
const MAX_SLIDE_EMU: u64 = 51_206_400;

/// Main configuration structure containing all user settings.
///
/// # Example TOML
/// ```toml
/// [storage]
/// data_directory = "~/.local/share/snapstack"
/// compression = "auto"
///
/// [capture]
/// settle_delay_ms = 150
/// default_rect = { left = 100.0, top = 100.0, width = 600.0, height = 337.0 }
///
/// [export]
/// output_directory = "~/Pictures/SnapStack"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default, JsonSchema)]
pub struct Config {
    /// Catalog and blob storage settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Region capture settings
    #[serde(default)]
    pub capture: CaptureConfig,

    /// Export defaults
    #[serde(default)]
    pub export: ExportConfig,
}

impl Config {
    /// Validates and clamps all configuration values to acceptable ranges.
    ///
    /// Invalid values are clamped or replaced by their defaults and a warning is logged.
    fn validate_and_clamp(&mut self) {
        if self.capture.settle_delay_ms > MAX_SETTLE_DELAY_MS {
            log::warn!(
                "Invalid settle_delay_ms {}, clamping to 0-{} range",
                self.capture.settle_delay_ms,
                MAX_SETTLE_DELAY_MS
            );
            self.capture.settle_delay_ms = MAX_SETTLE_DELAY_MS;
        }

        if self.capture.default_rect.is_empty() {
            let fallback = CaptureConfig::default().default_rect;
            log::warn!(
                "Invalid default_rect {}, falling back to {}",
                self.capture.default_rect,
                fallback
            );
            self.capture.default_rect = fallback;
        }

        if self.storage.default_collection_name.trim().is_empty() {
            log::warn!("Empty default_collection_name, falling back to default");
            self.storage.default_collection_name =
                StorageConfig::default().default_collection_name;
        }

        if self.storage.auto_compress_threshold_bytes == 0 {
            log::warn!("auto_compress_threshold_bytes must be positive, using 1");
            self.storage.auto_compress_threshold_bytes = 1;
        }

        for (label, value) in [
            ("slide_width_emu", &mut self.export.slide_width_emu),
            ("slide_height_emu", &mut self.export.slide_height_emu),
        ] {
            if !(MIN_SLIDE_EMU..=MAX_SLIDE_EMU).contains(value) {
                log::warn!(
                    "Invalid {} {}, clamping to {}-{} range",
                    label,
                    value,
                    MIN_SLIDE_EMU,
                    MAX_SLIDE_EMU
                );
                *value = (*value).clamp(MIN_SLIDE_EMU, MAX_SLIDE_EMU);
            }
        }

        if self.export.timestamp_format.trim().is_empty() {
            log::warn!("Empty timestamp_format, falling back to default");
            self.export.timestamp_format = ExportConfig::default().timestamp_format;
        }
    }

    /// Returns the path to the configuration file.
    ///
    /// The config file is located at `~/.config/snapstack/config.toml`.
    ///
    /// # Errors
    /// Returns an error if the config directory cannot be determined (e.g., HOME not set).
    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not find config directory")?
            .join("snapstack");

        Ok(config_dir.join("config.toml"))
    }

    /// Loads configuration from the default location, or returns defaults if not found.
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        Self::load_from(&config_path)
    }

    /// Loads configuration from `config_path`, or returns defaults if the file is missing.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or contains invalid TOML.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            info!("Config file not found, using defaults");
            debug!("Expected config at: {}", config_path.display());
            return Ok(Self::default());
        }

        let config_str = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config from {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config from {}", config_path.display()))?;

        config.validate_and_clamp();

        info!("Loaded config from {}", config_path.display());
        debug!("Config: {:?}", config);

        Ok(config)
    }

    /// Saves the current configuration to `config_path`, creating parent directories.
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let config_str = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(config_path, config_str)
            .with_context(|| format!("Failed to write config to {}", config_path.display()))?;

        info!("Saved config to {}", config_path.display());
        Ok(())
    }

    /// JSON schema describing the config file, for editor tooling.
    pub fn json_schema() -> schemars::Schema {
        schemars::schema_for!(Config)
    }

    /// Storage directory with `~` expanded.
    pub fn data_directory(&self) -> PathBuf {
        expand_tilde(&self.storage.data_directory)
    }

    /// Export directory with `~` expanded.
    pub fn output_directory(&self) -> PathBuf {
        expand_tilde(&self.export.output_directory)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.capture.settle_delay_ms)
    }

    pub fn default_rect(&self) -> Rect {
        self.capture.default_rect
    }
}
