//! Persistence of the last confirmed selection rectangle.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::capture::dependencies::RectPreference;
use crate::capture::types::CaptureError;
use crate::region::Rect;
use crate::util::write_atomic;

/// File name used inside the data directory.
pub const PREFERENCE_FILE_NAME: &str = "viewfinder.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct PreferenceFile {
    #[serde(rename = "viewfinderDim", default)]
    viewfinder_dim: Option<Rect>,
}

/// Stores the rectangle as JSON under the `viewfinderDim` key.
pub struct FileRectPreference {
    path: PathBuf,
}

impl FileRectPreference {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Preference file inside `data_dir`.
    pub fn in_directory(data_dir: &Path) -> Self {
        Self::new(data_dir.join(PREFERENCE_FILE_NAME))
    }
}

impl RectPreference for FileRectPreference {
    fn load(&self) -> Result<Option<Rect>, CaptureError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let bytes = std::fs::read(&self.path).map_err(|e| {
            CaptureError::Preference(format!("cannot read {}: {}", self.path.display(), e))
        })?;
        let file: PreferenceFile = serde_json::from_slice(&bytes).map_err(|e| {
            CaptureError::Preference(format!("cannot parse {}: {}", self.path.display(), e))
        })?;

        Ok(file.viewfinder_dim.filter(|rect| !rect.is_empty()))
    }

    fn save(&self, rect: &Rect) -> Result<(), CaptureError> {
        let payload = PreferenceFile {
            viewfinder_dim: Some(*rect),
        };
        let bytes = serde_json::to_vec_pretty(&payload)
            .map_err(|e| CaptureError::Preference(e.to_string()))?;
        write_atomic(&self.path, &bytes).map_err(|e| {
            CaptureError::Preference(format!("cannot write {}: {}", self.path.display(), e))
        })?;
        log::debug!("Remembered selection {} in {}", rect, self.path.display());
        Ok(())
    }
}

/// Keeps the rectangle in memory only.
#[derive(Default)]
pub struct MemoryRectPreference {
    rect: Mutex<Option<Rect>>,
}

impl MemoryRectPreference {
    pub fn with_rect(rect: Rect) -> Self {
        Self {
            rect: Mutex::new(Some(rect)),
        }
    }
}

impl RectPreference for MemoryRectPreference {
    fn load(&self) -> Result<Option<Rect>, CaptureError> {
        Ok(*self.rect.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn save(&self, rect: &Rect) -> Result<(), CaptureError> {
        *self.rect.lock().unwrap_or_else(PoisonError::into_inner) = Some(*rect);
        Ok(())
    }
}
