//! Frame source that reads an already-captured screenshot from disk.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::task;

use crate::capture::dependencies::FrameSource;
use crate::capture::types::{CaptureError, CapturedFrame, TabId};

/// Serves the image at `path` as the full frame of every tab.
pub struct FileFrameSource {
    path: PathBuf,
    device_pixel_ratio: f64,
}

impl FileFrameSource {
    pub fn new(path: impl Into<PathBuf>, device_pixel_ratio: f64) -> Self {
        Self {
            path: path.into(),
            device_pixel_ratio,
        }
    }
}

#[async_trait]
impl FrameSource for FileFrameSource {
    async fn capture_full_frame(&self, tab: TabId) -> Result<Option<CapturedFrame>, CaptureError> {
        let path = self.path.clone();
        let data = task::spawn_blocking(move || std::fs::read(&path))
            .await
            .map_err(|e| CaptureError::TaskFailed(format!("Frame read task failed: {}", e)))?
            .map_err(|e| {
                CaptureError::CaptureFailed(format!("cannot read {}: {}", self.path.display(), e))
            })?;

        log::debug!(
            "Read {} byte frame for tab {} from {}",
            data.len(),
            tab,
            self.path.display()
        );

        if data.is_empty() {
            return Ok(None);
        }

        Ok(Some(CapturedFrame {
            data,
            device_pixel_ratio: self.device_pixel_ratio,
        }))
    }
}
