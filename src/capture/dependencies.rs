use std::sync::Arc;

use async_trait::async_trait;

use crate::capture::types::{CaptureError, CapturedFrame, TabId};
use crate::region::Rect;

/// Command channel to the selection overlay rendered on a tab.
#[async_trait]
pub trait OverlayChannel: Send + Sync {
    /// Render an adjustable selector, initialised from `default_rect` when given.
    async fn show_selector(&self, tab: TabId, default_rect: Option<Rect>)
    -> Result<(), CaptureError>;

    /// Current selector rectangle, or `None` when no selector is shown.
    async fn get_rect(&self, tab: TabId) -> Result<Option<Rect>, CaptureError>;

    /// Remove the selector. Idempotent.
    async fn hide_selector(&self, tab: TabId) -> Result<(), CaptureError>;
}

/// Abstraction over how the host grabs the visible surface.
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// `Ok(None)` means the host produced no frame.
    async fn capture_full_frame(&self, tab: TabId) -> Result<Option<CapturedFrame>, CaptureError>;
}

/// Storage for the last confirmed selection rectangle.
pub trait RectPreference: Send + Sync {
    fn load(&self) -> Result<Option<Rect>, CaptureError>;
    fn save(&self, rect: &Rect) -> Result<(), CaptureError>;
}

/// Bundle of collaborators used by the capture coordinator. Each component can be mocked in tests.
#[derive(Clone)]
pub struct CaptureDependencies {
    pub overlay: Arc<dyn OverlayChannel>,
    pub source: Arc<dyn FrameSource>,
    pub preference: Arc<dyn RectPreference>,
}

impl CaptureDependencies {
    pub fn new(
        overlay: Arc<dyn OverlayChannel>,
        source: Arc<dyn FrameSource>,
        preference: Arc<dyn RectPreference>,
    ) -> Self {
        Self {
            overlay,
            source,
            preference,
        }
    }
}
