use std::{fmt, sync::Arc, time::Duration};

use crate::capture::{
    dependencies::{CaptureDependencies, RectPreference},
    types::{CaptureError, CaptureResult, CapturedFrame, TabId},
};
use crate::crop;
use crate::region::Rect;
use crate::store::ScreenshotStore;
use tokio::{task, time::sleep};

/// Everything needed to turn a confirmed selection into a stored item.
#[derive(Clone)]
pub(crate) struct CaptureRequest {
    pub(crate) tab: TabId,
    pub(crate) rect: Rect,
    pub(crate) collection_id: String,
    pub(crate) settle_delay: Duration,
}

impl fmt::Debug for CaptureRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureRequest")
            .field("tab", &self.tab)
            .field("rect", &format_args!("{}", self.rect))
            .field("collection_id", &self.collection_id)
            .field("settle_delay_ms", &self.settle_delay.as_millis())
            .finish()
    }
}

/// Remember the selection, hide the selector, let the host repaint, grab the
/// frame, crop it and store the result.
pub(crate) async fn perform_capture(
    request: CaptureRequest,
    dependencies: Arc<CaptureDependencies>,
    store: &ScreenshotStore,
) -> Result<CaptureResult, CaptureError> {
    log::info!("Starting capture: {:?}", request);

    // Step 1: Remember the rectangle for next time (non-fatal)
    if let Err(err) = save_preference(Arc::clone(&dependencies.preference), request.rect).await {
        log::warn!("Failed to remember selection: {}", err);
    }

    // Step 2: Hide the selector so it is not part of the frame
    dependencies.overlay.hide_selector(request.tab).await?;

    if !request.settle_delay.is_zero() {
        log::debug!(
            "Waiting {}ms for the host to repaint",
            request.settle_delay.as_millis()
        );
        sleep(request.settle_delay).await;
    }

    // Step 3: Grab the full frame
    let frame = dependencies
        .source
        .capture_full_frame(request.tab)
        .await?
        .filter(|frame| !frame.data.is_empty())
        .ok_or_else(|| CaptureError::CaptureFailed("host returned an empty frame".to_string()))?;

    log::info!(
        "Obtained frame data ({} bytes, dpr {})",
        frame.data.len(),
        frame.device_pixel_ratio
    );
    let device_pixel_ratio = frame.device_pixel_ratio;

    // Step 4: Crop to the selection
    let cropped = crop_frame(frame, request.rect).await?;
    let byte_len = cropped.len();

    // Step 5: Store
    let item_id = store.add_item(&request.collection_id, cropped).await?;

    Ok(CaptureResult {
        item_id,
        collection_id: request.collection_id,
        rect: request.rect,
        device_pixel_ratio,
        byte_len,
    })
}

async fn save_preference(
    preference: Arc<dyn RectPreference>,
    rect: Rect,
) -> Result<(), CaptureError> {
    task::spawn_blocking(move || preference.save(&rect))
        .await
        .map_err(|e| CaptureError::TaskFailed(format!("Preference task failed: {}", e)))?
}

pub(crate) async fn load_preference(
    preference: Arc<dyn RectPreference>,
) -> Result<Option<Rect>, CaptureError> {
    task::spawn_blocking(move || preference.load())
        .await
        .map_err(|e| CaptureError::TaskFailed(format!("Preference task failed: {}", e)))?
}

async fn crop_frame(frame: CapturedFrame, rect: Rect) -> Result<Vec<u8>, CaptureError> {
    task::spawn_blocking(move || crop::crop(&frame.data, &rect, frame.device_pixel_ratio))
        .await
        .map_err(|e| CaptureError::TaskFailed(format!("Crop task failed: {}", e)))?
        .map_err(CaptureError::from)
}
