use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Notify;

use super::{
    coordinator::CaptureCoordinator,
    dependencies::{CaptureDependencies, FrameSource, OverlayChannel, RectPreference},
    preference::MemoryRectPreference,
    types::{CaptureError, CaptureOutcome, CaptureState, CaptureStatus, CapturedFrame, TabId},
};
use crate::crop::{CropError, tests::gradient_png};
use crate::region::Rect;
use crate::store::{Collection, ScreenshotStore, StoreError, StoreOptions};

#[derive(Debug, Clone, PartialEq)]
enum OverlayCall {
    Show(TabId, Option<Rect>),
    GetRect(TabId),
    Hide(TabId),
}

#[derive(Clone, Default)]
struct MockOverlay {
    rect: Arc<Mutex<Option<Rect>>>,
    calls: Arc<Mutex<Vec<OverlayCall>>>,
    fail_show: bool,
}

impl MockOverlay {
    fn reporting(rect: Option<Rect>) -> Self {
        Self {
            rect: Arc::new(Mutex::new(rect)),
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<OverlayCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl OverlayChannel for MockOverlay {
    async fn show_selector(
        &self,
        tab: TabId,
        default_rect: Option<Rect>,
    ) -> Result<(), CaptureError> {
        self.calls
            .lock()
            .unwrap()
            .push(OverlayCall::Show(tab, default_rect));
        if self.fail_show {
            Err(CaptureError::Overlay("selector script not injected".to_string()))
        } else {
            Ok(())
        }
    }

    async fn get_rect(&self, tab: TabId) -> Result<Option<Rect>, CaptureError> {
        self.calls.lock().unwrap().push(OverlayCall::GetRect(tab));
        Ok(*self.rect.lock().unwrap())
    }

    async fn hide_selector(&self, tab: TabId) -> Result<(), CaptureError> {
        self.calls.lock().unwrap().push(OverlayCall::Hide(tab));
        Ok(())
    }
}

#[derive(Clone)]
struct MockSource {
    frame: Option<CapturedFrame>,
    calls: Arc<Mutex<usize>>,
    /// Overlay call log, to check the selector was hidden before the grab.
    overlay_calls: Arc<Mutex<Vec<OverlayCall>>>,
    hidden_at_capture: Arc<Mutex<Option<bool>>>,
}

impl MockSource {
    fn new(frame: Option<CapturedFrame>, overlay: &MockOverlay) -> Self {
        Self {
            frame,
            calls: Arc::new(Mutex::new(0)),
            overlay_calls: overlay.calls.clone(),
            hidden_at_capture: Arc::new(Mutex::new(None)),
        }
    }

    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl FrameSource for MockSource {
    async fn capture_full_frame(&self, _tab: TabId) -> Result<Option<CapturedFrame>, CaptureError> {
        *self.calls.lock().unwrap() += 1;
        let last = self.overlay_calls.lock().unwrap().last().cloned();
        *self.hidden_at_capture.lock().unwrap() = Some(matches!(last, Some(OverlayCall::Hide(_))));
        Ok(self.frame.clone())
    }
}

/// Source that parks inside the capture until released.
struct ParkedSource {
    entered: Arc<Notify>,
    release: Arc<Notify>,
    frame: CapturedFrame,
}

#[async_trait]
impl FrameSource for ParkedSource {
    async fn capture_full_frame(&self, _tab: TabId) -> Result<Option<CapturedFrame>, CaptureError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(Some(self.frame.clone()))
    }
}

fn frame(width: u32, height: u32, dpr: f64) -> CapturedFrame {
    CapturedFrame {
        data: gradient_png(width, height),
        device_pixel_ratio: dpr,
    }
}

struct Fixture {
    _temp: tempfile::TempDir,
    store: Arc<ScreenshotStore>,
    deck: Collection,
}

async fn fixture() -> Fixture {
    let temp = tempfile::tempdir().unwrap();
    let store = Arc::new(ScreenshotStore::open(StoreOptions::new(temp.path())).unwrap());
    let deck = store.create_collection("deck").await.unwrap();
    Fixture {
        _temp: temp,
        store,
        deck,
    }
}

async fn coordinator_with(
    fixture: &Fixture,
    overlay: &MockOverlay,
    source: Arc<dyn FrameSource>,
    preference: Arc<dyn RectPreference>,
    settle_delay: Duration,
) -> CaptureCoordinator {
    let deps = CaptureDependencies::new(Arc::new(overlay.clone()), source, preference);
    let coordinator = CaptureCoordinator::new(deps, Arc::clone(&fixture.store), settle_delay);
    coordinator
        .set_active_collection(&fixture.deck.id)
        .await
        .unwrap();
    coordinator
}

#[tokio::test]
async fn begin_shows_selector_at_remembered_rect() {
    let fx = fixture().await;
    let remembered = Rect::new(40.0, 30.0, 320.0, 180.0);
    let overlay = MockOverlay::default();
    let source = MockSource::new(None, &overlay);
    let coordinator = coordinator_with(
        &fx,
        &overlay,
        Arc::new(source),
        Arc::new(MemoryRectPreference::with_rect(remembered)),
        Duration::ZERO,
    )
    .await;

    coordinator.begin(1).await.unwrap();

    assert_eq!(overlay.calls(), vec![OverlayCall::Show(1, Some(remembered))]);
    let session = coordinator.session(1).await;
    assert_eq!(session.state, CaptureState::Adjusting);
    assert_eq!(session.selection, Some(remembered));
    assert_eq!(session.status, CaptureStatus::Adjusting);
    // Other tabs are untouched.
    assert_eq!(coordinator.state(2).await, CaptureState::Idle);
}

#[tokio::test]
async fn confirm_crops_stores_and_returns_to_idle() {
    let fx = fixture().await;
    let selected = Rect::new(10.0, 20.0, 100.0, 50.0);
    let overlay = MockOverlay::reporting(Some(selected));
    let source = MockSource::new(Some(frame(400, 300, 2.0)), &overlay);
    let source_handle = source.clone();
    let preference = Arc::new(MemoryRectPreference::default());
    let coordinator = coordinator_with(
        &fx,
        &overlay,
        Arc::new(source),
        preference.clone(),
        Duration::ZERO,
    )
    .await;

    coordinator.begin(7).await.unwrap();
    let result = coordinator.confirm(7).await.unwrap();

    assert_eq!(result.collection_id, fx.deck.id);
    assert_eq!(result.rect, selected);
    assert_eq!(source_handle.calls(), 1);
    assert_eq!(*source_handle.hidden_at_capture.lock().unwrap(), Some(true));
    assert_eq!(preference.load().unwrap(), Some(selected));

    let stored = fx.store.get_item(result.item_id).await.unwrap();
    let decoded = image::load_from_memory(&stored.image).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (200, 100));
    assert_eq!(stored.order, 0);

    let session = coordinator.session(7).await;
    assert_eq!(session.state, CaptureState::Idle);
    assert_eq!(session.selection, None);
    assert_eq!(
        session.status,
        CaptureStatus::Success {
            item_id: result.item_id
        }
    );
}

#[tokio::test]
async fn missing_selector_fails_without_capturing() {
    let fx = fixture().await;
    let overlay = MockOverlay::reporting(None);
    let source = MockSource::new(Some(frame(10, 10, 1.0)), &overlay);
    let source_handle = source.clone();
    let coordinator = coordinator_with(
        &fx,
        &overlay,
        Arc::new(source),
        Arc::new(MemoryRectPreference::default()),
        Duration::ZERO,
    )
    .await;

    coordinator.begin(1).await.unwrap();
    let err = coordinator.confirm(1).await.unwrap_err();

    assert!(matches!(err, CaptureError::NoActiveSelection), "got {err:?}");
    assert_eq!(source_handle.calls(), 0);
    assert_eq!(coordinator.state(1).await, CaptureState::Idle);
    assert!(matches!(
        coordinator.status(1).await,
        CaptureStatus::Failed(_)
    ));
    assert_eq!(fx.store.count_items(&fx.deck.id).await.unwrap(), 0);
}

#[tokio::test]
async fn confirm_while_idle_does_not_query_overlay() {
    let fx = fixture().await;
    let overlay = MockOverlay::reporting(Some(Rect::new(0.0, 0.0, 5.0, 5.0)));
    let source = MockSource::new(Some(frame(10, 10, 1.0)), &overlay);
    let coordinator = coordinator_with(
        &fx,
        &overlay,
        Arc::new(source),
        Arc::new(MemoryRectPreference::default()),
        Duration::ZERO,
    )
    .await;

    let err = coordinator.confirm(3).await.unwrap_err();
    assert!(matches!(err, CaptureError::NoActiveSelection));
    assert!(overlay.calls().is_empty());
}

#[tokio::test]
async fn empty_frame_is_capture_failure() {
    let fx = fixture().await;
    let overlay = MockOverlay::reporting(Some(Rect::new(0.0, 0.0, 5.0, 5.0)));
    let source = MockSource::new(
        Some(CapturedFrame {
            data: Vec::new(),
            device_pixel_ratio: 1.0,
        }),
        &overlay,
    );
    let coordinator = coordinator_with(
        &fx,
        &overlay,
        Arc::new(source),
        Arc::new(MemoryRectPreference::default()),
        Duration::ZERO,
    )
    .await;

    coordinator.begin(1).await.unwrap();
    let err = coordinator.confirm(1).await.unwrap_err();

    assert!(matches!(err, CaptureError::CaptureFailed(_)), "got {err:?}");
    assert_eq!(coordinator.state(1).await, CaptureState::Idle);
    assert_eq!(fx.store.count_items(&fx.deck.id).await.unwrap(), 0);
}

#[tokio::test]
async fn no_frame_at_all_is_capture_failure() {
    let fx = fixture().await;
    let overlay = MockOverlay::reporting(Some(Rect::new(0.0, 0.0, 5.0, 5.0)));
    let source = MockSource::new(None, &overlay);
    let coordinator = coordinator_with(
        &fx,
        &overlay,
        Arc::new(source),
        Arc::new(MemoryRectPreference::default()),
        Duration::ZERO,
    )
    .await;

    coordinator.begin(1).await.unwrap();
    assert!(matches!(
        coordinator.confirm(1).await,
        Err(CaptureError::CaptureFailed(_))
    ));
}

#[tokio::test]
async fn undecodable_frame_is_decode_error() {
    let fx = fixture().await;
    let overlay = MockOverlay::reporting(Some(Rect::new(0.0, 0.0, 5.0, 5.0)));
    let source = MockSource::new(
        Some(CapturedFrame {
            data: b"definitely not a png".to_vec(),
            device_pixel_ratio: 1.0,
        }),
        &overlay,
    );
    let coordinator = coordinator_with(
        &fx,
        &overlay,
        Arc::new(source),
        Arc::new(MemoryRectPreference::default()),
        Duration::ZERO,
    )
    .await;

    coordinator.begin(1).await.unwrap();
    let err = coordinator.confirm(1).await.unwrap_err();

    assert!(
        matches!(err, CaptureError::Crop(CropError::DecodeError(_))),
        "got {err:?}"
    );
    assert_eq!(coordinator.state(1).await, CaptureState::Idle);
}

#[tokio::test]
async fn deleted_collection_surfaces_store_error() {
    let fx = fixture().await;
    let overlay = MockOverlay::reporting(Some(Rect::new(0.0, 0.0, 5.0, 5.0)));
    let source = MockSource::new(Some(frame(10, 10, 1.0)), &overlay);
    let coordinator = coordinator_with(
        &fx,
        &overlay,
        Arc::new(source),
        Arc::new(MemoryRectPreference::default()),
        Duration::ZERO,
    )
    .await;

    coordinator.begin(1).await.unwrap();
    fx.store.delete_collection(&fx.deck.id).await.unwrap();
    let err = coordinator.confirm(1).await.unwrap_err();

    assert!(
        matches!(err, CaptureError::Store(StoreError::NotFound { .. })),
        "got {err:?}"
    );
    assert_eq!(coordinator.state(1).await, CaptureState::Idle);
}

#[tokio::test]
async fn missing_active_collection_hides_selector() {
    let fx = fixture().await;
    let overlay = MockOverlay::reporting(Some(Rect::new(0.0, 0.0, 5.0, 5.0)));
    let source = MockSource::new(Some(frame(10, 10, 1.0)), &overlay);
    let source_handle = source.clone();
    let deps = CaptureDependencies::new(
        Arc::new(overlay.clone()),
        Arc::new(source),
        Arc::new(MemoryRectPreference::default()),
    );
    let coordinator = CaptureCoordinator::new(deps, Arc::clone(&fx.store), Duration::ZERO);

    coordinator.begin(1).await.unwrap();
    let err = coordinator.confirm(1).await.unwrap_err();

    assert!(matches!(err, CaptureError::NoActiveCollection));
    assert_eq!(source_handle.calls(), 0);
    assert_eq!(overlay.calls().last(), Some(&OverlayCall::Hide(1)));
}

#[tokio::test]
async fn cancel_hides_without_capturing() {
    let fx = fixture().await;
    let overlay = MockOverlay::reporting(Some(Rect::new(0.0, 0.0, 5.0, 5.0)));
    let source = MockSource::new(Some(frame(10, 10, 1.0)), &overlay);
    let source_handle = source.clone();
    let coordinator = coordinator_with(
        &fx,
        &overlay,
        Arc::new(source),
        Arc::new(MemoryRectPreference::default()),
        Duration::ZERO,
    )
    .await;

    coordinator.begin(4).await.unwrap();
    coordinator.cancel(4).await.unwrap();

    assert_eq!(overlay.calls().last(), Some(&OverlayCall::Hide(4)));
    assert_eq!(source_handle.calls(), 0);
    assert_eq!(coordinator.state(4).await, CaptureState::Idle);
    assert_eq!(coordinator.status(4).await, CaptureStatus::Cancelled);
}

#[tokio::test]
async fn toggle_walks_through_both_states() {
    let fx = fixture().await;
    let overlay = MockOverlay::reporting(Some(Rect::new(1.0, 1.0, 8.0, 8.0)));
    let source = MockSource::new(Some(frame(20, 20, 1.0)), &overlay);
    let coordinator = coordinator_with(
        &fx,
        &overlay,
        Arc::new(source),
        Arc::new(MemoryRectPreference::default()),
        Duration::ZERO,
    )
    .await;

    assert!(matches!(coordinator.toggle(1).await, CaptureOutcome::Adjusting));
    match coordinator.toggle(1).await {
        CaptureOutcome::Success(result) => assert_eq!(result.collection_id, fx.deck.id),
        other => panic!("Expected success outcome, got {other:?}"),
    }
    assert!(matches!(coordinator.toggle(1).await, CaptureOutcome::Adjusting));
}

#[tokio::test]
async fn settle_delay_elapses_before_capture() {
    let fx = fixture().await;
    let overlay = MockOverlay::reporting(Some(Rect::new(0.0, 0.0, 5.0, 5.0)));
    let source = MockSource::new(Some(frame(10, 10, 1.0)), &overlay);
    let delay = Duration::from_millis(40);
    let coordinator = coordinator_with(
        &fx,
        &overlay,
        Arc::new(source),
        Arc::new(MemoryRectPreference::default()),
        delay,
    )
    .await;

    coordinator.begin(1).await.unwrap();
    let started = Instant::now();
    coordinator.confirm(1).await.unwrap();
    assert!(started.elapsed() >= delay);
}

#[tokio::test]
async fn show_failure_leaves_tab_idle() {
    let fx = fixture().await;
    let overlay = MockOverlay {
        fail_show: true,
        ..MockOverlay::default()
    };
    let source = MockSource::new(None, &overlay);
    let coordinator = coordinator_with(
        &fx,
        &overlay,
        Arc::new(source),
        Arc::new(MemoryRectPreference::default()),
        Duration::ZERO,
    )
    .await;

    match coordinator.toggle(1).await {
        CaptureOutcome::Failed(msg) => assert!(msg.contains("not injected"), "{msg}"),
        other => panic!("Expected failure outcome, got {other:?}"),
    }
    assert_eq!(coordinator.state(1).await, CaptureState::Idle);
}

#[tokio::test]
async fn unknown_collection_cannot_be_activated() {
    let fx = fixture().await;
    let overlay = MockOverlay::default();
    let source = MockSource::new(None, &overlay);
    let coordinator = coordinator_with(
        &fx,
        &overlay,
        Arc::new(source),
        Arc::new(MemoryRectPreference::default()),
        Duration::ZERO,
    )
    .await;

    let err = coordinator.set_active_collection("ghost").await.unwrap_err();
    assert!(matches!(err, CaptureError::Store(StoreError::NotFound { .. })));
    assert_eq!(coordinator.active_collection().await, Some(fx.deck.id.clone()));
}

#[tokio::test]
async fn overlapping_steps_on_one_tab_are_refused() {
    let fx = fixture().await;
    let overlay = MockOverlay::reporting(Some(Rect::new(0.0, 0.0, 5.0, 5.0)));
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let source = ParkedSource {
        entered: entered.clone(),
        release: release.clone(),
        frame: frame(10, 10, 1.0),
    };
    let coordinator = Arc::new(
        coordinator_with(
            &fx,
            &overlay,
            Arc::new(source),
            Arc::new(MemoryRectPreference::default()),
            Duration::ZERO,
        )
        .await,
    );

    coordinator.begin(1).await.unwrap();
    let running = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move { coordinator.confirm(1).await })
    };
    entered.notified().await;

    assert!(matches!(
        coordinator.cancel(1).await,
        Err(CaptureError::InProgress)
    ));
    // Another tab is independent.
    coordinator.begin(2).await.unwrap();

    release.notify_one();
    running.await.unwrap().unwrap();
    assert_eq!(coordinator.state(1).await, CaptureState::Idle);
}

#[tokio::test]
async fn abandoned_confirm_returns_tab_to_idle() {
    let fx = fixture().await;
    let overlay = MockOverlay::reporting(Some(Rect::new(0.0, 0.0, 5.0, 5.0)));
    let source = ParkedSource {
        entered: Arc::new(Notify::new()),
        release: Arc::new(Notify::new()),
        frame: frame(10, 10, 1.0),
    };
    let coordinator = coordinator_with(
        &fx,
        &overlay,
        Arc::new(source),
        Arc::new(MemoryRectPreference::default()),
        Duration::ZERO,
    )
    .await;

    coordinator.begin(1).await.unwrap();
    // The source never releases, so the caller gives up and drops the future.
    let timed_out = tokio::time::timeout(Duration::from_millis(50), coordinator.confirm(1)).await;
    assert!(timed_out.is_err());

    let session = coordinator.session(1).await;
    assert_eq!(session.state, CaptureState::Idle);
    assert_eq!(session.selection, None);
    assert!(matches!(session.status, CaptureStatus::Failed(_)));
    assert_eq!(fx.store.count_items(&fx.deck.id).await.unwrap(), 0);

    // The tab is usable again.
    coordinator.begin(1).await.unwrap();
    coordinator.cancel(1).await.unwrap();
    assert_eq!(coordinator.status(1).await, CaptureStatus::Cancelled);
}

#[tokio::test]
async fn confirm_while_idle_records_failure_and_keeps_tab_free() {
    let fx = fixture().await;
    let overlay = MockOverlay::reporting(Some(Rect::new(0.0, 0.0, 5.0, 5.0)));
    let source = MockSource::new(Some(frame(10, 10, 1.0)), &overlay);
    let coordinator = coordinator_with(
        &fx,
        &overlay,
        Arc::new(source),
        Arc::new(MemoryRectPreference::default()),
        Duration::ZERO,
    )
    .await;

    assert!(matches!(
        coordinator.confirm(1).await,
        Err(CaptureError::NoActiveSelection)
    ));
    assert_eq!(coordinator.state(1).await, CaptureState::Idle);
    assert!(matches!(
        coordinator.status(1).await,
        CaptureStatus::Failed(_)
    ));

    // A refused confirm does not leave the tab claimed.
    coordinator.begin(1).await.unwrap();
    assert_eq!(coordinator.state(1).await, CaptureState::Adjusting);
}

#[tokio::test]
async fn second_confirm_while_capturing_is_in_progress() {
    let fx = fixture().await;
    let overlay = MockOverlay::reporting(Some(Rect::new(0.0, 0.0, 5.0, 5.0)));
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let source = ParkedSource {
        entered: entered.clone(),
        release: release.clone(),
        frame: frame(10, 10, 1.0),
    };
    let coordinator = Arc::new(
        coordinator_with(
            &fx,
            &overlay,
            Arc::new(source),
            Arc::new(MemoryRectPreference::default()),
            Duration::ZERO,
        )
        .await,
    );

    coordinator.begin(1).await.unwrap();
    let running = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move { coordinator.confirm(1).await })
    };
    entered.notified().await;

    // A second confirm sees the running step before it looks at the state.
    assert!(matches!(
        coordinator.confirm(1).await,
        Err(CaptureError::InProgress)
    ));
    assert_eq!(coordinator.status(1).await, CaptureStatus::Adjusting);

    release.notify_one();
    running.await.unwrap().unwrap();
}
