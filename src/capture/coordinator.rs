use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::capture::{
    dependencies::CaptureDependencies,
    pipeline::{CaptureRequest, load_preference, perform_capture},
    types::{CaptureError, CaptureOutcome, CaptureResult, CaptureState, CaptureStatus, TabId},
};
use crate::region::Rect;
use crate::store::{Collection, ScreenshotStore, StoreError};

/// What the coordinator knows about one tab.
#[derive(Debug, Clone, Default)]
pub struct TabSession {
    pub state: CaptureState,
    /// The overlay's rectangle as last shown or reported; `None` while idle.
    pub selection: Option<Rect>,
    pub status: CaptureStatus,
    in_flight: bool,
}

/// Drives the show / confirm / cancel selection protocol for every tab and
/// hands confirmed selections to the crop engine and the store.
///
/// Any failure returns the tab to [`CaptureState::Idle`]; the captured frame
/// is dropped and nothing is retried. A step whose future is dropped before it
/// completes (a caller timeout, an aborted task) also leaves the tab idle.
pub struct CaptureCoordinator {
    dependencies: Arc<CaptureDependencies>,
    store: Arc<ScreenshotStore>,
    settle_delay: Duration,
    sessions: Mutex<HashMap<TabId, TabSession>>,
    active_collection: tokio::sync::Mutex<Option<String>>,
}

impl CaptureCoordinator {
    pub fn new(
        dependencies: CaptureDependencies,
        store: Arc<ScreenshotStore>,
        settle_delay: Duration,
    ) -> Self {
        Self {
            dependencies: Arc::new(dependencies),
            store,
            settle_delay,
            sessions: Mutex::new(HashMap::new()),
            active_collection: tokio::sync::Mutex::new(None),
        }
    }

    /// Make `collection_id` the target of subsequent captures.
    pub async fn set_active_collection(&self, collection_id: &str) -> Result<(), CaptureError> {
        if self.store.get_collection(collection_id).await?.is_none() {
            return Err(StoreError::collection_not_found(collection_id).into());
        }
        *self.active_collection.lock().await = Some(collection_id.to_string());
        log::info!("Active collection set to {}", collection_id);
        Ok(())
    }

    /// Target the store's default collection, creating it as `name` if needed.
    pub async fn use_default_collection(&self, name: &str) -> Result<Collection, CaptureError> {
        let collection = self.store.ensure_default_collection(name).await?;
        *self.active_collection.lock().await = Some(collection.id.clone());
        log::info!(
            "Active collection set to default '{}' ({})",
            collection.name,
            collection.id
        );
        Ok(collection)
    }

    pub async fn active_collection(&self) -> Option<String> {
        self.active_collection.lock().await.clone()
    }

    pub async fn state(&self, tab: TabId) -> CaptureState {
        self.session(tab).await.state
    }

    pub async fn status(&self, tab: TabId) -> CaptureStatus {
        self.session(tab).await.status
    }

    pub async fn session(&self, tab: TabId) -> TabSession {
        self.sessions().get(&tab).cloned().unwrap_or_default()
    }

    /// Idle → Adjusting: show the selector at the remembered rectangle.
    ///
    /// Calling this while already adjusting re-shows the selector.
    pub async fn begin(&self, tab: TabId) -> Result<(), CaptureError> {
        let step = self.claim(tab, Step::Show)?;

        let default_rect = match load_preference(Arc::clone(&self.dependencies.preference)).await {
            Ok(rect) => rect,
            Err(err) => {
                log::warn!("Ignoring remembered selection: {}", err);
                None
            }
        };

        match self
            .dependencies
            .overlay
            .show_selector(tab, default_rect)
            .await
        {
            Ok(()) => {
                log::info!("Selector shown on tab {}", tab);
                step.finish(|session| {
                    session.state = CaptureState::Adjusting;
                    session.selection = default_rect;
                    session.status = CaptureStatus::Adjusting;
                });
                Ok(())
            }
            Err(err) => {
                step.fail(&err);
                Err(err)
            }
        }
    }

    /// Adjusting → Idle: capture the selected region and store it.
    pub async fn confirm(&self, tab: TabId) -> Result<CaptureResult, CaptureError> {
        let step = self.claim(tab, Step::Confirm)?;

        match self.run_confirm(&step).await {
            Ok(result) => {
                log::info!(
                    "Capture on tab {} stored as item {} ({} bytes)",
                    tab,
                    result.item_id,
                    result.byte_len
                );
                step.finish(|session| {
                    session.state = CaptureState::Idle;
                    session.selection = None;
                    session.status = CaptureStatus::Success {
                        item_id: result.item_id,
                    };
                });
                Ok(result)
            }
            Err(err) => {
                if !matches!(err, CaptureError::NoActiveSelection) {
                    // The selector may still be up if we failed before hiding it.
                    if let Err(hide_err) = self.dependencies.overlay.hide_selector(tab).await {
                        log::warn!("Failed to hide selector on tab {}: {}", tab, hide_err);
                    }
                }
                step.fail(&err);
                Err(err)
            }
        }
    }

    /// Adjusting → Idle without capturing.
    pub async fn cancel(&self, tab: TabId) -> Result<(), CaptureError> {
        let step = self.claim(tab, Step::Hide)?;

        let hidden = self.dependencies.overlay.hide_selector(tab).await;
        if let Err(err) = &hidden {
            log::error!("Failed to hide selector on tab {}: {}", tab, err);
        }

        step.finish(|session| {
            session.state = CaptureState::Idle;
            session.selection = None;
            session.status = CaptureStatus::Cancelled;
        });
        log::info!("Selection on tab {} cancelled", tab);
        hidden
    }

    /// The single capture button: show the selector when idle, capture when adjusting.
    ///
    /// Errors are logged and reported as [`CaptureOutcome::Failed`].
    pub async fn toggle(&self, tab: TabId) -> CaptureOutcome {
        match self.state(tab).await {
            CaptureState::Idle => match self.begin(tab).await {
                Ok(()) => CaptureOutcome::Adjusting,
                Err(err) => CaptureOutcome::Failed(err.to_string()),
            },
            CaptureState::Adjusting => match self.confirm(tab).await {
                Ok(result) => CaptureOutcome::Success(result),
                Err(err) => CaptureOutcome::Failed(err.to_string()),
            },
        }
    }

    async fn run_confirm(&self, step: &StepGuard<'_>) -> Result<CaptureResult, CaptureError> {
        let tab = step.tab;
        let rect = self
            .dependencies
            .overlay
            .get_rect(tab)
            .await?
            .ok_or(CaptureError::NoActiveSelection)?;

        step.update(|session| session.selection = Some(rect));

        let collection_id = self
            .active_collection()
            .await
            .ok_or(CaptureError::NoActiveCollection)?;

        let request = CaptureRequest {
            tab,
            rect,
            collection_id,
            settle_delay: self.settle_delay,
        };

        perform_capture(request, Arc::clone(&self.dependencies), &self.store).await
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<TabId, TabSession>> {
        lock_sessions(&self.sessions)
    }

    /// Mark a step as running on `tab`, refusing overlapping steps.
    ///
    /// The in-flight check and the Idle check for a confirm happen under one
    /// lock, so no other step can slip in between them.
    fn claim(&self, tab: TabId, step: Step) -> Result<StepGuard<'_>, CaptureError> {
        let mut sessions = self.sessions();
        let session = sessions.entry(tab).or_default();
        if session.in_flight {
            log::warn!(
                "Capture step requested on tab {} while another is running; ignoring",
                tab
            );
            return Err(CaptureError::InProgress);
        }
        if step == Step::Confirm && session.state == CaptureState::Idle {
            let err = CaptureError::NoActiveSelection;
            log::error!("Capture on tab {} failed: {}", tab, err);
            session.status = CaptureStatus::Failed(err.to_string());
            return Err(err);
        }
        session.in_flight = true;
        Ok(StepGuard {
            sessions: &self.sessions,
            tab,
            released: false,
        })
    }
}

fn lock_sessions(
    sessions: &Mutex<HashMap<TabId, TabSession>>,
) -> MutexGuard<'_, HashMap<TabId, TabSession>> {
    sessions.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Show,
    Confirm,
    Hide,
}

/// Holds a tab's in-flight flag for the duration of one step.
///
/// Dropping the guard without [`StepGuard::finish`] means the step's future
/// was abandoned mid-await; the tab is reset to idle so later steps are not
/// refused forever.
struct StepGuard<'a> {
    sessions: &'a Mutex<HashMap<TabId, TabSession>>,
    tab: TabId,
    released: bool,
}

impl StepGuard<'_> {
    /// Change the session while keeping the tab claimed.
    fn update(&self, change: impl FnOnce(&mut TabSession)) {
        let mut sessions = lock_sessions(self.sessions);
        change(sessions.entry(self.tab).or_default());
    }

    /// Apply `change` and release the tab.
    fn finish(mut self, change: impl FnOnce(&mut TabSession)) {
        let mut sessions = lock_sessions(self.sessions);
        let session = sessions.entry(self.tab).or_default();
        change(session);
        session.in_flight = false;
        self.released = true;
    }

    fn fail(self, err: &CaptureError) {
        log::error!("Capture on tab {} failed: {}", self.tab, err);
        let status = CaptureStatus::Failed(err.to_string());
        self.finish(|session| {
            session.state = CaptureState::Idle;
            session.selection = None;
            session.status = status;
        });
    }
}

impl Drop for StepGuard<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        log::warn!(
            "Capture step on tab {} was interrupted; returning to idle",
            self.tab
        );
        let mut sessions = lock_sessions(self.sessions);
        let session = sessions.entry(self.tab).or_default();
        session.state = CaptureState::Idle;
        session.selection = None;
        session.status = CaptureStatus::Failed("capture step was interrupted".to_string());
        session.in_flight = false;
    }
}
