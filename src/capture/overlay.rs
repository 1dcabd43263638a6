//! In-process overlay model.
//!
//! Keeps at most one selector rectangle per tab, which is exactly the state a
//! rendered overlay would hold. Used by the CLI, where "dragging" the
//! selector is replaced by [`LocalOverlay::adjust`].

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::capture::dependencies::OverlayChannel;
use crate::capture::types::{CaptureError, TabId};
use crate::region::Rect;

pub struct LocalOverlay {
    fallback_rect: Rect,
    selectors: Mutex<HashMap<TabId, Rect>>,
}

impl LocalOverlay {
    /// `fallback_rect` is used when `show_selector` gets no default.
    pub fn new(fallback_rect: Rect) -> Self {
        Self {
            fallback_rect,
            selectors: Mutex::new(HashMap::new()),
        }
    }

    /// Move/resize the selector on `tab`. Returns `false` if none is shown.
    pub fn adjust(&self, tab: TabId, rect: Rect) -> bool {
        match self.selectors().get_mut(&tab) {
            Some(current) => {
                log::debug!("Selector on tab {} adjusted to {}", tab, rect);
                *current = rect;
                true
            }
            None => false,
        }
    }

    pub fn active_rect(&self, tab: TabId) -> Option<Rect> {
        self.selectors().get(&tab).copied()
    }

    fn selectors(&self) -> MutexGuard<'_, HashMap<TabId, Rect>> {
        self.selectors.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl OverlayChannel for LocalOverlay {
    async fn show_selector(
        &self,
        tab: TabId,
        default_rect: Option<Rect>,
    ) -> Result<(), CaptureError> {
        let rect = default_rect.unwrap_or(self.fallback_rect);
        log::debug!("Showing selector on tab {} at {}", tab, rect);
        // A second show replaces the existing selector.
        self.selectors().insert(tab, rect);
        Ok(())
    }

    async fn get_rect(&self, tab: TabId) -> Result<Option<Rect>, CaptureError> {
        Ok(self.active_rect(tab))
    }

    async fn hide_selector(&self, tab: TabId) -> Result<(), CaptureError> {
        if self.selectors().remove(&tab).is_some() {
            log::debug!("Selector on tab {} hidden", tab);
        }
        Ok(())
    }
}
