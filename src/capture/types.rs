//! Data types for region capture.

use crate::crop::CropError;
use crate::region::Rect;
use crate::store::{ItemId, StoreError};
use thiserror::Error;

/// Identifies the browsing surface (tab) a capture flow belongs to.
pub type TabId = u32;

/// A full-frame grab of the visible surface as returned by the host.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    /// Encoded image bytes (PNG, JPEG, ...).
    pub data: Vec<u8>,
    /// Physical pixels per logical pixel on the surface the frame came from.
    pub device_pixel_ratio: f64,
}

/// Selection state of a single tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureState {
    /// No selector shown.
    #[default]
    Idle,
    /// Selector shown; waiting for confirm or cancel.
    Adjusting,
}

/// Result of a confirmed capture.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureResult {
    pub item_id: ItemId,
    pub collection_id: String,
    /// Selection in logical pixels, as reported by the overlay.
    pub rect: Rect,
    pub device_pixel_ratio: f64,
    /// Size of the stored PNG.
    pub byte_len: usize,
}

/// Outcome of a toggle request (the single capture button).
#[derive(Debug, Clone)]
pub enum CaptureOutcome {
    /// The selector is now shown.
    Adjusting,
    Success(CaptureResult),
    Failed(String),
}

/// Errors that can occur during region capture.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no active selection on this tab")]
    NoActiveSelection,

    #[error("full-frame capture failed: {0}")]
    CaptureFailed(String),

    #[error(transparent)]
    Crop(#[from] CropError),

    #[error("could not store capture: {0}")]
    Store(#[from] StoreError),

    #[error("overlay communication failed: {0}")]
    Overlay(String),

    #[error("selection preference unavailable: {0}")]
    Preference(String),

    #[error("no active collection selected")]
    NoActiveCollection,

    #[error("another capture step is already running on this tab")]
    InProgress,

    #[error("capture task failed: {0}")]
    TaskFailed(String),
}

/// Last known status of a tab, for surfacing in a UI.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CaptureStatus {
    /// Nothing has happened on this tab yet.
    #[default]
    Idle,
    /// Selector shown.
    Adjusting,
    /// Capture stored.
    Success { item_id: ItemId },
    /// Capture failed.
    Failed(String),
    /// Selection was cancelled by the user.
    Cancelled,
}
