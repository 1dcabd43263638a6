//! Region capture for snapstack.
//!
//! This module provides:
//! - The per-tab selection state machine ([`CaptureCoordinator`])
//! - The collaborator traits it talks to (overlay, frame source, preference)
//! - In-process implementations of those collaborators for the CLI
//!
//! A confirmed selection is hidden, captured after a settle delay, cropped
//! with the device pixel ratio applied, and stored in the active collection.

pub mod overlay;
pub mod preference;
pub mod source;
pub mod types;

mod coordinator;
mod dependencies;
mod pipeline;
#[cfg(test)]
mod tests;

pub use coordinator::{CaptureCoordinator, TabSession};
pub use dependencies::{CaptureDependencies, FrameSource, OverlayChannel, RectPreference};
pub use overlay::LocalOverlay;
pub use preference::{FileRectPreference, MemoryRectPreference};
pub use source::FileFrameSource;
pub use types::{
    CaptureError, CaptureOutcome, CaptureResult, CaptureState, CaptureStatus, CapturedFrame, TabId,
};
