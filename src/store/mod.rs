//! Persistent screenshot store.
//!
//! Collections and item metadata live in a single catalog file that is
//! rewritten atomically (temporary file, sync, rename) under an advisory file
//! lock, with optional gzip compression and a one-deep backup. Image bytes are
//! kept as separate blob files. An item exists once the catalog commit that
//! names it succeeds, which is what makes cascading collection deletes
//! all-or-nothing.

mod catalog;
mod options;
mod repository;
mod types;

pub use options::{DEFAULT_AUTO_COMPRESS_THRESHOLD_BYTES, StoreOptions, options_from_config};
pub use repository::ScreenshotStore;
pub use types::{Collection, EntityKind, Item, ItemId, StoreError};
