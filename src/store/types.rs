//! Entity and error types for the screenshot store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Store-assigned item identifier; strictly increasing across the store.
pub type ItemId = u64;

/// A named group of captured items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// One stored capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub id: ItemId,
    pub collection_id: String,
    /// Encoded image bytes (PNG for captures taken through the crop engine).
    pub image: Vec<u8>,
    pub timestamp: DateTime<Utc>,
    /// Number of items the collection held when this one was inserted.
    pub order: u64,
}

/// Which kind of entity a lookup failed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Collection,
    Item,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Collection => f.write_str("collection"),
            EntityKind::Item => f.write_str("item"),
        }
    }
}

/// Errors raised by the persistent store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} '{id}' not found")]
    NotFound { kind: EntityKind, id: String },

    #[error("storage operation failed: {0}")]
    StorageFailed(String),

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("catalog serialisation error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn collection_not_found(id: impl Into<String>) -> Self {
        StoreError::NotFound {
            kind: EntityKind::Collection,
            id: id.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

impl From<anyhow::Error> for StoreError {
    fn from(err: anyhow::Error) -> Self {
        StoreError::StorageFailed(format!("{err:#}"))
    }
}
