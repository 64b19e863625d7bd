//! # Catalog Module
//!
//! The persisted record of every book the scanner has seen.
//!
//! The scan engine only talks to storage through the [`Catalog`] trait, so
//! the backend can be swapped without touching reconciliation logic.
//!
//! ## Backends
//! - `SqliteCatalog` - Durable storage using SQLite
//! - `InMemoryCatalog` - For testing, with mutation counters

mod memory;
mod sqlite;
mod traits;

pub use memory::{InMemoryCatalog, MutationCounts};
pub use sqlite::SqliteCatalog;
pub use traits::Catalog;

use crate::core::hasher::ContentHash;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Storage-assigned identity of a catalog entry
pub type EntryId = i64;

/// Highest volume number kept after coercion
pub const MAX_VOLUME: u32 = 9999;

/// Highest rating value
pub const MAX_RATING: u8 = 5;

/// Descriptive metadata for a book, as derived from its filename
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookMetadata {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    /// Volume ordinal, `0..=MAX_VOLUME`
    pub volume: Option<u32>,
    pub author: Option<String>,
    pub original_author: Option<String>,
    pub series: Option<String>,
    pub category: Option<String>,
    /// Rating, `0..=MAX_RATING`
    pub rating: Option<u8>,
    /// Magazine compilations and other multi-work volumes
    pub is_collection_volume: bool,
}

impl BookMetadata {
    /// Metadata carrying nothing but a title
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    /// True when no attribute was filled in
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// An entry about to be inserted; storage assigns `id` and `created_at`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntry {
    pub metadata: BookMetadata,
    pub file_path: PathBuf,
    pub content_hash: ContentHash,
}

/// A persisted, active catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: EntryId,
    #[serde(flatten)]
    pub metadata: BookMetadata,
    /// Absolute path of the backing file
    pub file_path: PathBuf,
    pub content_hash: ContentHash,
    /// Set once on insert, never changed
    pub created_at: DateTime<Utc>,
}

impl CatalogEntry {
    /// Title for display, falling back to the file name
    pub fn display_title(&self) -> String {
        self.metadata.title.clone().unwrap_or_else(|| {
            self.file_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
    }
}
