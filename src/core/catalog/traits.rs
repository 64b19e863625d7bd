//! Catalog backend trait definition.

use super::{CatalogEntry, EntryId, NewEntry};
use crate::core::hasher::ContentHash;
use crate::error::CatalogError;
use std::path::Path;

/// Durable storage consumed by the scan engine.
///
/// Every call is synchronous and must be atomic and durable once it
/// returns `Ok`. Lookups only ever see active (not soft-deleted) entries.
pub trait Catalog: Send + Sync {
    /// Find the active entry with this content hash
    fn find_by_hash(&self, hash: &ContentHash) -> Result<Option<CatalogEntry>, CatalogError>;

    /// Find every active entry with this content hash.
    ///
    /// More than one result means the store is inconsistent; backends that
    /// enforce hash uniqueness can keep the default.
    fn find_all_by_hash(&self, hash: &ContentHash) -> Result<Vec<CatalogEntry>, CatalogError> {
        Ok(self.find_by_hash(hash)?.into_iter().collect())
    }

    /// Find the active entry stored at this path
    fn find_by_path(&self, path: &Path) -> Result<Option<CatalogEntry>, CatalogError>;

    /// Persist a new entry and return its assigned id
    fn insert(&self, entry: NewEntry) -> Result<EntryId, CatalogError>;

    /// Point an entry at a new file path
    fn update_path(&self, id: EntryId, new_path: &Path) -> Result<(), CatalogError>;

    /// Record new content for an entry whose file changed in place
    fn update_hash(&self, id: EntryId, new_hash: &ContentHash) -> Result<(), CatalogError>;

    /// Soft-delete an entry. The record is kept but no longer active.
    fn mark_deleted(&self, id: EntryId) -> Result<(), CatalogError>;

    /// All active entries
    fn list_active(&self) -> Result<Vec<CatalogEntry>, CatalogError>;
}
