//! Classifies one observed file against the catalog and applies the change.

use crate::core::catalog::{Catalog, CatalogEntry, EntryId, NewEntry};
use crate::core::hasher::ContentHash;
use crate::core::parser;
use crate::core::rules::RuleSet;
use crate::error::CatalogError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// What reconciliation did with one observed file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// Already cataloged at this path with this content
    Unchanged { id: EntryId },
    /// First sighting of this content
    Inserted { id: EntryId },
    /// Known content at a new path. `replaced` is the entry that held the
    /// new path before and was soft-deleted to make room.
    Moved {
        id: EntryId,
        from: PathBuf,
        replaced: Option<EntryId>,
    },
    /// Known path with new content
    ContentChanged { id: EntryId, previous: ContentHash },
    /// A second copy of content whose cataloged file is still in place
    Duplicate { id: EntryId, original: PathBuf },
}

impl Reconciliation {
    /// Number of catalog mutations this outcome applied
    pub fn mutations(&self) -> usize {
        match self {
            Reconciliation::Unchanged { .. } | Reconciliation::Duplicate { .. } => 0,
            Reconciliation::Inserted { .. } | Reconciliation::ContentChanged { .. } => 1,
            Reconciliation::Moved { replaced, .. } => 1 + usize::from(replaced.is_some()),
        }
    }
}

/// Classify `path` (with content `hash`) and persist the result.
///
/// `observed` holds every path hashed in the current scan, so a stored path
/// that is still present can be told apart from one that was vacated.
pub fn reconcile_file(
    catalog: &dyn Catalog,
    rules: &RuleSet,
    path: &Path,
    hash: &ContentHash,
    observed: &HashMap<PathBuf, ContentHash>,
) -> Result<Reconciliation, CatalogError> {
    if let Some(entry) = newest_with_hash(catalog, hash)? {
        if entry.file_path == path {
            return Ok(Reconciliation::Unchanged { id: entry.id });
        }

        if observed.get(&entry.file_path) == Some(hash) {
            debug!(
                path = %path.display(),
                original = %entry.file_path.display(),
                "duplicate content"
            );
            return Ok(Reconciliation::Duplicate {
                id: entry.id,
                original: entry.file_path,
            });
        }

        let replaced = match catalog.find_by_path(path)? {
            Some(holder) if holder.id != entry.id => {
                catalog.mark_deleted(holder.id)?;
                Some(holder.id)
            }
            _ => None,
        };

        catalog.update_path(entry.id, path)?;
        debug!(
            id = entry.id,
            from = %entry.file_path.display(),
            to = %path.display(),
            "moved"
        );
        return Ok(Reconciliation::Moved {
            id: entry.id,
            from: entry.file_path,
            replaced,
        });
    }

    if let Some(entry) = catalog.find_by_path(path)? {
        catalog.update_hash(entry.id, hash)?;
        debug!(id = entry.id, path = %path.display(), hash = %hash.short(), "content changed");
        return Ok(Reconciliation::ContentChanged {
            id: entry.id,
            previous: entry.content_hash,
        });
    }

    let metadata = parser::parse_path(path, rules);
    let id = catalog.insert(NewEntry {
        metadata,
        file_path: path.to_path_buf(),
        content_hash: *hash,
    })?;
    debug!(id, path = %path.display(), hash = %hash.short(), "inserted");
    Ok(Reconciliation::Inserted { id })
}

/// The active entry for `hash`; the most recently created one if the
/// catalog holds several.
fn newest_with_hash(
    catalog: &dyn Catalog,
    hash: &ContentHash,
) -> Result<Option<CatalogEntry>, CatalogError> {
    let mut entries = catalog.find_all_by_hash(hash)?;

    if entries.len() > 1 {
        warn!(
            hash = %hash.short(),
            count = entries.len(),
            ids = ?entries.iter().map(|e| e.id).collect::<Vec<_>>(),
            "catalog inconsistency: several active entries share one hash"
        );
    }

    entries.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
    Ok(entries.into_iter().next())
}
