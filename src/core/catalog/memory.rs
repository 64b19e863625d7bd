//! In-memory catalog backend for testing.

use super::{Catalog, CatalogEntry, EntryId, NewEntry};
use crate::core::hasher::ContentHash;
use crate::error::CatalogError;
use chrono::Utc;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Number of successful mutations of each kind since creation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MutationCounts {
    pub inserts: usize,
    pub path_updates: usize,
    pub hash_updates: usize,
    pub deletions: usize,
}

impl MutationCounts {
    /// Sum of all mutation kinds
    pub fn total(&self) -> usize {
        self.inserts + self.path_updates + self.hash_updates + self.deletions
    }
}

struct Stored {
    entry: CatalogEntry,
    deleted: bool,
}

#[derive(Default)]
struct State {
    rows: BTreeMap<EntryId, Stored>,
    next_id: EntryId,
    counts: MutationCounts,
}

/// In-memory catalog backend
///
/// Enforces the same uniqueness rules as the SQLite backend: one active
/// entry per content hash and per path. Tests can switch it offline or
/// make writes for specific paths fail.
pub struct InMemoryCatalog {
    state: RwLock<State>,
    enforce_unique_hash: bool,
    offline: AtomicBool,
    failing_paths: RwLock<HashSet<PathBuf>>,
    calls: AtomicUsize,
}

impl InMemoryCatalog {
    /// Create a new, empty in-memory catalog
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State {
                next_id: 1,
                ..Default::default()
            }),
            enforce_unique_hash: true,
            offline: AtomicBool::new(false),
            failing_paths: RwLock::new(HashSet::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// A catalog that accepts several active entries with the same hash,
    /// like a store written by an older version without the constraint.
    pub fn without_hash_constraint() -> Self {
        Self {
            enforce_unique_hash: false,
            ..Self::new()
        }
    }

    /// Make every call fail as if the backend were gone
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Make inserts and path updates targeting `path` fail
    pub fn fail_writes_for(&self, path: impl Into<PathBuf>) {
        if let Ok(mut paths) = self.failing_paths.write() {
            paths.insert(path.into());
        }
    }

    /// Successful mutations so far
    pub fn mutations(&self) -> MutationCounts {
        self.state.read().map(|s| s.counts).unwrap_or_default()
    }

    /// Number of trait calls made so far, reads included
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Whether the entry exists and has been soft-deleted
    pub fn is_deleted(&self, id: EntryId) -> bool {
        self.state
            .read()
            .map(|s| s.rows.get(&id).map(|r| r.deleted).unwrap_or(false))
            .unwrap_or(false)
    }

    /// Total records, soft-deleted ones included
    pub fn len_including_deleted(&self) -> usize {
        self.state.read().map(|s| s.rows.len()).unwrap_or(0)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, CatalogError> {
        self.check_online()?;
        self.state.read().map_err(|_| CatalogError::Corrupted {
            path: PathBuf::from("memory"),
        })
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, CatalogError> {
        self.check_online()?;
        self.state.write().map_err(|_| CatalogError::Corrupted {
            path: PathBuf::from("memory"),
        })
    }

    fn check_online(&self) -> Result<(), CatalogError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(CatalogError::Unavailable {
                location: "memory".to_string(),
                reason: "catalog is offline".to_string(),
            });
        }
        Ok(())
    }

    fn check_writable(&self, path: &Path) -> Result<(), CatalogError> {
        let failing = self
            .failing_paths
            .read()
            .map(|paths| paths.contains(path))
            .unwrap_or(false);
        if failing {
            return Err(CatalogError::QueryFailed(format!(
                "write rejected for {}",
                path.display()
            )));
        }
        Ok(())
    }
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl State {
    fn active(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.rows.values().filter(|r| !r.deleted).map(|r| &r.entry)
    }

    fn active_mut(&mut self, id: EntryId) -> Result<&mut CatalogEntry, CatalogError> {
        match self.rows.get_mut(&id) {
            Some(row) if !row.deleted => Ok(&mut row.entry),
            _ => Err(CatalogError::NotFound { id }),
        }
    }

    fn path_taken(&self, path: &Path, except: EntryId) -> bool {
        self.active().any(|e| e.id != except && e.file_path == path)
    }

    fn hash_taken(&self, hash: &ContentHash, except: EntryId) -> bool {
        self.active().any(|e| e.id != except && e.content_hash == *hash)
    }
}

impl Catalog for InMemoryCatalog {
    fn find_by_hash(&self, hash: &ContentHash) -> Result<Option<CatalogEntry>, CatalogError> {
        Ok(self.find_all_by_hash(hash)?.into_iter().next())
    }

    fn find_all_by_hash(&self, hash: &ContentHash) -> Result<Vec<CatalogEntry>, CatalogError> {
        let state = self.read()?;
        let mut found: Vec<CatalogEntry> = state
            .active()
            .filter(|e| e.content_hash == *hash)
            .cloned()
            .collect();
        found.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(found)
    }

    fn find_by_path(&self, path: &Path) -> Result<Option<CatalogEntry>, CatalogError> {
        let state = self.read()?;
        let found = state.active().find(|e| e.file_path == path).cloned();
        Ok(found)
    }

    fn insert(&self, entry: NewEntry) -> Result<EntryId, CatalogError> {
        self.check_writable(&entry.file_path)?;
        let mut state = self.write()?;

        if state.path_taken(&entry.file_path, 0) {
            return Err(CatalogError::Constraint(format!(
                "path already catalogued: {}",
                entry.file_path.display()
            )));
        }
        if self.enforce_unique_hash && state.hash_taken(&entry.content_hash, 0) {
            return Err(CatalogError::Constraint(format!(
                "content hash already catalogued: {}",
                entry.content_hash
            )));
        }

        let id = state.next_id;
        state.next_id += 1;
        state.rows.insert(
            id,
            Stored {
                entry: CatalogEntry {
                    id,
                    metadata: entry.metadata,
                    file_path: entry.file_path,
                    content_hash: entry.content_hash,
                    created_at: Utc::now(),
                },
                deleted: false,
            },
        );
        state.counts.inserts += 1;
        Ok(id)
    }

    fn update_path(&self, id: EntryId, new_path: &Path) -> Result<(), CatalogError> {
        self.check_writable(new_path)?;
        let mut state = self.write()?;

        if state.path_taken(new_path, id) {
            return Err(CatalogError::Constraint(format!(
                "path already catalogued: {}",
                new_path.display()
            )));
        }

        state.active_mut(id)?.file_path = new_path.to_path_buf();
        state.counts.path_updates += 1;
        Ok(())
    }

    fn update_hash(&self, id: EntryId, new_hash: &ContentHash) -> Result<(), CatalogError> {
        let mut state = self.write()?;

        if self.enforce_unique_hash && state.hash_taken(new_hash, id) {
            return Err(CatalogError::Constraint(format!(
                "content hash already catalogued: {}",
                new_hash
            )));
        }

        state.active_mut(id)?.content_hash = *new_hash;
        state.counts.hash_updates += 1;
        Ok(())
    }

    fn mark_deleted(&self, id: EntryId) -> Result<(), CatalogError> {
        let mut state = self.write()?;

        match state.rows.get_mut(&id) {
            Some(row) if !row.deleted => row.deleted = true,
            _ => return Err(CatalogError::NotFound { id }),
        }
        state.counts.deletions += 1;
        Ok(())
    }

    fn list_active(&self) -> Result<Vec<CatalogEntry>, CatalogError> {
        let state = self.read()?;
        let entries = state.active().cloned().collect();
        Ok(entries)
    }
}
