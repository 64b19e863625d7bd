//! Scan sessions: one running scan at a time, with cooperative cancellation.

use crate::error::ScanError;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Lifecycle of a single scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanState {
    Idle,
    Scanning,
    Reconciling,
    Completed,
    Aborted,
}

impl ScanState {
    /// Allowed transitions: `Idle → Scanning → Reconciling → Completed`,
    /// or to `Aborted` from any non-terminal state.
    pub fn can_advance_to(self, next: ScanState) -> bool {
        use ScanState::*;
        matches!(
            (self, next),
            (Idle, Scanning)
                | (Scanning, Reconciling)
                | (Reconciling, Completed)
                | (Idle | Scanning | Reconciling, Aborted)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ScanState::Completed | ScanState::Aborted)
    }
}

/// Cooperative cancellation flag shared between a session and its callers
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the scan to stop before its next unit of work
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Lock file guarding a catalog database: `catalog.db` → `catalog.db.lock`
pub fn lock_path_for(db_path: &Path) -> PathBuf {
    let mut name = db_path.as_os_str().to_os_string();
    name.push(".lock");
    PathBuf::from(name)
}

/// Grants scan sessions, at most one at a time.
///
/// Clones share the same slot. With a lock file, the slot is also shared
/// with every other process that uses the same file.
#[derive(Debug, Clone, Default)]
pub struct ScanCoordinator {
    busy: Arc<AtomicBool>,
    lock_file: Option<PathBuf>,
}

impl ScanCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// A coordinator that also holds an exclusive lock on `path` for the
    /// length of each session.
    pub fn with_lock_file(path: impl Into<PathBuf>) -> Self {
        Self {
            busy: Arc::default(),
            lock_file: Some(path.into()),
        }
    }

    /// Start a session, or refuse if one is already running.
    ///
    /// The slot is released when the returned session is dropped.
    pub fn begin(&self) -> Result<ScanSession, ScanError> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("scan requested while another is in progress");
            return Err(ScanError::ConcurrencyRejected);
        }

        let lock = match self.lock_file.as_deref().map(acquire_lock).transpose() {
            Ok(lock) => lock,
            Err(error) => {
                self.busy.store(false, Ordering::Release);
                return Err(error);
            }
        };

        let session = ScanSession {
            id: Uuid::new_v4(),
            state: ScanState::Idle,
            cancel: CancellationToken::new(),
            busy: Arc::clone(&self.busy),
            _lock: lock,
        };
        debug!(session = %session.id, "scan session granted");
        Ok(session)
    }

    /// Whether a session is currently held
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Non-blocking exclusive lock; the lock is released when the file closes.
fn acquire_lock(path: &Path) -> Result<File, ScanError> {
    let lock_failed = |source| ScanError::LockFailed {
        path: path.to_path_buf(),
        source,
    };

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(lock_failed)?;

    // fs2's method, not the std one of the same name
    match FileExt::try_lock_exclusive(&file) {
        Ok(()) => {
            debug!(path = %path.display(), "acquired catalog lock");
            Ok(file)
        }
        Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => {
            warn!(path = %path.display(), "catalog is locked by another scan");
            Err(ScanError::ConcurrencyRejected)
        }
        Err(e) => Err(lock_failed(e)),
    }
}

/// Exclusive handle on the catalog for the length of one scan
#[derive(Debug)]
pub struct ScanSession {
    id: Uuid,
    state: ScanState,
    cancel: CancellationToken,
    busy: Arc<AtomicBool>,
    _lock: Option<File>,
}

impl ScanSession {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    /// A token that cancels this session from another thread
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Move to `next` if the transition is allowed
    pub(crate) fn advance(&mut self, next: ScanState) -> bool {
        if !self.state.can_advance_to(next) {
            warn!(session = %self.id, from = ?self.state, to = ?next, "ignored invalid scan state transition");
            return false;
        }
        debug!(session = %self.id, from = ?self.state, to = ?next, "scan state changed");
        self.state = next;
        true
    }
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn second_session_is_rejected_until_first_drops() {
        let coordinator = ScanCoordinator::new();

        let first = coordinator.begin().unwrap();
        assert!(coordinator.is_busy());
        assert!(matches!(
            coordinator.begin(),
            Err(ScanError::ConcurrencyRejected)
        ));

        drop(first);
        assert!(!coordinator.is_busy());
        assert!(coordinator.begin().is_ok());
    }

    #[test]
    fn cloned_coordinators_share_the_slot() {
        let coordinator = ScanCoordinator::new();
        let other = coordinator.clone();

        let _session = coordinator.begin().unwrap();
        assert!(other.begin().is_err());
    }

    #[test]
    fn state_machine_follows_the_happy_path() {
        let coordinator = ScanCoordinator::new();
        let mut session = coordinator.begin().unwrap();

        assert_eq!(session.state(), ScanState::Idle);
        assert!(session.advance(ScanState::Scanning));
        assert!(session.advance(ScanState::Reconciling));
        assert!(session.advance(ScanState::Completed));
        assert!(session.state().is_terminal());
    }

    #[test]
    fn invalid_transitions_are_refused() {
        assert!(!ScanState::Idle.can_advance_to(ScanState::Completed));
        assert!(!ScanState::Completed.can_advance_to(ScanState::Aborted));
        assert!(!ScanState::Reconciling.can_advance_to(ScanState::Scanning));
        assert!(ScanState::Scanning.can_advance_to(ScanState::Aborted));
    }

    #[test]
    fn cancellation_token_is_shared() {
        let coordinator = ScanCoordinator::new();
        let session = coordinator.begin().unwrap();
        let token = session.cancellation_token();

        assert!(!session.is_cancelled());
        token.cancel();
        assert!(session.is_cancelled());
    }

    #[test]
    fn lock_file_sits_next_to_database() {
        assert_eq!(
            lock_path_for(Path::new("/data/catalog.db")),
            PathBuf::from("/data/catalog.db.lock")
        );
        assert_eq!(
            lock_path_for(Path::new("/data/catalog")),
            PathBuf::from("/data/catalog.lock")
        );
    }

    #[test]
    fn coordinators_sharing_a_lock_file_exclude_each_other() {
        let temp_dir = TempDir::new().unwrap();
        let lock = lock_path_for(&temp_dir.path().join("catalog.db"));
        let first = ScanCoordinator::with_lock_file(&lock);
        let second = ScanCoordinator::with_lock_file(&lock);

        let held = first.begin().unwrap();
        assert!(lock.exists());
        assert!(matches!(
            second.begin(),
            Err(ScanError::ConcurrencyRejected)
        ));
        assert!(!second.is_busy());

        drop(held);
        assert!(second.begin().is_ok());
    }

    #[test]
    fn unusable_lock_file_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let coordinator =
            ScanCoordinator::with_lock_file(temp_dir.path().join("missing/catalog.db.lock"));

        assert!(matches!(
            coordinator.begin(),
            Err(ScanError::LockFailed { .. })
        ));
        assert!(!coordinator.is_busy());
    }

    #[test]
    fn sessions_have_distinct_ids() {
        let coordinator = ScanCoordinator::new();
        let a = coordinator.begin().unwrap().id();
        let b = coordinator.begin().unwrap().id();
        assert_ne!(a, b);
    }
}
