//! Event type definitions for progress reporting.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// All events emitted during a catalog scan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// Session lifecycle events
    Session(SessionEvent),
    /// Directory walk events
    Scan(ScanEvent),
    /// Fingerprinting events
    Hash(HashEvent),
    /// Catalog changes applied by reconciliation
    Reconcile(ReconcileEvent),
}

/// Session lifecycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SessionEvent {
    /// A scan session was granted
    Started {
        session_id: String,
        targets: Vec<PathBuf>,
    },
    /// Moving to a new phase
    PhaseChanged { phase: ScanPhase },
    /// The scan ran to completion
    Completed { summary: ScanSummary },
    /// The scan stopped early; mutations already applied stand
    Aborted { reason: String },
}

/// Phases of a scan, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanPhase {
    Walking,
    Hashing,
    Classifying,
    Sweeping,
}

impl std::fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanPhase::Walking => write!(f, "Walking"),
            ScanPhase::Hashing => write!(f, "Hashing"),
            ScanPhase::Classifying => write!(f, "Classifying"),
            ScanPhase::Sweeping => write!(f, "Sweeping"),
        }
    }
}

/// Events during the directory walk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScanEvent {
    /// Walking has started
    Started { paths: Vec<PathBuf> },
    /// A target was not walked (missing, unreadable or excluded)
    TargetSkipped { path: PathBuf, reason: String },
    /// Progress update while walking
    Progress(ScanProgress),
    /// A candidate book file was found
    FileFound { path: PathBuf },
    /// An error occurred but walking continues
    Error { path: PathBuf, message: String },
    /// Walking completed
    Completed { total_files: usize },
}

/// Progress information during the walk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanProgress {
    pub directories_scanned: usize,
    pub files_found: usize,
    pub current_path: PathBuf,
}

/// Events during fingerprinting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum HashEvent {
    /// Hashing has started
    Started { total_files: usize },
    /// A file was hashed (or failed to hash)
    Progress(HashProgress),
    /// A file could not be hashed and will be skipped
    Error { path: PathBuf, message: String },
    /// Hashing completed
    Completed { total_hashed: usize, failed: usize },
}

/// Progress information during hashing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashProgress {
    pub completed: usize,
    pub total: usize,
    pub current_path: PathBuf,
}

/// Catalog mutations and per-file warnings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ReconcileEvent {
    /// A new entry was created
    Inserted { id: i64, path: PathBuf },
    /// An entry now points at a new path
    Moved { id: i64, from: PathBuf, to: PathBuf },
    /// An entry's file changed in place
    ContentChanged { id: i64, path: PathBuf },
    /// An entry lost its path to a moved file and was soft-deleted
    Replaced { id: i64, path: PathBuf },
    /// An entry's file is gone and it was soft-deleted
    Deleted { id: i64, path: PathBuf },
    /// A file was skipped
    Warning { path: PathBuf, message: String },
}

/// Totals reported when a scan completes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub files_seen: usize,
    pub inserted: usize,
    pub moved: usize,
    pub content_updated: usize,
    pub deleted: usize,
    pub skipped: usize,
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_serializable() {
        let event = Event::Reconcile(ReconcileEvent::Moved {
            id: 7,
            from: PathBuf::from("/books/a.epub"),
            to: PathBuf::from("/books/b.epub"),
        });

        let json = serde_json::to_string(&event).unwrap();
        let deserialized: Event = serde_json::from_str(&json).unwrap();

        match deserialized {
            Event::Reconcile(ReconcileEvent::Moved { id, to, .. }) => {
                assert_eq!(id, 7);
                assert_eq!(to, PathBuf::from("/books/b.epub"));
            }
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn scan_summary_is_serializable() {
        let summary = ScanSummary {
            files_seen: 1000,
            inserted: 12,
            duration_ms: 5000,
            ..Default::default()
        };

        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"inserted\":12"));
    }
}
