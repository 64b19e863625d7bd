//! The summary handed back to the caller after a scan.

use crate::events::ScanSummary;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// How a scan ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScanOutcome {
    Completed,
    /// Stopped early. Mutations applied before the stop stand.
    Aborted { reason: String },
}

/// Per-scan tallies
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanCounts {
    /// Candidate files found by the walk
    pub files_seen: usize,
    pub inserted: usize,
    pub moved: usize,
    pub content_updated: usize,
    /// Soft-deletes, including entries displaced by a move
    pub deleted: usize,
    pub unchanged: usize,
    /// Files skipped with a warning (hash failure, persistence failure, duplicate)
    pub skipped: usize,
}

impl ScanCounts {
    /// Catalog mutations applied
    pub fn mutations(&self) -> usize {
        self.inserted + self.moved + self.content_updated + self.deleted
    }
}

/// A per-file problem that did not stop the scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanWarning {
    pub path: PathBuf,
    pub reason: String,
}

/// Aggregate result of one scan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub session_id: Uuid,
    pub outcome: ScanOutcome,
    pub counts: ScanCounts,
    pub warnings: Vec<ScanWarning>,
    pub duration_ms: u64,
}

impl ScanReport {
    pub fn is_completed(&self) -> bool {
        self.outcome == ScanOutcome::Completed
    }

    /// Totals in event form
    pub fn summary(&self) -> ScanSummary {
        ScanSummary {
            files_seen: self.counts.files_seen,
            inserted: self.counts.inserted,
            moved: self.counts.moved,
            content_updated: self.counts.content_updated,
            deleted: self.counts.deleted,
            skipped: self.counts.skipped,
            duration_ms: self.duration_ms,
        }
    }
}
