//! # Scanner Module
//!
//! Discovers candidate book files under the library's scan targets.
//!
//! ## Supported Formats (default allow-list)
//! - E-books: EPUB, PDF, MOBI, AZW/AZW3, DjVu, FB2
//! - Comic archives: CBZ, CBR, CB7, CBT
//! - Plain archives: ZIP, RAR, 7z
//!
//! Excluded folders are pruned, never descended. Hidden entries are skipped
//! and symlinks are not followed.
//!
//! ## Example
//! ```rust,ignore
//! use bookshelf_catalog::core::scanner::{BookScanner, ScanConfig, WalkDirScanner};
//!
//! let scanner = WalkDirScanner::new(ScanConfig::default());
//! let walk = scanner.scan(&[ScanTarget::new("/books")], &[]);
//! ```

mod filter;
mod walker;

pub use filter::{ExtensionFilter, DEFAULT_EXTENSIONS};
pub use walker::{ScanConfig, WalkDirScanner};

use crate::core::library::{ExcludedPath, ScanTarget};
use crate::error::ScanError;
use crate::events::EventSender;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A discovered book file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookFile {
    /// Absolute, canonical path
    pub path: PathBuf,
}

/// Everything a walk over the scan targets found
#[derive(Debug, Default)]
pub struct WalkResult {
    /// Candidate files, sorted by path, each listed once
    pub files: Vec<BookFile>,
    /// Non-fatal problems met along the way
    pub errors: Vec<ScanError>,
    /// Targets that could not be walked at all
    pub unreadable_targets: Vec<PathBuf>,
    /// Directories inside walked targets whose contents could not be listed
    pub unreadable_dirs: Vec<PathBuf>,
    /// Targets skipped because an exclusion covers them
    pub excluded_targets: Vec<PathBuf>,
    /// Canonical roots that were walked
    pub walked_targets: Vec<PathBuf>,
}

impl WalkResult {
    /// Whether `path` lies somewhere the walk could not see into
    pub fn is_unobserved(&self, path: &Path) -> bool {
        self.unreadable_targets
            .iter()
            .chain(&self.unreadable_dirs)
            .any(|dir| path.starts_with(dir))
    }

    /// True when there were targets to walk and none of them could be read
    pub fn all_targets_unreadable(&self) -> bool {
        self.walked_targets.is_empty()
            && self.excluded_targets.is_empty()
            && !self.unreadable_targets.is_empty()
    }
}

/// Trait for book scanners
///
/// Implement this trait to create custom scanners (e.g., for testing).
pub trait BookScanner: Send + Sync {
    /// Walk the targets and return the candidate files
    fn scan(&self, targets: &[ScanTarget], excluded: &[ExcludedPath]) -> WalkResult;

    /// Walk with progress reporting via events
    fn scan_with_events(
        &self,
        targets: &[ScanTarget],
        excluded: &[ExcludedPath],
        events: &EventSender,
    ) -> WalkResult;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unobserved_covers_unreadable_dirs() {
        let walk = WalkResult {
            unreadable_targets: vec![PathBuf::from("/mnt/nas")],
            unreadable_dirs: vec![PathBuf::from("/books/locked")],
            ..Default::default()
        };

        assert!(walk.is_unobserved(Path::new("/mnt/nas/a.epub")));
        assert!(walk.is_unobserved(Path::new("/books/locked/b/c.pdf")));
        assert!(!walk.is_unobserved(Path::new("/books/open.pdf")));
    }

    #[test]
    fn all_unreadable_needs_at_least_one_target() {
        assert!(!WalkResult::default().all_targets_unreadable());

        let walk = WalkResult {
            unreadable_targets: vec![PathBuf::from("/gone")],
            ..Default::default()
        };
        assert!(walk.all_targets_unreadable());
    }
}
