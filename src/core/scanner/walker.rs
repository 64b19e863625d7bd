//! Directory walking implementation using walkdir.

use super::filter::{is_hidden, ExtensionFilter};
use super::{BookFile, BookScanner, WalkResult};
use crate::core::library::{resolve, ExcludedPath, ScanTarget};
use crate::error::ScanError;
use crate::events::{Event, EventSender, ScanEvent, ScanProgress};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Configuration for the directory scanner
#[derive(Debug, Clone, Default)]
pub struct ScanConfig {
    /// Whether to follow symbolic links
    pub follow_symlinks: bool,
    /// Whether to include hidden files and directories
    pub include_hidden: bool,
    /// Maximum directory depth (None = unlimited)
    pub max_depth: Option<usize>,
    /// Custom extensions to include (None = use defaults)
    pub extensions: Option<Vec<String>>,
}

/// Scanner implementation using the walkdir crate
pub struct WalkDirScanner {
    config: ScanConfig,
    filter: ExtensionFilter,
}

impl WalkDirScanner {
    /// Create a new scanner with the given configuration
    pub fn new(config: ScanConfig) -> Self {
        let mut filter = ExtensionFilter::new().with_hidden(config.include_hidden);

        if let Some(ref extensions) = config.extensions {
            filter = filter.with_extensions(extensions.clone());
        }

        Self { config, filter }
    }

    pub fn filter(&self) -> &ExtensionFilter {
        &self.filter
    }

    /// Resolve a target to a walkable directory
    fn open_target(path: &Path) -> Result<PathBuf, ScanError> {
        let root = fs::canonicalize(path).map_err(|e| target_error(path, e))?;

        if !root.is_dir() {
            return Err(ScanError::DirectoryNotFound {
                path: path.to_path_buf(),
            });
        }

        // canonicalize succeeds on directories we may not list
        fs::read_dir(&root).map_err(|e| target_error(path, e))?;

        Ok(root)
    }

    /// Walk a single canonical root
    fn scan_directory(
        &self,
        root: &Path,
        excluded: &[ExcludedPath],
        events: &EventSender,
        result: &mut WalkResult,
    ) {
        let include_hidden = self.config.include_hidden;
        let mut directories_scanned = 0;

        let mut walker = WalkDir::new(root).follow_links(self.config.follow_symlinks);
        if let Some(depth) = self.config.max_depth {
            walker = walker.max_depth(depth);
        }

        let entries = walker.into_iter().filter_entry(|entry| {
            if entry.depth() == 0 {
                return true;
            }
            if !include_hidden && is_hidden(entry.path()) {
                return false;
            }
            !excluded.iter().any(|x| x.covers(entry.path()))
        });

        for entry_result in entries {
            match entry_result {
                Ok(entry) => {
                    let path = entry.path();

                    if entry.file_type().is_dir() {
                        directories_scanned += 1;
                        events.send(Event::Scan(ScanEvent::Progress(ScanProgress {
                            directories_scanned,
                            files_found: result.files.len(),
                            current_path: path.to_path_buf(),
                        })));
                        continue;
                    }

                    // Symlinks are not regular files unless followed
                    if !entry.file_type().is_file() || !self.filter.should_include(path) {
                        continue;
                    }

                    events.send(Event::Scan(ScanEvent::FileFound {
                        path: path.to_path_buf(),
                    }));
                    result.files.push(BookFile {
                        path: path.to_path_buf(),
                    });
                }
                Err(e) => {
                    let path = e.path().map(|p| p.to_path_buf()).unwrap_or_default();

                    let error = if e.io_error().map(|e| e.kind()) == Some(ErrorKind::PermissionDenied)
                    {
                        ScanError::PermissionDenied { path: path.clone() }
                    } else {
                        ScanError::ReadDirectory {
                            path: path.clone(),
                            source: std::io::Error::new(ErrorKind::Other, e.to_string()),
                        }
                    };

                    warn!(path = %path.display(), "{}", error);
                    events.send(Event::Scan(ScanEvent::Error {
                        path: path.clone(),
                        message: error.to_string(),
                    }));

                    if !path.as_os_str().is_empty() {
                        result.unreadable_dirs.push(path);
                    }
                    result.errors.push(error);
                }
            }
        }
    }
}

impl BookScanner for WalkDirScanner {
    fn scan(&self, targets: &[ScanTarget], excluded: &[ExcludedPath]) -> WalkResult {
        self.scan_with_events(targets, excluded, &crate::events::null_sender())
    }

    fn scan_with_events(
        &self,
        targets: &[ScanTarget],
        excluded: &[ExcludedPath],
        events: &EventSender,
    ) -> WalkResult {
        events.send(Event::Scan(ScanEvent::Started {
            paths: targets.iter().map(|t| t.path.clone()).collect(),
        }));

        // Compare against both spellings so a symlinked exclusion still prunes
        let mut exclusions: Vec<ExcludedPath> = Vec::with_capacity(excluded.len() * 2);
        for x in excluded {
            for candidate in [x.clone(), x.resolved()] {
                if !exclusions.contains(&candidate) {
                    exclusions.push(candidate);
                }
            }
        }

        let mut result = WalkResult::default();

        for target in targets {
            let root = match Self::open_target(&target.path) {
                Ok(root) => root,
                Err(error) => {
                    warn!(path = %target.path.display(), "{}", error);
                    events.send(Event::Scan(ScanEvent::TargetSkipped {
                        path: target.path.clone(),
                        reason: error.to_string(),
                    }));
                    result.unreadable_targets.push(target.path.clone());
                    result.unreadable_targets.push(resolve(&target.path));
                    result.errors.push(error);
                    continue;
                }
            };

            if exclusions.iter().any(|x| x.covers(&root)) {
                debug!(path = %root.display(), "target lies under an excluded path");
                events.send(Event::Scan(ScanEvent::TargetSkipped {
                    path: target.path.clone(),
                    reason: "excluded".to_string(),
                }));
                result.excluded_targets.push(root);
                continue;
            }

            if result.walked_targets.contains(&root) {
                continue;
            }

            self.scan_directory(&root, &exclusions, events, &mut result);
            result.walked_targets.push(root);
        }

        result.unreadable_targets.dedup();

        // Overlapping targets see the same files
        result.files.sort_by(|a, b| a.path.cmp(&b.path));
        result.files.dedup_by(|a, b| a.path == b.path);

        events.send(Event::Scan(ScanEvent::Completed {
            total_files: result.files.len(),
        }));

        result
    }
}

fn target_error(path: &Path, error: std::io::Error) -> ScanError {
    match error.kind() {
        ErrorKind::NotFound => ScanError::DirectoryNotFound {
            path: path.to_path_buf(),
        },
        ErrorKind::PermissionDenied => ScanError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => ScanError::ReadDirectory {
            path: path.to_path_buf(),
            source: error,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    fn create_book(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let mut file = File::create(&path).unwrap();
        file.write_all(name.as_bytes()).unwrap();
        path
    }

    fn scan(dir: &TempDir, excluded: &[ExcludedPath]) -> WalkResult {
        WalkDirScanner::new(ScanConfig::default())
            .scan(&[ScanTarget::new(dir.path())], excluded)
    }

    #[test]
    fn scan_empty_directory_returns_empty_vec() {
        let temp_dir = TempDir::new().unwrap();
        let result = scan(&temp_dir, &[]);

        assert!(result.files.is_empty());
        assert!(result.errors.is_empty());
        assert_eq!(result.walked_targets.len(), 1);
    }

    #[test]
    fn scan_finds_books_and_ignores_other_files() {
        let temp_dir = TempDir::new().unwrap();
        create_book(temp_dir.path(), "dune.epub");
        create_book(temp_dir.path(), "cover.jpg");
        create_book(temp_dir.path(), "notes.txt");

        let result = scan(&temp_dir, &[]);

        assert_eq!(result.files.len(), 1);
        assert!(result.files[0].path.ends_with("dune.epub"));
    }

    #[test]
    fn scan_returns_canonical_sorted_paths() {
        let temp_dir = TempDir::new().unwrap();
        create_book(temp_dir.path(), "b/two.pdf");
        create_book(temp_dir.path(), "a/one.pdf");

        let result = scan(&temp_dir, &[]);

        assert_eq!(result.files.len(), 2);
        assert!(result.files[0].path.is_absolute());
        assert!(result.files[0].path < result.files[1].path);
        assert!(result.files[0].path.starts_with(fs::canonicalize(temp_dir.path()).unwrap()));
    }

    #[test]
    fn excluded_directories_are_pruned() {
        let temp_dir = TempDir::new().unwrap();
        create_book(temp_dir.path(), "keep/a.epub");
        create_book(temp_dir.path(), "tmp/b.epub");
        create_book(temp_dir.path(), "tmp/deep/c.epub");
        create_book(temp_dir.path(), "tmpfiles/d.epub");

        let result = scan(&temp_dir, &[ExcludedPath::new(temp_dir.path().join("tmp"))]);

        let names: Vec<_> = result
            .files
            .iter()
            .map(|f| f.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.epub", "d.epub"]);
    }

    #[test]
    fn target_under_exclusion_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        create_book(temp_dir.path(), "private/a.epub");

        let scanner = WalkDirScanner::new(ScanConfig::default());
        let result = scanner.scan(
            &[ScanTarget::new(temp_dir.path().join("private"))],
            &[ExcludedPath::new(temp_dir.path())],
        );

        assert!(result.files.is_empty());
        assert_eq!(result.excluded_targets.len(), 1);
        assert!(result.unreadable_targets.is_empty());
    }

    #[test]
    fn hidden_entries_are_skipped() {
        let temp_dir = TempDir::new().unwrap();
        create_book(temp_dir.path(), "visible.epub");
        create_book(temp_dir.path(), ".hidden.epub");
        create_book(temp_dir.path(), ".trash/gone.epub");

        let result = scan(&temp_dir, &[]);

        assert_eq!(result.files.len(), 1);
        assert!(result.files[0].path.ends_with("visible.epub"));
    }

    #[test]
    fn overlapping_targets_list_files_once() {
        let temp_dir = TempDir::new().unwrap();
        create_book(temp_dir.path(), "manga/a.cbz");

        let scanner = WalkDirScanner::new(ScanConfig::default());
        let result = scanner.scan(
            &[
                ScanTarget::new(temp_dir.path()),
                ScanTarget::private(temp_dir.path().join("manga")),
            ],
            &[],
        );

        assert_eq!(result.files.len(), 1);
    }

    #[test]
    fn nonexistent_target_is_recorded() {
        let scanner = WalkDirScanner::new(ScanConfig::default());
        let result = scanner.scan(&[ScanTarget::new("/nonexistent/path/12345")], &[]);

        assert!(!result.errors.is_empty());
        assert!(result.all_targets_unreadable());
        assert!(result.is_unobserved(Path::new("/nonexistent/path/12345/a.epub")));
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_not_followed() {
        let temp_dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        let real = create_book(outside.path(), "elsewhere.epub");
        std::os::unix::fs::symlink(&real, temp_dir.path().join("link.epub")).unwrap();

        let result = scan(&temp_dir, &[]);

        assert!(result.files.is_empty());
    }
}
