//! # Library Module
//!
//! Which folders make up the library and how they are scanned.
//!
//! ## Config file
//! ```json
//! {"targets": [{"path": "/books", "private": false},
//!              {"path": "/books-private", "private": true}],
//!  "excluded": ["/books/tmp"],
//!  "extensions": ["epub", "pdf", "cbz"],
//!  "max_file_size": 4294967296, "read_timeout_secs": 120, "hash_threads": 4}
//! ```
//! Every field is optional.

use crate::core::catalog::CatalogEntry;
use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// A folder to scan.
///
/// Private targets are scanned and cataloged like any other, but their
/// books are hidden from listings unless private mode is on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanTarget {
    pub path: PathBuf,
    #[serde(default)]
    pub private: bool,
}

impl ScanTarget {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            private: false,
        }
    }

    pub fn private(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            private: true,
        }
    }

    /// Whether `path` lies inside this target
    pub fn contains(&self, path: &Path) -> bool {
        path.starts_with(&self.path) || path.starts_with(resolve(&self.path))
    }
}

/// A folder pruned from every scan, descendants included
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExcludedPath(PathBuf);

impl ExcludedPath {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    /// Whether `path` is this folder or lies below it.
    ///
    /// Compares whole path components, so `/books/tmp` does not cover
    /// `/books/tmpfiles`.
    pub fn covers(&self, path: &Path) -> bool {
        path.starts_with(&self.0)
    }

    /// The same exclusion with symlinks and `..` resolved, when the folder exists
    pub fn resolved(&self) -> Self {
        Self(resolve(&self.0))
    }
}

/// Canonical form of `path`, or `path` itself if it cannot be resolved
pub fn resolve(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Library settings as stored in `library.json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    pub targets: Vec<ScanTarget>,
    pub excluded: Vec<ExcludedPath>,
    /// Extension allow-list; empty means the built-in list
    pub extensions: Vec<String>,
    pub max_file_size: Option<u64>,
    pub read_timeout_secs: Option<u64>,
    pub hash_threads: Option<usize>,
}

impl LibraryConfig {
    /// Read a library config file
    pub fn load(path: &Path) -> Result<Self, ConfigurationError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigurationError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config: Self =
            serde_json::from_str(&json).map_err(|e| ConfigurationError::Malformed {
                origin: path.display().to_string(),
                reason: e.to_string(),
            })?;
        config.extensions = normalize_extensions(config.extensions.iter().map(String::as_str));

        info!(
            path = %path.display(),
            targets = config.targets.len(),
            excluded = config.excluded.len(),
            "loaded library config"
        );
        Ok(config)
    }

    /// Read `path` if it exists, otherwise start from an empty config
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigurationError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}

/// Parse a comma-separated extension setting such as `"epub, .PDF,cbz"`.
pub fn parse_extension_list(setting: &str) -> Vec<String> {
    normalize_extensions(setting.split(','))
}

fn normalize_extensions<'a>(raw: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut extensions: Vec<String> = Vec::new();
    for ext in raw {
        let ext = ext.trim().trim_start_matches('.').to_lowercase();
        if !ext.is_empty() && !extensions.contains(&ext) {
            extensions.push(ext);
        }
    }
    extensions
}

/// Entries to show in a listing.
///
/// Outside private mode, entries under any private target are hidden.
pub fn visible_entries<'a>(
    entries: &'a [CatalogEntry],
    targets: &[ScanTarget],
    private_mode: bool,
) -> Vec<&'a CatalogEntry> {
    if private_mode {
        return entries.iter().collect();
    }

    let private: Vec<&ScanTarget> = targets.iter().filter(|t| t.private).collect();
    entries
        .iter()
        .filter(|entry| !private.iter().any(|t| t.contains(&entry.file_path)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::BookMetadata;
    use crate::core::hasher::ContentHasher;
    use chrono::Utc;
    use tempfile::TempDir;

    fn entry(id: i64, path: &str) -> CatalogEntry {
        CatalogEntry {
            id,
            metadata: BookMetadata::titled(format!("book {id}")),
            file_path: PathBuf::from(path),
            content_hash: ContentHasher::default().hash_bytes(path.as_bytes()),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn exclusion_compares_components() {
        let excluded = ExcludedPath::new("/books/tmp");

        assert!(excluded.covers(Path::new("/books/tmp")));
        assert!(excluded.covers(Path::new("/books/tmp/a/b.pdf")));
        assert!(!excluded.covers(Path::new("/books/tmpfiles/b.pdf")));
        assert!(!excluded.covers(Path::new("/books")));
    }

    #[test]
    fn extension_setting_is_normalised() {
        assert_eq!(
            parse_extension_list(" epub, .PDF,,cbz ,epub"),
            vec!["epub", "pdf", "cbz"]
        );
        assert!(parse_extension_list("  ").is_empty());
    }

    #[test]
    fn config_fields_are_optional() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("library.json");
        fs::write(&path, r#"{"targets": [{"path": "/books"}]}"#).unwrap();

        let config = LibraryConfig::load(&path).unwrap();

        assert_eq!(config.targets, vec![ScanTarget::new("/books")]);
        assert!(config.excluded.is_empty());
        assert_eq!(config.hash_threads, None);
    }

    #[test]
    fn config_extensions_are_normalised() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("library.json");
        fs::write(
            &path,
            r#"{"excluded": ["/books/tmp"], "extensions": [".EPUB", "pdf"]}"#,
        )
        .unwrap();

        let config = LibraryConfig::load(&path).unwrap();

        assert_eq!(config.extensions, vec!["epub", "pdf"]);
        assert_eq!(config.excluded, vec![ExcludedPath::new("/books/tmp")]);
    }

    #[test]
    fn malformed_config_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("library.json");
        fs::write(&path, r#"{"targets": "nope"}"#).unwrap();

        assert!(matches!(
            LibraryConfig::load(&path),
            Err(ConfigurationError::Malformed { .. })
        ));
    }

    #[test]
    fn missing_config_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = LibraryConfig::load_or_default(&temp_dir.path().join("none.json")).unwrap();
        assert_eq!(config, LibraryConfig::default());
    }

    #[test]
    fn private_entries_hidden_outside_private_mode() {
        let entries = vec![
            entry(1, "/books/public/a.epub"),
            entry(2, "/books/secret/b.epub"),
        ];
        let targets = vec![
            ScanTarget::new("/books/public"),
            ScanTarget::private("/books/secret"),
        ];

        let shown = visible_entries(&entries, &targets, false);
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].id, 1);

        assert_eq!(visible_entries(&entries, &targets, true).len(), 2);
    }
}
