//! File filtering logic for the scanner.

use std::collections::HashSet;
use std::path::Path;

/// Extensions scanned when no allow-list is configured
pub const DEFAULT_EXTENSIONS: [&str; 14] = [
    "epub", "pdf", "mobi", "azw", "azw3", "djvu", "fb2", "cbz", "cbr", "cb7", "cbt", "zip", "rar",
    "7z",
];

/// Filters files to determine if they are candidate books
#[derive(Debug, Clone)]
pub struct ExtensionFilter {
    /// Lowercase extensions without the leading dot
    extensions: HashSet<String>,
    include_hidden: bool,
}

impl ExtensionFilter {
    /// Create a new filter with the default e-book and archive extensions
    pub fn new() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            include_hidden: false,
        }
    }

    /// Include hidden files (starting with .)
    pub fn with_hidden(mut self, include: bool) -> Self {
        self.include_hidden = include;
        self
    }

    /// Override the allow-list. An empty list keeps the defaults.
    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        let normalized: HashSet<String> = extensions
            .iter()
            .map(|e| e.trim().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();

        if !normalized.is_empty() {
            self.extensions = normalized;
        }
        self
    }

    /// Accepted extensions, sorted
    pub fn extensions(&self) -> Vec<&str> {
        let mut list: Vec<&str> = self.extensions.iter().map(String::as_str).collect();
        list.sort_unstable();
        list
    }

    /// Check if a file should be included
    pub fn should_include(&self, path: &Path) -> bool {
        if !self.include_hidden && is_hidden(path) {
            return false;
        }

        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| self.extensions.contains(&ext.to_lowercase()))
            .unwrap_or(false)
    }
}

impl Default for ExtensionFilter {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether the final path component starts with a dot
pub(super) fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}
