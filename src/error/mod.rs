//! # Error Module
//!
//! Error types for the catalog engine.
//!
//! ## Design Principles
//! - **Never panic** on user data - filenames and folders are untrusted
//! - **Include context** - paths, rule names, what went wrong
//! - **Per-file errors are data** - scans record them and keep going
//! - **Recovery hints** - suggest how to fix when possible

use std::path::PathBuf;
use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum CatalogerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigurationError),

    #[error("Scanning error: {0}")]
    Scan(#[from] ScanError),

    #[error("Hashing error: {0}")]
    Hash(#[from] HashError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),
}

/// Errors raised while loading parsing rules or library configuration.
///
/// A scan cannot start while one of these is outstanding.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Failed to read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed configuration in {origin}: {reason}")]
    Malformed { origin: String, reason: String },

    #[error("Rule '{rule}' has an empty pattern")]
    EmptyPattern { rule: String },

    #[error("Rule '{rule}' must define exactly one of `regex` or `template`")]
    AmbiguousPattern { rule: String },

    #[error("Rule '{rule}' has an invalid pattern: {reason}")]
    InvalidPattern { rule: String, reason: String },

    #[error("Rule '{rule}' maps to unknown attribute '{attribute}'")]
    UnknownAttribute { rule: String, attribute: String },

    #[error("Rule '{rule}' maps capture '{capture}' which the pattern does not define")]
    MissingCapture { rule: String, capture: String },

    #[error("Rule '{rule}' does not map any recognised attribute")]
    NoRecognisedAttribute { rule: String },
}

/// Errors that occur while walking scan targets
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    #[error("Permission denied accessing: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("Failed to read directory {path}: {source}")]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("A scan is already in progress. Try again once it has finished.")]
    ConcurrencyRejected,

    #[error("Scan was cancelled")]
    Cancelled,

    #[error("Failed to start hashing workers: {0}")]
    ThreadPool(String),

    #[error("Failed to lock {path}: {source}")]
    LockFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ScanError {
    /// The path the error is about, if any
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            ScanError::DirectoryNotFound { path }
            | ScanError::PermissionDenied { path }
            | ScanError::ReadDirectory { path, .. }
            | ScanError::LockFailed { path, .. } => Some(path),
            _ => None,
        }
    }
}

/// Errors that occur while fingerprinting a file.
///
/// Always per-file: the scan records the failure and skips the file.
#[derive(Error, Debug)]
pub enum HashError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is {size} bytes, above the {limit} byte hashing limit")]
    TooLarge { path: PathBuf, size: u64, limit: u64 },

    #[error("Reading {path} took longer than {seconds}s")]
    TimedOut { path: PathBuf, seconds: u64 },

    #[error("Invalid content hash '{value}': expected 64 hex characters")]
    InvalidDigest { value: String },
}

/// Errors raised by a catalog backend
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Catalog is unavailable at {location}: {reason}")]
    Unavailable { location: String, reason: String },

    #[error("Catalog query failed: {0}")]
    QueryFailed(String),

    #[error("Catalog rejected the change: {0}")]
    Constraint(String),

    #[error("No active catalog entry with id {id}")]
    NotFound { id: i64 },

    #[error("Catalog corruption detected at {path}. Restore a backup or delete this file and rescan.")]
    Corrupted { path: PathBuf },
}

impl CatalogError {
    /// Whether the backend as a whole is unusable (as opposed to one
    /// failed mutation). Fatal errors abort the running scan.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CatalogError::Unavailable { .. } | CatalogError::Corrupted { .. }
        )
    }
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, CatalogerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_error_includes_path() {
        let error = ScanError::DirectoryNotFound {
            path: PathBuf::from("/books/manga"),
        };
        assert!(error.to_string().contains("/books/manga"));
    }

    #[test]
    fn concurrency_rejection_asks_to_retry() {
        let message = ScanError::ConcurrencyRejected.to_string();
        assert!(message.contains("Try again"));
    }

    #[test]
    fn hash_error_includes_limit() {
        let error = HashError::TooLarge {
            path: PathBuf::from("/books/huge.pdf"),
            size: 10,
            limit: 5,
        };
        let message = error.to_string();
        assert!(message.contains("/books/huge.pdf"));
        assert!(message.contains("5 byte"));
    }

    #[test]
    fn only_backend_failures_are_fatal() {
        let unavailable = CatalogError::Unavailable {
            location: "catalog.db".to_string(),
            reason: "disk I/O error".to_string(),
        };
        assert!(unavailable.is_fatal());
        assert!(!CatalogError::QueryFailed("locked".to_string()).is_fatal());
        assert!(!CatalogError::NotFound { id: 3 }.is_fatal());
    }

    #[test]
    fn configuration_error_names_rule() {
        let error = ConfigurationError::UnknownAttribute {
            rule: "volumes".to_string(),
            attribute: "publisher".to_string(),
        };
        let message = error.to_string();
        assert!(message.contains("volumes"));
        assert!(message.contains("publisher"));
    }
}
