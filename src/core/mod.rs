//! # Core Module
//!
//! The scan-and-reconcile engine.
//!
//! ## Modules
//! - `library` - Scan targets, exclusions and display visibility
//! - `rules` - Filename parsing rules and their loader
//! - `parser` - Applies rules to filenames
//! - `hasher` - Content fingerprints
//! - `scanner` - Discovers book files in directories
//! - `catalog` - The storage interface and its backends
//! - `pipeline` - Orchestrates a full scan

pub mod catalog;
pub mod hasher;
pub mod library;
pub mod parser;
pub mod pipeline;
pub mod rules;
pub mod scanner;

// Re-export commonly used types
pub use catalog::{BookMetadata, Catalog, CatalogEntry};
pub use hasher::ContentHash;
pub use library::{ExcludedPath, ScanTarget};
pub use pipeline::{Pipeline, ScanCoordinator, ScanReport};
pub use rules::RuleSet;
pub use scanner::BookFile;
