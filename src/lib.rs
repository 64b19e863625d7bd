//! # Bookshelf Catalog
//!
//! Keeps a catalog of e-book, comic and magazine files in step with the
//! folders they live in.
//!
//! ## What a scan does
//! - **Fingerprints** every candidate file (SHA-256), so a renamed or
//!   relocated book keeps its catalog entry
//! - **Parses** filenames of new books with user-editable rules
//! - **Reconciles** the catalog: inserts, moves, content changes and
//!   soft-deletes, never purges
//!
//! ## Architecture
//! - `core` - The scan-and-reconcile engine
//! - `events` - Event-driven progress reporting
//! - `error` - Error taxonomy
//! - `cli` - Command-line interface (binary only)

pub mod core;
pub mod error;
pub mod events;

// Re-export commonly used types at the crate root
pub use error::{CatalogerError, Result};

/// Initialize tracing for the library
///
/// This should be called by the application entry point. Log level comes
/// from `RUST_LOG`. Calling it when a subscriber is already installed does
/// nothing.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}
