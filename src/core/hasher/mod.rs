//! # Hasher Module
//!
//! Computes content fingerprints for catalogued files.
//!
//! A fingerprint is the SHA-256 digest of the file's bytes. Two files with
//! the same fingerprint are treated as the same book, which is how moves
//! are told apart from new arrivals.
//!
//! ## Resource bounds
//! - Files are streamed through a fixed buffer, never read whole
//! - Files above a size ceiling are refused up front
//! - A read that runs past its deadline is abandoned between chunks
//!
//! ## Example
//! ```rust,ignore
//! use bookshelf_catalog::core::hasher::HasherConfig;
//!
//! let hasher = HasherConfig::new()
//!     .max_file_size(2 * 1024 * 1024 * 1024)
//!     .build();
//!
//! let hash = hasher.hash_file(&path)?;
//! ```

mod digest;
mod stream;

pub use digest::{ContentHash, DIGEST_LEN};
pub use stream::ContentHasher;

use std::time::Duration;

/// Default read buffer (64 KiB)
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Default size ceiling (4 GiB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 4 * 1024 * 1024 * 1024;

/// Default per-file read deadline
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(120);

/// Configuration builder for the content hasher
#[derive(Debug, Clone)]
pub struct HasherConfig {
    buffer_size: usize,
    max_file_size: u64,
    read_timeout: Duration,
}

impl HasherConfig {
    /// Create a new hasher configuration with defaults
    pub fn new() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    /// Set the read buffer size (minimum 1 byte)
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }

    /// Refuse files larger than `bytes`
    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    /// Abandon reads that take longer than `timeout`
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Build the hasher
    pub fn build(self) -> ContentHasher {
        ContentHasher {
            buffer_size: self.buffer_size,
            max_file_size: self.max_file_size,
            read_timeout: self.read_timeout,
        }
    }
}

impl Default for HasherConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for ContentHasher {
    fn default() -> Self {
        HasherConfig::new().build()
    }
}
