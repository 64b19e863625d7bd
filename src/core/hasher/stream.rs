//! Streaming SHA-256 over file contents.

use super::digest::{ContentHash, DIGEST_LEN};
use crate::error::HashError;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::time::{Duration, Instant};

/// Computes content fingerprints without loading whole files into memory.
#[derive(Debug, Clone)]
pub struct ContentHasher {
    pub(super) buffer_size: usize,
    pub(super) max_file_size: u64,
    pub(super) read_timeout: Duration,
}

impl ContentHasher {
    /// Fingerprint the file at `path`.
    ///
    /// Files above the size ceiling are refused before any byte is read,
    /// and a read that runs past the deadline is abandoned between chunks.
    pub fn hash_file(&self, path: &Path) -> Result<ContentHash, HashError> {
        let io_error = |source| HashError::Io {
            path: path.to_path_buf(),
            source,
        };

        let file = File::open(path).map_err(io_error)?;
        let metadata = file.metadata().map_err(io_error)?;

        if !metadata.is_file() {
            return Err(io_error(std::io::Error::new(
                ErrorKind::InvalidInput,
                "not a regular file",
            )));
        }

        if metadata.len() > self.max_file_size {
            return Err(HashError::TooLarge {
                path: path.to_path_buf(),
                size: metadata.len(),
                limit: self.max_file_size,
            });
        }

        self.hash_reader(file, path)
    }

    /// Fingerprint any byte stream. `origin` is only used in error messages.
    pub fn hash_reader<R: Read>(&self, mut reader: R, origin: &Path) -> Result<ContentHash, HashError> {
        let started = Instant::now();
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; self.buffer_size];
        let mut total: u64 = 0;

        loop {
            let read = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(source) => {
                    return Err(HashError::Io {
                        path: origin.to_path_buf(),
                        source,
                    })
                }
            };

            total += read as u64;
            if total > self.max_file_size {
                return Err(HashError::TooLarge {
                    path: origin.to_path_buf(),
                    size: total,
                    limit: self.max_file_size,
                });
            }

            hasher.update(&buffer[..read]);

            if started.elapsed() > self.read_timeout {
                return Err(HashError::TimedOut {
                    path: origin.to_path_buf(),
                    seconds: self.read_timeout.as_secs(),
                });
            }
        }

        let mut bytes = [0u8; DIGEST_LEN];
        bytes.copy_from_slice(&hasher.finalize());
        Ok(ContentHash::from_bytes(bytes))
    }

    /// Fingerprint an in-memory buffer
    pub fn hash_bytes(&self, data: &[u8]) -> ContentHash {
        let mut bytes = [0u8; DIGEST_LEN];
        bytes.copy_from_slice(&Sha256::digest(data));
        ContentHash::from_bytes(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::super::HasherConfig;
    use std::fs;
    use std::io::{Cursor, Read};
    use std::path::{Path, PathBuf};
    use std::time::Duration;
    use tempfile::TempDir;

    const ABC_SHA256: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";
    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn hashes_known_vector() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("abc.epub");
        fs::write(&path, b"abc").unwrap();

        let hash = HasherConfig::new().build().hash_file(&path).unwrap();

        assert_eq!(hash.to_hex(), ABC_SHA256);
    }

    #[test]
    fn hashes_empty_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("empty.pdf");
        fs::write(&path, b"").unwrap();

        let hash = HasherConfig::new().build().hash_file(&path).unwrap();

        assert_eq!(hash.to_hex(), EMPTY_SHA256);
    }

    #[test]
    fn small_buffer_gives_same_digest() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let default = HasherConfig::new().build();
        let tiny = HasherConfig::new().buffer_size(7).build();

        let a = default
            .hash_reader(Cursor::new(&data), &PathBuf::from("memory"))
            .unwrap();
        let b = tiny
            .hash_reader(Cursor::new(&data), &PathBuf::from("memory"))
            .unwrap();

        assert_eq!(a, b);
        assert_eq!(a, default.hash_bytes(&data));
    }

    #[test]
    fn missing_file_is_io_error() {
        let result = HasherConfig::new()
            .build()
            .hash_file(&PathBuf::from("/nonexistent/book.epub"));

        assert!(matches!(result, Err(crate::error::HashError::Io { .. })));
    }

    #[test]
    fn directory_is_refused() {
        let temp_dir = TempDir::new().unwrap();
        let result = HasherConfig::new().build().hash_file(temp_dir.path());

        assert!(result.is_err());
    }

    #[test]
    fn file_above_ceiling_is_refused() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("big.cbz");
        fs::write(&path, vec![0u8; 64]).unwrap();

        let result = HasherConfig::new().max_file_size(10).build().hash_file(&path);

        assert!(matches!(
            result,
            Err(crate::error::HashError::TooLarge { size: 64, limit: 10, .. })
        ));
    }

    /// Yields a few bytes per read, pausing before each one
    struct SlowReader {
        remaining: usize,
    }

    impl Read for SlowReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.remaining == 0 {
                return Ok(0);
            }
            std::thread::sleep(Duration::from_millis(5));
            let n = buf.len().min(self.remaining).min(16);
            buf[..n].fill(7);
            self.remaining -= n;
            Ok(n)
        }
    }

    #[test]
    fn read_past_deadline_times_out() {
        let hasher = HasherConfig::new()
            .buffer_size(16)
            .read_timeout(Duration::ZERO)
            .build();

        let result = hasher.hash_reader(SlowReader { remaining: 64 }, Path::new("slow.cbz"));

        assert!(matches!(
            result,
            Err(crate::error::HashError::TimedOut { seconds: 0, .. })
        ));
    }

    #[test]
    fn read_within_deadline_completes() {
        let hasher = HasherConfig::new()
            .buffer_size(16)
            .read_timeout(Duration::from_secs(60))
            .build();

        let result = hasher.hash_reader(SlowReader { remaining: 64 }, Path::new("slow.cbz"));

        assert_eq!(result.unwrap(), hasher.hash_bytes(&[7u8; 64]));
    }

    #[test]
    fn different_content_gives_different_digest() {
        let hasher = HasherConfig::new().build();
        assert_ne!(hasher.hash_bytes(b"volume 1"), hasher.hash_bytes(b"volume 2"));
    }
}
