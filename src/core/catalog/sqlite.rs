//! SQLite catalog backend for persistent storage.

use super::{BookMetadata, Catalog, CatalogEntry, EntryId, NewEntry};
use crate::core::hasher::ContentHash;
use crate::error::CatalogError;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

const ENTRY_COLUMNS: &str = "id, title, subtitle, volume, author, original_author, series,
     category, rating, is_collection_volume, file_path, file_hash, created_at";

/// SQLite-backed persistent catalog
///
/// Soft-deleted rows keep their data and get a `deleted_at` stamp. Partial
/// unique indexes enforce one active row per content hash and per path.
pub struct SqliteCatalog {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl SqliteCatalog {
    /// Open or create a catalog database at the given path
    pub fn open(path: &Path) -> Result<Self, CatalogError> {
        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CatalogError::Unavailable {
                location: path.display().to_string(),
                reason: e.to_string(),
            })?;
        }

        let conn = Connection::open(path).map_err(|e| CatalogError::Unavailable {
            location: path.display().to_string(),
            reason: e.to_string(),
        })?;

        // WAL lets readers proceed while a scan is writing
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(|e| Self::classify(path, e))?;

        Self::initialize(conn, path)
    }

    /// Open a throwaway catalog that lives only as long as this value
    pub fn open_in_memory() -> Result<Self, CatalogError> {
        let location = Path::new(":memory:");
        let conn = Connection::open_in_memory().map_err(|e| CatalogError::Unavailable {
            location: location.display().to_string(),
            reason: e.to_string(),
        })?;

        Self::initialize(conn, location)
    }

    fn initialize(conn: Connection, path: &Path) -> Result<Self, CatalogError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS books (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT,
                subtitle TEXT,
                volume INTEGER,
                author TEXT,
                original_author TEXT,
                series TEXT,
                category TEXT,
                rating INTEGER,
                is_collection_volume INTEGER NOT NULL DEFAULT 0,
                file_path BLOB NOT NULL,
                file_hash TEXT NOT NULL,
                created_at TEXT NOT NULL,
                deleted_at TEXT
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_books_active_hash
                ON books(file_hash) WHERE deleted_at IS NULL;
            CREATE UNIQUE INDEX IF NOT EXISTS idx_books_active_path
                ON books(file_path) WHERE deleted_at IS NULL;",
        )
        .map_err(|e| Self::classify(path, e))?;

        Ok(Self {
            conn: Mutex::new(conn),
            db_path: path.to_path_buf(),
        })
    }

    /// Physically remove soft-deleted rows.
    ///
    /// Administrative operation; scans never call it. Returns the number of
    /// rows removed.
    pub fn purge_deleted(&self) -> Result<usize, CatalogError> {
        let conn = self.lock()?;

        conn.execute("DELETE FROM books WHERE deleted_at IS NOT NULL", [])
            .map_err(|e| self.map_err(e))
    }

    /// Number of soft-deleted rows awaiting purge
    pub fn deleted_count(&self) -> Result<usize, CatalogError> {
        let conn = self.lock()?;

        conn.query_row(
            "SELECT COUNT(*) FROM books WHERE deleted_at IS NOT NULL",
            [],
            |row| row.get::<_, i64>(0).map(|v| v as usize),
        )
        .map_err(|e| self.map_err(e))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, CatalogError> {
        self.conn.lock().map_err(|_| CatalogError::Corrupted {
            path: self.db_path.clone(),
        })
    }

    fn map_err(&self, error: rusqlite::Error) -> CatalogError {
        Self::classify(&self.db_path, error)
    }

    /// Sort SQLite failures into per-mutation and whole-catalog errors
    fn classify(path: &Path, error: rusqlite::Error) -> CatalogError {
        match error.sqlite_error_code() {
            Some(ErrorCode::ConstraintViolation) => CatalogError::Constraint(error.to_string()),
            Some(ErrorCode::DatabaseCorrupt) | Some(ErrorCode::NotADatabase) => {
                CatalogError::Corrupted {
                    path: path.to_path_buf(),
                }
            }
            Some(ErrorCode::CannotOpen)
            | Some(ErrorCode::SystemIoFailure)
            | Some(ErrorCode::DiskFull)
            | Some(ErrorCode::PermissionDenied)
            | Some(ErrorCode::ReadOnly) => CatalogError::Unavailable {
                location: path.display().to_string(),
                reason: error.to_string(),
            },
            _ => CatalogError::QueryFailed(error.to_string()),
        }
    }

    fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<CatalogEntry> {
        let hash_text: String = row.get(11)?;
        let content_hash: ContentHash = hash_text
            .parse()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(11, Type::Text, Box::new(e)))?;

        let created_text: String = row.get(12)?;
        let created_at = DateTime::parse_from_rfc3339(&created_text)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(12, Type::Text, Box::new(e)))?
            .with_timezone(&Utc);

        Ok(CatalogEntry {
            id: row.get(0)?,
            metadata: BookMetadata {
                title: row.get(1)?,
                subtitle: row.get(2)?,
                volume: row.get::<_, Option<i64>>(3)?.map(|v| v.clamp(0, u32::MAX as i64) as u32),
                author: row.get(4)?,
                original_author: row.get(5)?,
                series: row.get(6)?,
                category: row.get(7)?,
                rating: row.get::<_, Option<i64>>(8)?.map(|v| v.clamp(0, 255) as u8),
                is_collection_volume: row.get::<_, i64>(9)? != 0,
            },
            file_path: path_from_blob(row.get(10)?),
            content_hash,
            created_at,
        })
    }

    fn query_entries(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<CatalogEntry>, CatalogError> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(sql).map_err(|e| self.map_err(e))?;
        let entries = stmt
            .query_map(params, Self::row_to_entry)
            .map_err(|e| self.map_err(e))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| self.map_err(e))?;

        Ok(entries)
    }

    fn expect_one_row(id: EntryId, changed: usize) -> Result<(), CatalogError> {
        if changed == 0 {
            return Err(CatalogError::NotFound { id });
        }
        Ok(())
    }
}

impl Catalog for SqliteCatalog {
    fn find_by_hash(&self, hash: &ContentHash) -> Result<Option<CatalogEntry>, CatalogError> {
        Ok(self.find_all_by_hash(hash)?.into_iter().next())
    }

    fn find_all_by_hash(&self, hash: &ContentHash) -> Result<Vec<CatalogEntry>, CatalogError> {
        self.query_entries(
            &format!(
                "SELECT {ENTRY_COLUMNS} FROM books
                 WHERE file_hash = ? AND deleted_at IS NULL
                 ORDER BY created_at DESC, id DESC"
            ),
            [hash.to_hex()],
        )
    }

    fn find_by_path(&self, path: &Path) -> Result<Option<CatalogEntry>, CatalogError> {
        let conn = self.lock()?;

        conn.query_row(
            &format!(
                "SELECT {ENTRY_COLUMNS} FROM books
                 WHERE file_path = ? AND deleted_at IS NULL"
            ),
            [path_to_blob(path)],
            Self::row_to_entry,
        )
        .optional()
        .map_err(|e| self.map_err(e))
    }

    fn insert(&self, entry: NewEntry) -> Result<EntryId, CatalogError> {
        let conn = self.lock()?;
        let m = &entry.metadata;

        conn.execute(
            "INSERT INTO books
             (title, subtitle, volume, author, original_author, series, category,
              rating, is_collection_volume, file_path, file_hash, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                m.title,
                m.subtitle,
                m.volume.map(i64::from),
                m.author,
                m.original_author,
                m.series,
                m.category,
                m.rating.map(i64::from),
                m.is_collection_volume as i64,
                path_to_blob(&entry.file_path),
                entry.content_hash.to_hex(),
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(|e| self.map_err(e))?;

        Ok(conn.last_insert_rowid())
    }

    fn update_path(&self, id: EntryId, new_path: &Path) -> Result<(), CatalogError> {
        let conn = self.lock()?;

        let changed = conn
            .execute(
                "UPDATE books SET file_path = ? WHERE id = ? AND deleted_at IS NULL",
                params![path_to_blob(new_path), id],
            )
            .map_err(|e| self.map_err(e))?;

        Self::expect_one_row(id, changed)
    }

    fn update_hash(&self, id: EntryId, new_hash: &ContentHash) -> Result<(), CatalogError> {
        let conn = self.lock()?;

        let changed = conn
            .execute(
                "UPDATE books SET file_hash = ? WHERE id = ? AND deleted_at IS NULL",
                params![new_hash.to_hex(), id],
            )
            .map_err(|e| self.map_err(e))?;

        Self::expect_one_row(id, changed)
    }

    fn mark_deleted(&self, id: EntryId) -> Result<(), CatalogError> {
        let conn = self.lock()?;

        let changed = conn
            .execute(
                "UPDATE books SET deleted_at = ? WHERE id = ? AND deleted_at IS NULL",
                params![Utc::now().to_rfc3339(), id],
            )
            .map_err(|e| self.map_err(e))?;

        Self::expect_one_row(id, changed)
    }

    fn list_active(&self) -> Result<Vec<CatalogEntry>, CatalogError> {
        self.query_entries(
            &format!("SELECT {ENTRY_COLUMNS} FROM books WHERE deleted_at IS NULL ORDER BY id"),
            [],
        )
    }
}

/// Paths are stored as their raw OS bytes so names that are not valid
/// UTF-8 read back identical.
#[cfg(unix)]
fn path_to_blob(path: &Path) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    path.as_os_str().as_bytes().to_vec()
}

#[cfg(unix)]
fn path_from_blob(bytes: Vec<u8>) -> PathBuf {
    use std::os::unix::ffi::OsStringExt;
    PathBuf::from(std::ffi::OsString::from_vec(bytes))
}

#[cfg(not(unix))]
fn path_to_blob(path: &Path) -> Vec<u8> {
    path.to_string_lossy().into_owned().into_bytes()
}

#[cfg(not(unix))]
fn path_from_blob(bytes: Vec<u8>) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn hash(byte: u8) -> ContentHash {
        ContentHash::from_bytes([byte; 32])
    }

    fn new_entry(path: &str, byte: u8) -> NewEntry {
        NewEntry {
            metadata: BookMetadata {
                title: Some("Spice Harvest".to_string()),
                volume: Some(3),
                author: Some("F. Herbert".to_string()),
                rating: Some(4),
                is_collection_volume: true,
                ..Default::default()
            },
            file_path: PathBuf::from(path),
            content_hash: hash(byte),
        }
    }

    #[test]
    fn sqlite_catalog_creates_database() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested").join("catalog.db");

        let catalog = SqliteCatalog::open(&db_path).unwrap();

        assert!(db_path.exists());
        assert!(catalog.list_active().unwrap().is_empty());
    }

    #[test]
    fn sqlite_catalog_stores_and_retrieves() {
        let catalog = SqliteCatalog::open_in_memory().unwrap();

        let id = catalog.insert(new_entry("/books/dune.epub", 1)).unwrap();

        let by_hash = catalog.find_by_hash(&hash(1)).unwrap().unwrap();
        let by_path = catalog
            .find_by_path(Path::new("/books/dune.epub"))
            .unwrap()
            .unwrap();

        assert_eq!(by_hash.id, id);
        assert_eq!(by_hash, by_path);
        assert_eq!(by_hash.metadata.volume, Some(3));
        assert_eq!(by_hash.metadata.rating, Some(4));
        assert!(by_hash.metadata.is_collection_volume);
    }

    #[test]
    fn sqlite_catalog_enforces_active_hash_uniqueness() {
        let catalog = SqliteCatalog::open_in_memory().unwrap();
        catalog.insert(new_entry("/books/a.epub", 1)).unwrap();

        let result = catalog.insert(new_entry("/books/b.epub", 1));

        assert!(matches!(result, Err(CatalogError::Constraint(_))));
    }

    #[test]
    fn sqlite_catalog_soft_deletes() {
        let catalog = SqliteCatalog::open_in_memory().unwrap();
        let id = catalog.insert(new_entry("/books/a.epub", 1)).unwrap();

        catalog.mark_deleted(id).unwrap();

        assert!(catalog.find_by_hash(&hash(1)).unwrap().is_none());
        assert!(catalog.list_active().unwrap().is_empty());
        assert_eq!(catalog.deleted_count().unwrap(), 1);

        // The same content may come back as a fresh entry
        assert!(catalog.insert(new_entry("/books/a.epub", 1)).is_ok());
    }

    #[test]
    fn sqlite_catalog_updates_path_and_hash() {
        let catalog = SqliteCatalog::open_in_memory().unwrap();
        let id = catalog.insert(new_entry("/books/a.epub", 1)).unwrap();

        catalog.update_path(id, Path::new("/books/moved/a.epub")).unwrap();
        catalog.update_hash(id, &hash(2)).unwrap();

        let entry = catalog.find_by_hash(&hash(2)).unwrap().unwrap();
        assert_eq!(entry.file_path, PathBuf::from("/books/moved/a.epub"));
        assert!(catalog.find_by_path(Path::new("/books/a.epub")).unwrap().is_none());
    }

    #[test]
    fn sqlite_catalog_reports_missing_rows() {
        let catalog = SqliteCatalog::open_in_memory().unwrap();

        assert!(matches!(
            catalog.mark_deleted(42),
            Err(CatalogError::NotFound { id: 42 })
        ));
    }

    #[test]
    fn sqlite_catalog_purges_deleted_rows() {
        let catalog = SqliteCatalog::open_in_memory().unwrap();
        let a = catalog.insert(new_entry("/books/a.epub", 1)).unwrap();
        catalog.insert(new_entry("/books/b.epub", 2)).unwrap();
        catalog.mark_deleted(a).unwrap();

        assert_eq!(catalog.purge_deleted().unwrap(), 1);
        assert_eq!(catalog.deleted_count().unwrap(), 0);
        assert_eq!(catalog.list_active().unwrap().len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn sqlite_catalog_keeps_non_utf8_paths_exact() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let catalog = SqliteCatalog::open_in_memory().unwrap();
        let path = Path::new("/books").join(OsStr::from_bytes(b"Book\xff.epub"));
        let id = catalog
            .insert(NewEntry {
                file_path: path.clone(),
                ..new_entry("/unused", 1)
            })
            .unwrap();

        let found = catalog.find_by_path(&path).unwrap().unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.file_path, path);
        assert!(catalog
            .find_by_path(Path::new("/books/Book\u{FFFD}.epub"))
            .unwrap()
            .is_none());

        let moved = Path::new("/books").join(OsStr::from_bytes(b"Moved\xfe.epub"));
        catalog.update_path(id, &moved).unwrap();
        assert_eq!(catalog.list_active().unwrap()[0].file_path, moved);
    }

    #[test]
    fn sqlite_catalog_persists_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("catalog.db");

        {
            let catalog = SqliteCatalog::open(&db_path).unwrap();
            catalog.insert(new_entry("/books/a.epub", 1)).unwrap();
        }

        let reopened = SqliteCatalog::open(&db_path).unwrap();
        assert_eq!(reopened.list_active().unwrap().len(), 1);
    }
}
