//! Key-value store backends.
//!
//! All backends store opaque strings under string keys. The history adapter
//! sits on top and owns the JSON format.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::debug;

pub use crate::platform::KeyValueStore;
use crate::{Result, TrackerError};

// ============================================================================
// In-memory
// ============================================================================

/// Non-persistent store, for tests and hosts without storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// ============================================================================
// File-backed
// ============================================================================

/// One `<key>.json` file per key inside a directory.
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// crash mid-write leaves the previous value intact.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Open (and create if needed) the store directory.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(TrackerError::storage(format!("invalid key '{}'", key)));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        debug!("[PaceTracker] Wrote {} bytes to {:?}", value.len(), path);
        Ok(())
    }
}

// ============================================================================
// SQLite-backed
// ============================================================================

/// Single-table SQLite store.
#[cfg(feature = "persistence")]
pub struct SqliteStore {
    db: rusqlite::Connection,
}

#[cfg(feature = "persistence")]
impl SqliteStore {
    /// Open or create the database at `path`.
    pub fn open(path: &str) -> Result<Self> {
        let db = rusqlite::Connection::open(path)?;
        Self::init(db)
    }

    /// Non-persistent database, mainly for tests.
    pub fn open_in_memory() -> Result<Self> {
        let db = rusqlite::Connection::open_in_memory()?;
        Self::init(db)
    }

    fn init(db: rusqlite::Connection) -> Result<Self> {
        db.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL
            );",
        )?;
        Ok(Self { db })
    }
}

#[cfg(feature = "persistence")]
impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        use rusqlite::OptionalExtension;

        let value: Option<String> = self
            .db
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.db.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            rusqlite::params![key, value],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store() {
        let mut store = MemoryStore::new();
        assert_eq!(store.get("a").unwrap(), None);
        store.set("a", "1").unwrap();
        store.set("a", "2").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonFileStore::open(dir.path().join("nested")).unwrap();

        assert_eq!(store.get("runHistory").unwrap(), None);
        store.set("runHistory", "[]").unwrap();
        assert_eq!(store.get("runHistory").unwrap().as_deref(), Some("[]"));

        // A second handle on the same directory sees the write
        let reopened = JsonFileStore::open(dir.path().join("nested")).unwrap();
        assert_eq!(reopened.get("runHistory").unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn test_file_store_rejects_path_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonFileStore::open(dir.path()).unwrap();
        assert!(store.get("../etc/passwd").is_err());
        assert!(store.set("", "x").is_err());
    }

    #[cfg(feature = "persistence")]
    #[test]
    fn test_sqlite_store_upsert() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.get("k").unwrap(), None);
        store.set("k", "one").unwrap();
        store.set("k", "two").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("two"));
    }
}
