//! Metadata store: one small record per stored blob.
//!
//! The shipped backend is a JSON index: loaded entirely into memory, flushed
//! atomically via temp+rename. Records are keyed by an opaque `RecordId`
//! assigned on insert.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use coffre_core::types::{FileRecord, NewRecord, RecordId};

/// Trait for metadata store backends.
pub trait MetadataStore {
    /// Insert a record and return its freshly assigned id.
    fn put(&mut self, record: NewRecord) -> Result<RecordId>;
    /// Look up a record by id.
    fn get(&self, id: &RecordId) -> Option<&FileRecord>;
    /// All records, newest upload first.
    fn query(&self) -> Vec<FileRecord>;
    /// Remove a record. Returns false if no such record existed.
    fn delete(&mut self, id: &RecordId) -> Result<bool>;
    /// Flush pending changes to durable storage.
    fn flush(&mut self) -> Result<()>;
    /// Number of records.
    fn len(&self) -> usize;
    /// Whether the store is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory metadata index, persisted to a JSON file
pub struct JsonMetadataStore {
    /// Path to the JSON index on disk
    path: PathBuf,
    entries: HashMap<RecordId, FileRecord>,
    /// Whether there are unsaved changes
    dirty: bool,
}

impl JsonMetadataStore {
    /// Load or create an index at the given path.
    /// If the file doesn't exist, starts empty.
    pub fn open(path: &Path) -> Result<Self> {
        let entries = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading metadata index: {}", path.display()))?;
            let records: Vec<FileRecord> = serde_json::from_str(&content)
                .with_context(|| format!("parsing metadata index: {}", path.display()))?;
            records.into_iter().map(|r| (r.id.clone(), r)).collect()
        } else {
            HashMap::new()
        };

        Ok(Self {
            path: path.to_path_buf(),
            entries,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MetadataStore for JsonMetadataStore {
    fn put(&mut self, record: NewRecord) -> Result<RecordId> {
        let id = RecordId::generate();
        self.entries
            .insert(id.clone(), FileRecord::new(id.clone(), record));
        self.dirty = true;
        Ok(id)
    }

    fn get(&self, id: &RecordId) -> Option<&FileRecord> {
        self.entries.get(id)
    }

    fn query(&self) -> Vec<FileRecord> {
        let mut records: Vec<FileRecord> = self.entries.values().cloned().collect();
        records.sort_by(|a, b| {
            b.meta
                .uploaded_at
                .cmp(&a.meta.uploaded_at)
                .then_with(|| b.meta.storage_path.cmp(&a.meta.storage_path))
                .then_with(|| a.id.cmp(&b.id))
        });
        records
    }

    fn delete(&mut self, id: &RecordId) -> Result<bool> {
        let removed = self.entries.remove(id).is_some();
        if removed {
            self.dirty = true;
        }
        Ok(removed)
    }

    /// Flush dirty changes to disk using an atomic write (write then rename).
    fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating index dir: {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(&self.query())
            .context("serializing metadata index")?;

        let tmp_path = self.path.with_extension("tmp");
        std::fs::write(&tmp_path, &json)
            .with_context(|| format!("writing index temp: {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("renaming index: {}", self.path.display()))?;

        self.dirty = false;
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Drop for JsonMetadataStore {
    fn drop(&mut self) {
        if self.dirty {
            if let Err(e) = self.flush() {
                tracing::warn!("failed to flush metadata index on drop: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(name: &str, uploaded_at: u64) -> NewRecord {
        NewRecord {
            owner_id: "alice".into(),
            file_name: name.into(),
            stored_name: format!("{name}.encrypted"),
            storage_path: format!("users/alice/{uploaded_at}000_{name}.encrypted"),
            size: 10,
            mime_type: "text/plain".into(),
            uploaded_at,
        }
    }

    #[test]
    fn test_put_get() {
        let tmp = TempDir::new().unwrap();
        let mut store = JsonMetadataStore::open(&tmp.path().join("index.json")).unwrap();

        let id = store.put(record("a.txt", 100)).unwrap();
        let got = store.get(&id).unwrap();

        assert_eq!(got.id, id);
        assert_eq!(got.meta.file_name, "a.txt");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_query_newest_first() {
        let tmp = TempDir::new().unwrap();
        let mut store = JsonMetadataStore::open(&tmp.path().join("index.json")).unwrap();

        store.put(record("old.txt", 100)).unwrap();
        store.put(record("new.txt", 300)).unwrap();
        store.put(record("mid.txt", 200)).unwrap();

        let names: Vec<String> = store.query().into_iter().map(|r| r.meta.file_name).collect();
        assert_eq!(names, vec!["new.txt", "mid.txt", "old.txt"]);
    }

    #[test]
    fn test_delete() {
        let tmp = TempDir::new().unwrap();
        let mut store = JsonMetadataStore::open(&tmp.path().join("index.json")).unwrap();

        let id = store.put(record("a.txt", 1)).unwrap();
        assert!(store.delete(&id).unwrap());
        assert!(!store.delete(&id).unwrap());
        assert!(store.get(&id).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_persistence_across_open() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested/dir/index.json");

        let id = {
            let mut store = JsonMetadataStore::open(&path).unwrap();
            let id = store.put(record("kept.pdf", 42)).unwrap();
            store.flush().unwrap();
            id
        };

        let store = JsonMetadataStore::open(&path).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&id).unwrap().meta.file_name, "kept.pdf");
    }

    #[test]
    fn test_flush_on_drop() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("index.json");

        {
            let mut store = JsonMetadataStore::open(&path).unwrap();
            store.put(record("dropped.txt", 1)).unwrap();
        }

        assert_eq!(JsonMetadataStore::open(&path).unwrap().len(), 1);
    }

    #[test]
    fn test_flush_leaves_no_temp_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("index.json");
        let mut store = JsonMetadataStore::open(&path).unwrap();
        store.put(record("x", 1)).unwrap();
        store.flush().unwrap();

        assert!(path.exists());
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_corrupt_index_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("index.json");
        std::fs::write(&path, "{not json").unwrap();

        assert!(JsonMetadataStore::open(&path).is_err());
    }
}
