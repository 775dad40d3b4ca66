//! In-memory metadata store with JSON persistence.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{PictorError, Result};
use crate::index::CandidateId;
use crate::metadata::{ImageMetadata, MetadataStore};

/// One persisted row.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct MetadataRecord {
    id: CandidateId,
    path: PathBuf,
    width: u32,
    height: u32,
}

/// Hash-map backed [`MetadataStore`].
#[derive(Debug, Clone, Default)]
pub struct MemoryMetadataStore {
    records: AHashMap<CandidateId, ImageMetadata>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record. An existing id is left untouched and `false` returned.
    pub fn insert(&mut self, id: CandidateId, metadata: ImageMetadata) -> bool {
        if self.records.contains_key(&id) {
            return false;
        }
        self.records.insert(id, metadata);
        true
    }

    /// Remove a record.
    pub fn remove(&mut self, id: &CandidateId) -> Option<ImageMetadata> {
        self.records.remove(id)
    }

    /// Load a store saved with [`save`](Self::save).
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            PictorError::index_unavailable(format!("cannot open {}: {e}", path.display()))
        })?;
        let rows: Vec<MetadataRecord> =
            serde_json::from_reader(BufReader::new(file)).map_err(|e| {
                PictorError::index_unavailable(format!("corrupt metadata {}: {e}", path.display()))
            })?;

        let mut store = Self::new();
        for row in rows {
            store.insert(
                row.id,
                ImageMetadata {
                    path: row.path,
                    width: row.width,
                    height: row.height,
                },
            );
        }
        Ok(store)
    }

    /// Write all records as a JSON array, ordered by id.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut rows: Vec<MetadataRecord> = self
            .records
            .iter()
            .map(|(id, meta)| MetadataRecord {
                id: id.clone(),
                path: meta.path.clone(),
                width: meta.width,
                height: meta.height,
            })
            .collect();
        rows.sort_by(|a, b| a.id.cmp(&b.id));

        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, &rows)?;
        writer.flush()?;
        Ok(())
    }
}

impl MetadataStore for MemoryMetadataStore {
    fn lookup(&self, id: &CandidateId) -> Result<Option<ImageMetadata>> {
        Ok(self.records.get(id).cloned())
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn meta(path: &str) -> ImageMetadata {
        ImageMetadata {
            path: PathBuf::from(path),
            width: 224,
            height: 224,
        }
    }

    #[test]
    fn test_insert_ignores_duplicates() {
        let mut store = MemoryMetadataStore::new();
        assert!(store.insert("a".into(), meta("/a.png")));
        assert!(!store.insert("a".into(), meta("/other.png")));

        let found = store.lookup(&"a".into()).unwrap().unwrap();
        assert_eq!(found.path, PathBuf::from("/a.png"));
        assert!(store.lookup(&"b".into()).unwrap().is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("metadata.json");

        let mut store = MemoryMetadataStore::new();
        store.insert("x".into(), meta("/x.jpg"));
        store.insert("y".into(), meta("/y.jpg"));
        store.save(&path).unwrap();

        let loaded = MemoryMetadataStore::load(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.lookup(&"y".into()).unwrap(), Some(meta("/y.jpg")));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            MemoryMetadataStore::load(dir.path().join("none.json")),
            Err(PictorError::IndexUnavailable(_))
        ));
    }

    #[test]
    fn test_remove() {
        let mut store = MemoryMetadataStore::new();
        store.insert("a".into(), meta("/a.png"));
        assert!(store.remove(&"a".into()).is_some());
        assert!(store.is_empty());
    }
}
