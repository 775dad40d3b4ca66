//! Typed mapping from index slots to candidate identifiers.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{PictorError, Result};

/// Opaque identifier of an indexed image.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateId(String);

impl CandidateId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    /// Deterministic id derived from an image path (UUIDv5, URL namespace).
    pub fn from_path(path: &Path) -> Self {
        let key = path.to_string_lossy();
        Self(Uuid::new_v5(&Uuid::NAMESPACE_URL, key.as_bytes()).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CandidateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CandidateId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for CandidateId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Slot → candidate id table, persisted as a JSON object keyed by slot.
#[derive(Debug, Clone, Default)]
pub struct SlotMapping {
    slots: AHashMap<u32, CandidateId>,
}

impl SlotMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign `id` to `slot`, returning the previous id if any.
    pub fn insert(&mut self, slot: u32, id: CandidateId) -> Option<CandidateId> {
        self.slots.insert(slot, id)
    }

    pub fn get(&self, slot: u32) -> Option<&CandidateId> {
        self.slots.get(&slot)
    }

    /// Like [`get`](Self::get) but reports an absent slot as a lookup miss.
    pub fn resolve(&self, slot: u32) -> Result<&CandidateId> {
        self.get(slot)
            .ok_or_else(|| PictorError::lookup_miss(format!("slot {slot} has no candidate id")))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Load a mapping file. Missing or malformed files are
    /// [`PictorError::IndexUnavailable`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            PictorError::index_unavailable(format!("cannot open {}: {e}", path.display()))
        })?;
        let raw: BTreeMap<u32, CandidateId> = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| {
                PictorError::index_unavailable(format!("corrupt mapping {}: {e}", path.display()))
            })?;

        Ok(Self {
            slots: raw.into_iter().collect(),
        })
    }

    /// Write the mapping as JSON, slots in ascending order.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let ordered: BTreeMap<u32, &CandidateId> =
            self.slots.iter().map(|(slot, id)| (*slot, id)).collect();
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, &ordered)?;
        writer.flush()?;
        Ok(())
    }
}

impl FromIterator<(u32, CandidateId)> for SlotMapping {
    fn from_iter<T: IntoIterator<Item = (u32, CandidateId)>>(iter: T) -> Self {
        Self {
            slots: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve() {
        let mut mapping = SlotMapping::new();
        mapping.insert(0, CandidateId::from("a"));
        mapping.insert(7, CandidateId::from("b"));

        assert_eq!(mapping.resolve(7).unwrap().as_str(), "b");
        assert!(matches!(mapping.resolve(1), Err(PictorError::LookupMiss(_))));
        assert_eq!(mapping.len(), 2);
    }

    #[test]
    fn test_save_and_load_roundtrip_uses_string_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mapping.json");
        let mapping: SlotMapping = vec![(0, "abc".into()), (2, "def".into())]
            .into_iter()
            .collect();
        mapping.save(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"0\": \"abc\""));

        let loaded = SlotMapping::load(&path).unwrap();
        assert_eq!(loaded.get(2), Some(&CandidateId::from("def")));
        assert_eq!(loaded.get(1), None);
    }

    #[test]
    fn test_load_accepts_existing_json_layout() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index_to_id.json");
        std::fs::write(&path, r#"{"0": "id-zero", "1": "id-one"}"#).unwrap();

        let mapping = SlotMapping::load(&path).unwrap();
        assert_eq!(mapping.resolve(1).unwrap().as_str(), "id-one");
    }

    #[test]
    fn test_bad_mapping_files_are_unavailable() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            SlotMapping::load(dir.path().join("missing.json")),
            Err(PictorError::IndexUnavailable(_))
        ));

        let bad_key = dir.path().join("bad_key.json");
        std::fs::write(&bad_key, r#"{"zero": "id"}"#).unwrap();
        assert!(matches!(
            SlotMapping::load(&bad_key),
            Err(PictorError::IndexUnavailable(_))
        ));

        let garbage = dir.path().join("garbage.json");
        std::fs::write(&garbage, "[1, 2").unwrap();
        assert!(matches!(
            SlotMapping::load(&garbage),
            Err(PictorError::IndexUnavailable(_))
        ));
    }

    #[test]
    fn test_candidate_id_from_path_is_deterministic() {
        let a = CandidateId::from_path(Path::new("/data/cat.jpg"));
        let b = CandidateId::from_path(Path::new("/data/cat.jpg"));
        let c = CandidateId::from_path(Path::new("/data/dog.jpg"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str().len(), 36);
    }
}
