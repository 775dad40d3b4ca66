//! Candidate metadata store.
//!
//! Maps an opaque [`CandidateId`] to the image's path and original
//! dimensions. The store is read-only during a search.

pub mod memory;

pub use memory::MemoryMetadataStore;

use std::fmt::Debug;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::index::CandidateId;

/// File name of the metadata store inside an index directory.
pub const METADATA_FILE: &str = "metadata.json";

/// Stored facts about one indexed image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
}

/// Lookup interface over the metadata store.
pub trait MetadataStore: Send + Sync + Debug {
    /// Look up a candidate. `Ok(None)` means the id is unknown.
    fn lookup(&self, id: &CandidateId) -> Result<Option<ImageMetadata>>;

    /// Number of records.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
