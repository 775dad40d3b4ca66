//! Vector index adapter.
//!
//! The index is built once by the offline indexing job and opened read-only
//! for querying. It is shared by every search without locking.

pub mod distance;
pub mod flat;
pub mod mapping;

pub use flat::{FlatAngularIndex, FlatIndexBuilder, Neighbor, VectorIndex};
pub use mapping::{CandidateId, SlotMapping};

/// File name of the vector index inside an index directory.
pub const INDEX_FILE: &str = "index.bin";

/// File name of the slot mapping inside an index directory.
pub const MAPPING_FILE: &str = "mapping.json";
