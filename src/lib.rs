//! # Pictor
//!
//! Multi-signal image similarity search for Rust.
//!
//! Given one or more query images, Pictor retrieves nearest neighbors of
//! their mean embedding from a vector index and reranks them by a fixed
//! fusion of three signals:
//!
//! - embedding similarity derived from angular distance
//! - color histogram similarity
//! - perceptual hash similarity
//!
//! Reranking runs in parallel chunks on a long-lived worker pool and stops
//! early once no remaining candidate can enter the top-k.

pub mod cli;
pub mod embedding;
pub mod error;
pub mod imaging;
pub mod index;
pub mod indexer;
pub mod metadata;
pub mod search;
pub mod similarity;

pub mod prelude {
    pub use crate::embedding::{Embedding, HistogramEmbedder, ImageEmbedder};
    pub use crate::error::{PictorError, Result};
    pub use crate::imaging::{DecodedImage, FsImageSource, ImageSource, MemoryImageSource};
    pub use crate::index::{CandidateId, FlatAngularIndex, FlatIndexBuilder, SlotMapping, VectorIndex};
    pub use crate::metadata::{ImageMetadata, MemoryMetadataStore, MetadataStore};
    pub use crate::search::{
        CancellationToken, ImageSearchEngine, ResultEntry, SearchComponents, SearchConfig, SearchRequest,
        SearchResults,
    };
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
