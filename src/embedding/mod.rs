//! Image embeddings.
//!
//! The embedding model is injected through the [`ImageEmbedder`] trait, so
//! the search engine never holds process-wide model state. The crate ships
//! [`HistogramEmbedder`] as a deterministic reference implementation.

pub mod embedder;
pub mod histogram_embedder;
pub mod vector;

pub use embedder::ImageEmbedder;
pub use histogram_embedder::HistogramEmbedder;
pub use vector::Embedding;
