//! Image embedding trait.

use std::fmt::Debug;

use crate::embedding::vector::Embedding;
use crate::error::Result;
use crate::imaging::DecodedImage;

/// Trait for converting decoded images to fixed-length embeddings.
///
/// Implementations must be deterministic for identical pixels and return
/// L2-normalized vectors of [`dimension`](ImageEmbedder::dimension) length.
/// An `Err` is the "no embedding" signal: the search engine drops that image
/// instead of failing.
///
/// # Examples
///
/// ```
/// use pictor::embedding::{Embedding, ImageEmbedder};
/// use pictor::error::Result;
/// use pictor::imaging::DecodedImage;
///
/// #[derive(Debug)]
/// struct ConstantEmbedder;
///
/// impl ImageEmbedder for ConstantEmbedder {
///     fn embed(&self, _image: &DecodedImage) -> Result<Embedding> {
///         Ok(Embedding::new(vec![1.0, 0.0]))
///     }
///
///     fn dimension(&self) -> usize {
///         2
///     }
/// }
/// ```
pub trait ImageEmbedder: Send + Sync + Debug {
    /// Generate an embedding for the given image.
    fn embed(&self, image: &DecodedImage) -> Result<Embedding>;

    /// Generate embeddings for multiple images.
    ///
    /// The default implementation calls `embed` sequentially; each slot holds
    /// that image's own outcome.
    fn embed_batch(&self, images: &[DecodedImage]) -> Vec<Result<Embedding>> {
        images.iter().map(|image| self.embed(image)).collect()
    }

    /// Get the dimension of generated embeddings.
    fn dimension(&self) -> usize;

    /// Get the name/identifier of this embedder.
    fn name(&self) -> &str {
        "unknown"
    }
}
