//! Query preparation: embeddings, aggregate vector and per-image features.

use log::{debug, warn};

use crate::embedding::{Embedding, ImageEmbedder};
use crate::error::{PictorError, Result};
use crate::imaging::DecodedImage;
use crate::similarity::{ColorHistogram, HistogramConfig, PerceptualHash};

/// Features of one accepted query image.
#[derive(Debug, Clone)]
pub struct QueryImage {
    pub embedding: Embedding,
    pub histogram: ColorHistogram,
    pub phash: PerceptualHash,
}

/// Everything a search needs to know about its query images.
///
/// Built once per search and shared read-only by every scoring worker.
#[derive(Debug, Clone)]
pub struct QueryContext {
    images: Vec<QueryImage>,
    aggregate: Embedding,
    histogram_config: HistogramConfig,
    dropped: usize,
}

impl QueryContext {
    /// Embed the query images and precompute their color and hash features.
    ///
    /// Empty images, images the embedder rejects, or whose embedding is not a unit vector
    /// of the embedder's dimension, are dropped with a warning. Fails with
    /// [`PictorError::Input`] when nothing usable remains.
    pub fn build(
        images: &[DecodedImage],
        embedder: &dyn ImageEmbedder,
        histogram_config: &HistogramConfig,
    ) -> Result<Self> {
        if images.is_empty() {
            return Err(PictorError::input("no query images provided"));
        }

        let dimension = embedder.dimension();
        let mut accepted = Vec::with_capacity(images.len());
        for (i, (image, embedding)) in images.iter().zip(embedder.embed_batch(images)).enumerate() {
            if image.is_empty() {
                warn!("Dropping query image {i}: no pixels");
                continue;
            }
            let embedding = match embedding {
                Ok(embedding) => embedding,
                Err(e) => {
                    warn!("Dropping query image {i}: no embedding ({e})");
                    continue;
                }
            };
            if embedding.dimension() != dimension {
                warn!(
                    "Dropping query image {i}: embedding has dimension {}, expected {dimension}",
                    embedding.dimension()
                );
                continue;
            }
            if !embedding.is_unit() {
                warn!(
                    "Dropping query image {i}: embedding norm {} is not 1",
                    embedding.norm()
                );
                continue;
            }

            accepted.push(QueryImage {
                embedding,
                histogram: ColorHistogram::compute(image, histogram_config),
                phash: PerceptualHash::compute(image),
            });
        }

        if accepted.is_empty() {
            return Err(PictorError::input(format!(
                "none of the {} query images produced a usable embedding",
                images.len()
            )));
        }

        let embeddings: Vec<Embedding> = accepted.iter().map(|q| q.embedding.clone()).collect();
        let aggregate = Embedding::mean(&embeddings)?;
        let dropped = images.len() - accepted.len();
        debug!(
            "Prepared {} query images ({dropped} dropped), aggregate norm {:.4}",
            accepted.len(),
            aggregate.norm()
        );

        Ok(Self {
            images: accepted,
            aggregate,
            histogram_config: *histogram_config,
            dropped,
        })
    }

    /// Accepted query images, in input order.
    pub fn images(&self) -> &[QueryImage] {
        &self.images
    }

    /// Mean of the accepted embeddings. Not renormalized.
    pub fn aggregate(&self) -> &Embedding {
        &self.aggregate
    }

    /// Histogram settings the query features were computed with.
    pub fn histogram_config(&self) -> &HistogramConfig {
        &self.histogram_config
    }

    /// Number of accepted images.
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Number of images dropped while building.
    pub fn dropped(&self) -> usize {
        self.dropped
    }
}
