//! Deterministic reference embedder built from joint color histograms.
//!
//! The production embedding model is an external collaborator. This embedder
//! stands in for it so indexes can be built and queried without one: the
//! embedding is the L2-normalized joint RGB histogram of the image.

use crate::embedding::embedder::ImageEmbedder;
use crate::embedding::vector::Embedding;
use crate::error::{PictorError, Result};
use crate::imaging::DecodedImage;
use crate::similarity::histogram::{ColorHistogram, HistogramConfig, HistogramMode};

/// Embeds an image as its normalized joint color histogram.
#[derive(Debug, Clone)]
pub struct HistogramEmbedder {
    config: HistogramConfig,
}

impl HistogramEmbedder {
    /// Create an embedder with `bins` buckets per channel (`bins³` dimensions).
    pub fn new(bins: usize) -> Result<Self> {
        let config = HistogramConfig {
            bins,
            mode: HistogramMode::Joint,
        };
        config.validate()?;
        Ok(Self { config })
    }
}

impl Default for HistogramEmbedder {
    fn default() -> Self {
        Self {
            config: HistogramConfig {
                bins: 8,
                mode: HistogramMode::Joint,
            },
        }
    }
}

impl ImageEmbedder for HistogramEmbedder {
    fn embed(&self, image: &DecodedImage) -> Result<Embedding> {
        if image.pixel_count() == 0 {
            return Err(PictorError::input("cannot embed an empty image"));
        }
        let histogram = ColorHistogram::compute(image, &self.config);
        Ok(Embedding::new(histogram.into_values()).normalized())
    }

    fn dimension(&self) -> usize {
        self.config.vector_len()
    }

    fn name(&self) -> &str {
        "HistogramEmbedder"
    }
}
