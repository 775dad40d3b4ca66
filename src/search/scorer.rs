//! Fusion of embedding, color and perceptual-hash similarities.

use crate::error::Result;
use crate::imaging::DecodedImage;
use crate::search::config::FusionWeights;
use crate::search::query::QueryContext;
use crate::search::types::ScoreVector;
use crate::similarity::{ColorHistogram, PerceptualHash, inverse_distance};

/// Scores candidates against a prepared query.
#[derive(Debug, Clone, Copy)]
pub struct FusionScorer {
    weights: FusionWeights,
}

impl FusionScorer {
    /// Create a scorer. The weights are validated.
    pub fn new(weights: FusionWeights) -> Result<Self> {
        weights.validate()?;
        Ok(Self { weights })
    }

    pub fn weights(&self) -> &FusionWeights {
        &self.weights
    }

    /// Fuse `clip_sim` with the color and hash similarities of `candidate`,
    /// each averaged over every query image.
    ///
    /// Returns [`PictorError::Scoring`](crate::error::PictorError::Scoring)
    /// if any component falls outside `[0, 1]`.
    pub fn score(&self, clip_sim: f64, candidate: &DecodedImage, query: &QueryContext) -> Result<ScoreVector> {
        let histogram = ColorHistogram::compute(candidate, query.histogram_config());
        let phash = PerceptualHash::compute(candidate);

        let mut color_total = 0.0;
        let mut phash_total = 0.0;
        for image in query.images() {
            color_total += inverse_distance(image.histogram.distance(&histogram) as f64);
            phash_total += inverse_distance(image.phash.hamming_distance(&phash) as f64);
        }
        let n = query.len() as f64;

        ScoreVector::new(clip_sim, color_total / n, phash_total / n, &self.weights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HistogramEmbedder;
    use crate::error::PictorError;
    use crate::similarity::HistogramConfig;
    use image::{Rgb, RgbImage};

    fn pattern(seed: u32) -> DecodedImage {
        DecodedImage::new(RgbImage::from_fn(32, 32, |x, y| {
            let v = ((x * 7 + y * 13 + seed * 31) % 256) as u8;
            Rgb([v, v.wrapping_mul(3), 255 - v])
        }))
    }

    fn context(images: &[DecodedImage]) -> QueryContext {
        QueryContext::build(images, &HistogramEmbedder::default(), &HistogramConfig::default()).unwrap()
    }

    #[test]
    fn test_identical_image_scores_perfectly() {
        let image = pattern(1);
        let scorer = FusionScorer::new(FusionWeights::default()).unwrap();
        let scores = scorer.score(1.0, &image, &context(&[image.clone()])).unwrap();

        assert_eq!(scores.color_sim, 1.0);
        assert_eq!(scores.phash_sim, 1.0);
        assert!((scores.combined - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_averages_over_query_images() {
        let query_a = pattern(1);
        let query_b = pattern(40);
        let candidate = pattern(1);
        let scorer = FusionScorer::new(FusionWeights::default()).unwrap();

        let single_a = scorer.score(0.5, &candidate, &context(&[query_a.clone()])).unwrap();
        let single_b = scorer.score(0.5, &candidate, &context(&[query_b.clone()])).unwrap();
        let both = scorer.score(0.5, &candidate, &context(&[query_a, query_b])).unwrap();

        assert!((both.color_sim - (single_a.color_sim + single_b.color_sim) / 2.0).abs() < 1e-9);
        assert!((both.phash_sim - (single_a.phash_sim + single_b.phash_sim) / 2.0).abs() < 1e-9);
        assert!(both.combined <= single_a.combined);
    }

    #[test]
    fn test_out_of_range_clip_is_scoring_error() {
        let image = pattern(2);
        let scorer = FusionScorer::new(FusionWeights::default()).unwrap();
        let err = scorer.score(1.5, &image, &context(&[image.clone()])).unwrap_err();
        assert!(matches!(err, PictorError::Scoring(_)));
    }

    #[test]
    fn test_rejects_invalid_weights() {
        assert!(FusionScorer::new(FusionWeights::new(0.5, 0.5, 0.5)).is_err());
    }
}
