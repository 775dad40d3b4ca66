//! Color histogram fingerprints and their L2 distance.

use serde::{Deserialize, Serialize};

use crate::error::{PictorError, Result};
use crate::imaging::DecodedImage;

/// Number of distinct values per 8-bit channel.
const CHANNEL_RANGE: usize = 256;

/// How the color histogram is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum HistogramMode {
    /// One density histogram per R, G, B channel, concatenated (`3 × bins`).
    #[default]
    PerChannel,
    /// One joint RGB histogram (`bins³`), normalised to sum 1.
    Joint,
}

/// Histogram settings shared by the scorer and the reference embedder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistogramConfig {
    /// Buckets per channel over the full [0, 256) value range.
    pub bins: usize,
    /// Histogram layout.
    pub mode: HistogramMode,
}

impl Default for HistogramConfig {
    fn default() -> Self {
        Self {
            bins: 8,
            mode: HistogramMode::PerChannel,
        }
    }
}

impl HistogramConfig {
    /// Check that the bucket count can partition an 8-bit channel.
    pub fn validate(&self) -> Result<()> {
        if self.bins == 0 || self.bins > CHANNEL_RANGE {
            return Err(PictorError::invalid_config(format!(
                "histogram bins must be in 1..=256, got {}",
                self.bins
            )));
        }
        Ok(())
    }

    /// Length of the histogram vector this config produces.
    pub fn vector_len(&self) -> usize {
        match self.mode {
            HistogramMode::PerChannel => 3 * self.bins,
            HistogramMode::Joint => self.bins * self.bins * self.bins,
        }
    }
}

/// A normalised color histogram.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorHistogram {
    values: Vec<f32>,
}

impl ColorHistogram {
    /// Compute the histogram of `image`.
    ///
    /// Normalisation divides by the pixel count, so the result is independent
    /// of the image resolution.
    pub fn compute(image: &DecodedImage, config: &HistogramConfig) -> Self {
        let bins = config.bins.clamp(1, CHANNEL_RANGE);
        let clamped = HistogramConfig { bins, mode: config.mode };
        let mut counts = vec![0u32; clamped.vector_len()];

        for pixel in image.rgb().pixels() {
            let [r, g, b] = pixel.0;
            match config.mode {
                HistogramMode::PerChannel => {
                    counts[bucket(r, bins)] += 1;
                    counts[bins + bucket(g, bins)] += 1;
                    counts[2 * bins + bucket(b, bins)] += 1;
                }
                HistogramMode::Joint => {
                    let index = (bucket(r, bins) * bins + bucket(g, bins)) * bins + bucket(b, bins);
                    counts[index] += 1;
                }
            }
        }

        let pixels = image.pixel_count().max(1) as f32;
        let scale = match config.mode {
            // Density: integrates to 1 over each channel's value range.
            HistogramMode::PerChannel => pixels * (CHANNEL_RANGE as f32 / bins as f32),
            HistogramMode::Joint => pixels,
        };

        Self {
            values: counts.into_iter().map(|c| c as f32 / scale).collect(),
        }
    }

    /// Euclidean distance to another histogram of the same layout.
    pub fn distance(&self, other: &ColorHistogram) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f32>()
            .sqrt()
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn into_values(self) -> Vec<f32> {
        self.values
    }
}

#[inline]
fn bucket(value: u8, bins: usize) -> usize {
    value as usize * bins / CHANNEL_RANGE
}

/// L2 distance between the color histograms of two images.
pub fn color_histogram_distance(a: &DecodedImage, b: &DecodedImage, config: &HistogramConfig) -> f32 {
    ColorHistogram::compute(a, config).distance(&ColorHistogram::compute(b, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn solid(color: [u8; 3], size: u32) -> DecodedImage {
        DecodedImage::new(RgbImage::from_pixel(size, size, Rgb(color)))
    }

    #[test]
    fn test_histogram_shape() {
        let config = HistogramConfig {
            bins: 4,
            mode: HistogramMode::PerChannel,
        };
        let hist = ColorHistogram::compute(&solid([0, 0, 0], 16), &config);
        assert_eq!(hist.values().len(), 12);

        let joint = HistogramConfig {
            bins: 4,
            mode: HistogramMode::Joint,
        };
        let hist = ColorHistogram::compute(&solid([0, 0, 0], 16), &joint);
        assert_eq!(hist.values().len(), 64);
        assert!((hist.values().iter().sum::<f32>() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_per_channel_density_integrates_to_one() {
        let config = HistogramConfig::default();
        let hist = ColorHistogram::compute(&solid([17, 130, 250], 10), &config);
        let bucket_width = 256.0 / config.bins as f32;

        for channel in hist.values().chunks(config.bins) {
            let area: f32 = channel.iter().map(|v| v * bucket_width).sum();
            assert!((area - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_identical_images_have_zero_distance() {
        let config = HistogramConfig {
            bins: 4,
            mode: HistogramMode::PerChannel,
        };
        let black = solid([0, 0, 0], 16);
        let white = solid([255, 255, 255], 16);

        assert_eq!(color_histogram_distance(&black, &black, &config), 0.0);
        assert!(color_histogram_distance(&black, &white, &config) > 0.0);
    }

    #[test]
    fn test_distance_is_resolution_independent() {
        let config = HistogramConfig::default();
        let small = solid([90, 10, 200], 8);
        let large = solid([90, 10, 200], 64);
        assert!(color_histogram_distance(&small, &large, &config) < 1e-6);
    }

    #[test]
    fn test_bucket_edges() {
        assert_eq!(bucket(0, 8), 0);
        assert_eq!(bucket(31, 8), 0);
        assert_eq!(bucket(32, 8), 1);
        assert_eq!(bucket(255, 8), 7);
        assert_eq!(bucket(255, 256), 255);
        assert_eq!(bucket(200, 1), 0);
    }

    #[test]
    fn test_config_validation() {
        assert!(HistogramConfig::default().validate().is_ok());
        let zero = HistogramConfig {
            bins: 0,
            ..Default::default()
        };
        assert!(zero.validate().is_err());
        let too_many = HistogramConfig {
            bins: 257,
            ..Default::default()
        };
        assert!(too_many.validate().is_err());
    }
}
