//! 64-bit DCT perceptual hash.
//!
//! The image is reduced to a 32×32 grayscale grid, transformed with a 2-D
//! DCT-II, and the 8×8 block of lowest frequencies is thresholded against its
//! median. Perceptually similar images differ in few bits.

use std::sync::OnceLock;

use image::imageops::{self, FilterType};
use serde::{Deserialize, Serialize};

use crate::imaging::DecodedImage;

/// Side of the grayscale grid fed to the DCT.
const DCT_SIDE: usize = 32;

/// Side of the low-frequency block kept for the hash.
const HASH_SIDE: usize = 8;

/// Number of bits in a hash.
pub const HASH_BITS: u32 = (HASH_SIDE * HASH_SIDE) as u32;

/// A 64-bit perceptual hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PerceptualHash(u64);

impl PerceptualHash {
    /// Hash the given image.
    pub fn compute(image: &DecodedImage) -> Self {
        let gray = imageops::grayscale(image.rgb());
        let small = imageops::resize(&gray, DCT_SIDE as u32, DCT_SIDE as u32, FilterType::Lanczos3);
        let pixels: Vec<f32> = small.pixels().map(|p| p.0[0] as f32).collect();

        let basis = cosine_basis();

        // Row pass: keep only the low horizontal frequencies of each row.
        let mut rows = [[0f32; HASH_SIDE]; DCT_SIDE];
        for (y, row) in rows.iter_mut().enumerate() {
            let line = &pixels[y * DCT_SIDE..(y + 1) * DCT_SIDE];
            for (u, coeff) in row.iter_mut().enumerate() {
                *coeff = dot(line, &basis[u]);
            }
        }

        // Column pass over the kept coefficients.
        let mut low = [0f32; HASH_SIDE * HASH_SIDE];
        for v in 0..HASH_SIDE {
            for u in 0..HASH_SIDE {
                low[v * HASH_SIDE + u] = rows
                    .iter()
                    .zip(basis[v].iter())
                    .map(|(row, c)| row[u] * c)
                    .sum();
            }
        }

        let median = median(&low);
        let bits = low
            .iter()
            .enumerate()
            .filter(|(_, coeff)| **coeff > median)
            .fold(0u64, |acc, (i, _)| acc | (1u64 << (HASH_BITS as usize - 1 - i)));

        Self(bits)
    }

    /// Number of differing bits.
    pub fn hamming_distance(&self, other: &PerceptualHash) -> u32 {
        (self.0 ^ other.0).count_ones()
    }

    pub fn bits(&self) -> u64 {
        self.0
    }
}

impl From<u64> for PerceptualHash {
    fn from(bits: u64) -> Self {
        Self(bits)
    }
}

impl std::fmt::Display for PerceptualHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Hamming distance between the perceptual hashes of two images.
pub fn perceptual_hash_distance(a: &DecodedImage, b: &DecodedImage) -> u32 {
    PerceptualHash::compute(a).hamming_distance(&PerceptualHash::compute(b))
}

/// DCT-II basis rows for the first `HASH_SIDE` frequencies.
fn cosine_basis() -> &'static [[f32; DCT_SIDE]; HASH_SIDE] {
    static BASIS: OnceLock<[[f32; DCT_SIDE]; HASH_SIDE]> = OnceLock::new();
    BASIS.get_or_init(|| {
        let mut basis = [[0f32; DCT_SIDE]; HASH_SIDE];
        for (k, row) in basis.iter_mut().enumerate() {
            for (n, value) in row.iter_mut().enumerate() {
                let angle =
                    std::f64::consts::PI * k as f64 * (2 * n + 1) as f64 / (2 * DCT_SIDE) as f64;
                *value = (2.0 * angle.cos()) as f32;
            }
        }
        basis
    })
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn median(values: &[f32]) -> f32 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn solid(color: [u8; 3]) -> DecodedImage {
        DecodedImage::new(RgbImage::from_pixel(16, 16, Rgb(color)))
    }

    fn texture(seed: u32) -> DecodedImage {
        DecodedImage::new(RgbImage::from_fn(64, 64, |x, y| {
            let v = (x.wrapping_mul(7919) ^ y.wrapping_mul(104_729) ^ seed.wrapping_mul(2_654_435_761))
                .wrapping_mul(2_246_822_519)
                >> 24;
            Rgb([v as u8, v as u8, v as u8])
        }))
    }

    #[test]
    fn test_identical_images_hash_equal() {
        let a = solid([128, 128, 128]);
        let b = solid([128, 128, 128]);
        assert_eq!(PerceptualHash::compute(&a), PerceptualHash::compute(&b));
        assert_eq!(perceptual_hash_distance(&a, &b), 0);
    }

    #[test]
    fn test_different_textures_differ() {
        let distance = perceptual_hash_distance(&texture(1), &texture(2));
        assert!(distance > 0);
        assert!(distance <= HASH_BITS);
    }

    #[test]
    fn test_hash_is_deterministic() {
        let image = texture(7);
        assert_eq!(PerceptualHash::compute(&image), PerceptualHash::compute(&image.clone()));
    }

    #[test]
    fn test_hamming_distance() {
        let a = PerceptualHash::from(0b1011);
        let b = PerceptualHash::from(0b0001);
        assert_eq!(a.hamming_distance(&b), 2);
        assert_eq!(a.hamming_distance(&a), 0);
        assert_eq!(PerceptualHash::from(0).hamming_distance(&PerceptualHash::from(u64::MAX)), 64);
    }

    #[test]
    fn test_display_is_hex() {
        assert_eq!(PerceptualHash::from(0xabc).to_string(), "0000000000000abc");
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
    }
}
