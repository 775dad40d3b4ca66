//! Secondary similarity signals computed directly from pixels.
//!
//! - [`histogram`]: color histogram L2 distance
//! - [`phash`]: perceptual hash Hamming distance
//!
//! Both produce non-negative distances; [`inverse_distance`] maps them onto
//! (0, 1] for fusion.

pub mod histogram;
pub mod phash;

pub use histogram::{ColorHistogram, HistogramConfig, HistogramMode, color_histogram_distance};
pub use phash::{PerceptualHash, perceptual_hash_distance};

/// Map a non-negative distance to a similarity in (0, 1], equal to 1 only at 0.
///
/// Negative or non-finite input yields a value outside (0, 1]; callers check
/// the range before fusing.
pub fn inverse_distance(distance: f64) -> f64 {
    1.0 / (1.0 + distance)
}
