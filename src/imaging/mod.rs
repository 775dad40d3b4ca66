//! Decoded images and the sources that produce them.
//!
//! Decoding and resizing are collaborators of the search core: everything
//! downstream works on [`DecodedImage`], an RGB pixel grid that is read-only
//! once built and cheap to share between scoring workers.

pub mod source;

pub use source::{FsImageSource, ImageSource, MemoryImageSource};

use std::sync::Arc;

use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};

/// Default edge length of the preprocessing grid.
pub const DEFAULT_PREPROCESS_SIZE: u32 = 224;

/// An RGB image ready for scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pixels: Arc<RgbImage>,
}

impl DecodedImage {
    /// Wrap an RGB buffer.
    pub fn new(pixels: RgbImage) -> Self {
        Self {
            pixels: Arc::new(pixels),
        }
    }

    /// Convert any decoded image to RGB.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self::new(image.to_rgb8())
    }

    /// Resize to a `size`×`size` grid, or return a clone when already there.
    ///
    /// An empty image stays empty.
    pub fn preprocessed(&self, size: u32) -> Self {
        if self.is_empty() || (self.width() == size && self.height() == size) {
            return self.clone();
        }
        let resized = image::imageops::resize(self.pixels.as_ref(), size, size, FilterType::CatmullRom);
        Self::new(resized)
    }

    /// Borrow the pixel buffer.
    pub fn rgb(&self) -> &RgbImage {
        &self.pixels
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Number of pixels in the grid.
    pub fn pixel_count(&self) -> usize {
        self.width() as usize * self.height() as usize
    }

    /// True when the grid holds no pixels.
    pub fn is_empty(&self) -> bool {
        self.pixel_count() == 0
    }
}

impl From<RgbImage> for DecodedImage {
    fn from(pixels: RgbImage) -> Self {
        Self::new(pixels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_preprocess_resizes_to_square_grid() {
        let image = DecodedImage::new(RgbImage::from_pixel(40, 10, Rgb([10, 20, 30])));
        let resized = image.preprocessed(16);

        assert_eq!(resized.width(), 16);
        assert_eq!(resized.height(), 16);
        assert_eq!(resized.pixel_count(), 256);
        assert_eq!(resized.rgb().get_pixel(3, 3), &Rgb([10, 20, 30]));
    }

    #[test]
    fn test_preprocess_keeps_empty_image_empty() {
        let empty = DecodedImage::new(RgbImage::new(0, 0));
        let resized = empty.preprocessed(224);
        assert!(resized.is_empty());
        assert_eq!((resized.width(), resized.height()), (0, 0));
    }

    #[test]
    fn test_preprocess_is_noop_at_target_size() {
        let image = DecodedImage::new(RgbImage::from_pixel(8, 8, Rgb([1, 2, 3])));
        let same = image.preprocessed(8);
        assert_eq!(image, same);
    }
}
