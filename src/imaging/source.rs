//! Image sources: where candidate and query pixels come from.

use std::fmt::Debug;
use std::path::{Path, PathBuf};

use ahash::AHashMap;
use image::ImageReader;
use parking_lot::RwLock;

use crate::error::{PictorError, Result};
use crate::imaging::{DEFAULT_PREPROCESS_SIZE, DecodedImage};

/// Trait for turning a path into decoded, preprocessed pixels.
///
/// Implementations must be safe to call from many scoring workers at once.
pub trait ImageSource: Send + Sync + Debug {
    /// Decode the image stored at `path`.
    ///
    /// Any failure is reported as [`PictorError::Decode`] so callers can skip
    /// the image without aborting a search.
    fn decode(&self, path: &Path) -> Result<DecodedImage>;

    /// Get the name of this source type.
    fn source_type(&self) -> &str;
}

/// Reads images from the local filesystem with the `image` crate.
#[derive(Debug, Clone)]
pub struct FsImageSource {
    preprocess_size: Option<u32>,
}

impl FsImageSource {
    /// Create a source that resizes every image to `preprocess_size`².
    pub fn new(preprocess_size: Option<u32>) -> Self {
        Self { preprocess_size }
    }
}

impl Default for FsImageSource {
    fn default() -> Self {
        Self::new(Some(DEFAULT_PREPROCESS_SIZE))
    }
}

impl ImageSource for FsImageSource {
    fn decode(&self, path: &Path) -> Result<DecodedImage> {
        let reader = ImageReader::open(path)
            .and_then(|reader| reader.with_guessed_format())
            .map_err(|e| PictorError::decode(format!("{}: {e}", path.display())))?;
        let image = reader
            .decode()
            .map_err(|e| PictorError::decode(format!("{}: {e}", path.display())))?;

        let decoded = DecodedImage::from_dynamic(image);
        Ok(match self.preprocess_size {
            Some(size) => decoded.preprocessed(size),
            None => decoded,
        })
    }

    fn source_type(&self) -> &str {
        "fs"
    }
}

/// In-memory image source keyed by path.
#[derive(Debug, Default)]
pub struct MemoryImageSource {
    images: RwLock<AHashMap<PathBuf, DecodedImage>>,
}

impl MemoryImageSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `image` under `path`, replacing any previous entry.
    pub fn insert<P: Into<PathBuf>>(&self, path: P, image: DecodedImage) {
        self.images.write().insert(path.into(), image);
    }

    /// Forget the image stored under `path`.
    pub fn remove(&self, path: &Path) -> Option<DecodedImage> {
        self.images.write().remove(path)
    }

    pub fn len(&self) -> usize {
        self.images.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.read().is_empty()
    }
}

impl ImageSource for MemoryImageSource {
    fn decode(&self, path: &Path) -> Result<DecodedImage> {
        self.images
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| PictorError::decode(format!("{}: not in memory source", path.display())))
    }

    fn source_type(&self) -> &str {
        "memory"
    }
}
