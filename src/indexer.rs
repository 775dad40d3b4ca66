//! Offline indexing job.
//!
//! Walks an image directory, embeds every readable image and writes the three
//! files an [`ImageSearchEngine`](crate::search::ImageSearchEngine) opens:
//! the vector index, the slot mapping and the metadata store.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use log::{debug, info, warn};
use rayon::prelude::*;
use serde::Serialize;

use crate::embedding::{Embedding, ImageEmbedder};
use crate::error::{PictorError, Result};
use crate::imaging::{DecodedImage, FsImageSource, ImageSource};
use crate::index::{CandidateId, FlatIndexBuilder, INDEX_FILE, MAPPING_FILE, SlotMapping};
use crate::metadata::{ImageMetadata, METADATA_FILE, MemoryMetadataStore};

/// File extensions picked up by the directory walk (case-insensitive).
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Summary of an indexing run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndexingReport {
    pub indexed: usize,
    /// Unreadable images or images without an embedding.
    pub skipped: usize,
    /// Paths already present in the collection.
    pub duplicates: usize,
    pub dimension: usize,
    pub elapsed_ms: f64,
}

/// Accumulates images into an index, mapping and metadata store.
#[derive(Debug)]
pub struct CollectionIndexer {
    embedder: Arc<dyn ImageEmbedder>,
    preprocess_size: Option<u32>,
    builder: FlatIndexBuilder,
    mapping: SlotMapping,
    metadata: MemoryMetadataStore,
    report: IndexingReport,
}

impl CollectionIndexer {
    pub fn new(embedder: Arc<dyn ImageEmbedder>, preprocess_size: Option<u32>) -> Self {
        let dimension = embedder.dimension();
        Self {
            embedder,
            preprocess_size,
            builder: FlatIndexBuilder::new(dimension),
            mapping: SlotMapping::new(),
            metadata: MemoryMetadataStore::new(),
            report: IndexingReport {
                dimension,
                ..Default::default()
            },
        }
    }

    /// Embed an image decoded at its original size.
    pub fn embed(&self, image: &DecodedImage) -> Result<Embedding> {
        let prepared = match self.preprocess_size {
            Some(size) => image.preprocessed(size),
            None => image.clone(),
        };
        let embedding = self.embedder.embed(&prepared)?;
        embedding.validate_dimension(self.embedder.dimension())?;
        if !embedding.is_unit() {
            return Err(PictorError::invalid_argument(format!(
                "embedding norm {} is not 1",
                embedding.norm()
            )));
        }
        Ok(embedding)
    }

    /// Add one image. Returns the assigned slot, or `None` if the path is
    /// already indexed.
    pub fn add(&mut self, path: &Path, image: &DecodedImage) -> Result<Option<u32>> {
        let embedding = self.embed(image)?;
        self.add_embedded(path, image.width(), image.height(), &embedding)
    }

    fn add_embedded(&mut self, path: &Path, width: u32, height: u32, embedding: &Embedding) -> Result<Option<u32>> {
        let id = CandidateId::from_path(path);
        let metadata = ImageMetadata {
            path: path.to_path_buf(),
            width,
            height,
        };
        if !self.metadata.insert(id.clone(), metadata) {
            debug!("Already indexed: {}", path.display());
            self.report.duplicates += 1;
            return Ok(None);
        }

        let slot = self.builder.add_item(&embedding.data)?;
        self.mapping.insert(slot, id);
        self.report.indexed += 1;
        Ok(Some(slot))
    }

    /// Decode, embed and add every image under `dir`, in path order.
    ///
    /// Decoding and embedding run in parallel; unreadable files are skipped.
    pub fn add_directory(&mut self, dir: &Path) -> Result<usize> {
        let paths = find_images(dir)?;
        info!("Found {} images under {}", paths.len(), dir.display());

        let source = FsImageSource::new(None);
        let embedded: Vec<(PathBuf, Result<(u32, u32, Embedding)>)> = paths
            .into_par_iter()
            .map(|path| {
                let outcome = source
                    .decode(&path)
                    .and_then(|image| Ok((image.width(), image.height(), self.embed(&image)?)));
                (path, outcome)
            })
            .collect();

        let before = self.report.indexed;
        for (path, outcome) in embedded {
            match outcome {
                Ok((width, height, embedding)) => {
                    self.add_embedded(&path, width, height, &embedding)?;
                }
                Err(e) => {
                    warn!("Skipping {}: {e}", path.display());
                    self.report.skipped += 1;
                }
            }
        }
        Ok(self.report.indexed - before)
    }

    pub fn len(&self) -> usize {
        self.builder.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builder.is_empty()
    }

    /// Write `index.bin`, `mapping.json` and `metadata.json` into `out_dir`.
    pub fn finish(self, out_dir: &Path) -> Result<IndexingReport> {
        if self.builder.is_empty() {
            return Err(PictorError::input("no images were indexed"));
        }
        fs::create_dir_all(out_dir)?;

        let index = self.builder.build()?;
        index.save(out_dir.join(INDEX_FILE))?;
        self.mapping.save(out_dir.join(MAPPING_FILE))?;
        self.metadata.save(out_dir.join(METADATA_FILE))?;
        info!(
            "Wrote {} vectors of dimension {} to {}",
            self.report.indexed,
            self.report.dimension,
            out_dir.display()
        );
        Ok(self.report)
    }
}

/// Index every image under `input` into `output`.
pub fn index_directory(
    input: &Path,
    output: &Path,
    embedder: Arc<dyn ImageEmbedder>,
    preprocess_size: Option<u32>,
) -> Result<IndexingReport> {
    let start = Instant::now();
    let mut indexer = CollectionIndexer::new(embedder, preprocess_size);
    indexer.add_directory(input)?;
    let mut report = indexer.finish(output)?;
    report.elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
    Ok(report)
}

/// Recursively list image files under `dir`, sorted by path.
pub fn find_images(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(PictorError::input(format!("{} is not a directory", dir.display())));
    }

    let mut found = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        for entry in fs::read_dir(&current)? {
            let entry = entry?;
            let path = entry.path();
            // Symlinked directories are not followed.
            if entry.file_type()?.is_dir() {
                pending.push(path);
            } else if has_image_extension(&path) {
                found.push(path);
            }
        }
    }
    found.sort();
    Ok(found)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}
