//! Turns index neighbors into scoreable candidates.

use std::path::PathBuf;

use log::debug;

use crate::error::{PictorError, Result};
use crate::imaging::{DecodedImage, ImageSource};
use crate::index::{CandidateId, Neighbor, SlotMapping};
use crate::metadata::{ImageMetadata, MetadataStore};

/// Similarity in `[0, 1]` derived from an angular distance in `[0, 2]`.
pub fn clip_similarity(distance: f32) -> f64 {
    (1.0 - distance as f64 / 2.0).clamp(0.0, 1.0)
}

/// A neighbor with its id and metadata resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCandidate {
    pub id: CandidateId,
    pub slot: u32,
    pub metadata: ImageMetadata,
    /// Raw angular distance reported by the index.
    pub distance: f32,
    /// Embedding similarity derived from `distance`.
    pub clip_sim: f64,
}

impl ResolvedCandidate {
    pub fn path(&self) -> &PathBuf {
        &self.metadata.path
    }
}

/// Outcome of resolving one batch of neighbors.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// Resolved candidates, descending by `clip_sim`.
    pub candidates: Vec<ResolvedCandidate>,
    /// Neighbors without a mapping entry or metadata record.
    pub misses: usize,
}

/// Resolves slots through the mapping and the metadata store, and decodes
/// candidate pixels on demand.
#[derive(Debug, Clone, Copy)]
pub struct CandidateResolver<'a> {
    mapping: &'a SlotMapping,
    metadata: &'a dyn MetadataStore,
    images: &'a dyn ImageSource,
    preprocess_size: Option<u32>,
}

impl<'a> CandidateResolver<'a> {
    pub fn new(
        mapping: &'a SlotMapping,
        metadata: &'a dyn MetadataStore,
        images: &'a dyn ImageSource,
        preprocess_size: Option<u32>,
    ) -> Self {
        Self {
            mapping,
            metadata,
            images,
            preprocess_size,
        }
    }

    /// Resolve neighbors into candidates.
    ///
    /// Unresolvable neighbors are skipped and counted. The result is sorted
    /// by `clip_sim` descending; equal similarities keep index order.
    pub fn resolve(&self, neighbors: &[Neighbor]) -> Result<Resolution> {
        let mut resolution = Resolution {
            candidates: Vec::with_capacity(neighbors.len()),
            misses: 0,
        };

        for neighbor in neighbors {
            if !neighbor.distance.is_finite() {
                debug!("Skipping slot {}: non-finite distance", neighbor.slot);
                resolution.misses += 1;
                continue;
            }
            match self.resolve_one(neighbor) {
                Ok(candidate) => resolution.candidates.push(candidate),
                Err(e) if e.is_per_candidate() => {
                    debug!("Skipping slot {}: {e}", neighbor.slot);
                    resolution.misses += 1;
                }
                Err(e) => return Err(e),
            }
        }

        resolution
            .candidates
            .sort_by(|a, b| b.clip_sim.total_cmp(&a.clip_sim));
        Ok(resolution)
    }

    fn resolve_one(&self, neighbor: &Neighbor) -> Result<ResolvedCandidate> {
        let id = self.mapping.resolve(neighbor.slot)?;
        let metadata = self
            .metadata
            .lookup(id)?
            .ok_or_else(|| PictorError::lookup_miss(format!("no metadata for candidate {id}")))?;

        Ok(ResolvedCandidate {
            id: id.clone(),
            slot: neighbor.slot,
            metadata,
            distance: neighbor.distance,
            clip_sim: clip_similarity(neighbor.distance),
        })
    }

    /// Decode a candidate's pixels onto the scoring grid.
    pub fn decode(&self, candidate: &ResolvedCandidate) -> Result<DecodedImage> {
        let image = self.images.decode(candidate.path())?;
        if image.is_empty() {
            return Err(PictorError::decode(format!(
                "{}: image has no pixels",
                candidate.path().display()
            )));
        }
        Ok(match self.preprocess_size {
            Some(size) => image.preprocessed(size),
            None => image,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::MemoryImageSource;
    use crate::metadata::MemoryMetadataStore;
    use image::{Rgb, RgbImage};

    fn meta(path: &str) -> ImageMetadata {
        ImageMetadata {
            path: PathBuf::from(path),
            width: 4,
            height: 4,
        }
    }

    fn fixture() -> (SlotMapping, MemoryMetadataStore, MemoryImageSource) {
        let mapping: SlotMapping = vec![(0, "a".into()), (1, "b".into()), (2, "c".into()), (3, "d".into())]
            .into_iter()
            .collect();
        let mut store = MemoryMetadataStore::new();
        store.insert("a".into(), meta("/a.png"));
        store.insert("b".into(), meta("/b.png"));
        store.insert("c".into(), meta("/c.png"));
        // "d" has a mapping entry but no metadata.

        let images = MemoryImageSource::new();
        images.insert("/a.png", DecodedImage::new(RgbImage::from_pixel(4, 4, Rgb([1, 2, 3]))));
        (mapping, store, images)
    }

    #[test]
    fn test_clip_similarity() {
        assert_eq!(clip_similarity(0.0), 1.0);
        assert_eq!(clip_similarity(2.0), 0.0);
        assert!((clip_similarity(0.5) - 0.75).abs() < 1e-12);
        assert_eq!(clip_similarity(2.5), 0.0);
        assert_eq!(clip_similarity(-0.1), 1.0);
    }

    #[test]
    fn test_resolve_skips_misses_and_sorts() {
        let (mapping, store, images) = fixture();
        let resolver = CandidateResolver::new(&mapping, &store, &images, None);
        let neighbors = [
            Neighbor { slot: 1, distance: 0.4 },
            Neighbor { slot: 9, distance: 0.5 },
            Neighbor { slot: 0, distance: 0.2 },
            Neighbor { slot: 3, distance: 0.6 },
            Neighbor { slot: 2, distance: f32::NAN },
        ];

        let resolution = resolver.resolve(&neighbors).unwrap();
        assert_eq!(resolution.misses, 3);
        let ids: Vec<&str> = resolution.candidates.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!((resolution.candidates[0].clip_sim - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_equal_similarity_keeps_index_order() {
        let (mapping, store, images) = fixture();
        let resolver = CandidateResolver::new(&mapping, &store, &images, None);
        let neighbors = [
            Neighbor { slot: 2, distance: 0.3 },
            Neighbor { slot: 0, distance: 0.3 },
        ];
        let resolution = resolver.resolve(&neighbors).unwrap();
        let ids: Vec<&str> = resolution.candidates.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a"]);
    }

    #[test]
    fn test_decode() {
        let (mapping, store, images) = fixture();
        let resolver = CandidateResolver::new(&mapping, &store, &images, Some(8));
        let resolution = resolver
            .resolve(&[
                Neighbor { slot: 0, distance: 0.1 },
                Neighbor { slot: 1, distance: 0.2 },
            ])
            .unwrap();

        let image = resolver.decode(&resolution.candidates[0]).unwrap();
        assert_eq!((image.width(), image.height()), (8, 8));

        let err = resolver.decode(&resolution.candidates[1]).unwrap_err();
        assert!(err.is_per_candidate());
    }

    #[test]
    fn test_decode_rejects_empty_image() {
        let (mapping, store, images) = fixture();
        images.insert("/b.png", DecodedImage::new(RgbImage::new(0, 0)));
        let resolver = CandidateResolver::new(&mapping, &store, &images, Some(8));
        let resolution = resolver
            .resolve(&[Neighbor { slot: 1, distance: 0.2 }])
            .unwrap();

        let err = resolver.decode(&resolution.candidates[0]).unwrap_err();
        assert!(matches!(err, PictorError::Decode(_)));
    }
}
