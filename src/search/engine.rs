//! Image search engine: retrieval, resolution and fused reranking.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use log::{debug, info, warn};
use parking_lot::Mutex;

use crate::embedding::{HistogramEmbedder, ImageEmbedder};
use crate::error::{PictorError, Result};
use crate::imaging::{DecodedImage, FsImageSource, ImageSource};
use crate::index::{FlatAngularIndex, INDEX_FILE, MAPPING_FILE, SlotMapping, VectorIndex};
use crate::metadata::{METADATA_FILE, MemoryMetadataStore, MetadataStore};
use crate::search::config::SearchConfig;
use crate::search::query::QueryContext;
use crate::search::resolver::CandidateResolver;
use crate::search::scheduler::{CancellationToken, RerankOptions, RerankScheduler};
use crate::search::scorer::FusionScorer;
use crate::search::top_k::TopK;
use crate::search::types::{EngineStats, ResultEntry, SearchResults, SearchStats};

/// The collaborators an engine searches over.
#[derive(Debug, Clone)]
pub struct SearchComponents {
    pub index: Arc<dyn VectorIndex>,
    pub mapping: Arc<SlotMapping>,
    pub metadata: Arc<dyn MetadataStore>,
    pub images: Arc<dyn ImageSource>,
    pub embedder: Arc<dyn ImageEmbedder>,
}

/// Parameters of a single search.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// Neighbors requested from the vector index.
    pub fanout: usize,
    /// Maximum results returned.
    pub top_k: usize,
    /// Allow early termination. Has no effect if the engine config disables it.
    pub enable_pruning: bool,
    pub cancel: Option<CancellationToken>,
}

impl SearchRequest {
    pub fn new(fanout: usize, top_k: usize) -> Self {
        Self {
            fanout,
            top_k,
            enable_pruning: true,
            cancel: None,
        }
    }

    pub fn with_pruning(mut self, enabled: bool) -> Self {
        self.enable_pruning = enabled;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn validate(&self) -> Result<()> {
        if self.fanout == 0 {
            return Err(PictorError::invalid_argument("fanout must be at least 1"));
        }
        if self.top_k == 0 {
            return Err(PictorError::invalid_argument("top_k must be at least 1"));
        }
        Ok(())
    }
}

impl From<&SearchConfig> for SearchRequest {
    fn from(config: &SearchConfig) -> Self {
        Self::new(config.fanout, config.top_k).with_pruning(config.scheduler.enable_pruning)
    }
}

/// Multi-image similarity search over an indexed collection.
///
/// Every search embeds the query images, retrieves `fanout` neighbors of
/// their mean embedding, resolves them to candidate images and reranks them
/// by a fixed convex fusion of embedding, color histogram and perceptual
/// hash similarity. The engine is read-only and may be shared across threads.
///
/// # Examples
///
/// ```no_run
/// use pictor::search::{ImageSearchEngine, SearchConfig, SearchRequest};
///
/// let engine = ImageSearchEngine::open("./index", SearchConfig::default())?;
/// let results = engine.search_paths(&["query.jpg"], &SearchRequest::new(20, 5))?;
/// for entry in &results.entries {
///     println!("{} {:.4}", entry.path.display(), entry.combined());
/// }
/// # Ok::<(), pictor::error::PictorError>(())
/// ```
#[derive(Debug)]
pub struct ImageSearchEngine {
    config: SearchConfig,
    components: SearchComponents,
    scorer: FusionScorer,
    scheduler: RerankScheduler,
    stats: Mutex<EngineStats>,
}

impl ImageSearchEngine {
    /// Create an engine. Fails if the config is invalid or the embedder and
    /// index disagree on dimension.
    pub fn new(config: SearchConfig, components: SearchComponents) -> Result<Self> {
        config.validate()?;
        let index_dim = components.index.dimension();
        let embed_dim = components.embedder.dimension();
        if index_dim != embed_dim {
            return Err(PictorError::invalid_config(format!(
                "embedder '{}' produces {embed_dim}-dimensional vectors but the index holds {index_dim}",
                components.embedder.name()
            )));
        }

        let scorer = FusionScorer::new(config.weights)?;
        let scheduler = RerankScheduler::new(&config.scheduler)?;
        info!(
            "Search engine ready: {} indexed images, {} workers, chunk size {}",
            components.index.len(),
            scheduler.workers(),
            scheduler.chunk_size()
        );

        Ok(Self {
            config,
            components,
            scorer,
            scheduler,
            stats: Mutex::new(EngineStats::default()),
        })
    }

    /// Open an index directory written by the indexing job, embedding
    /// queries with the default [`HistogramEmbedder`].
    pub fn open<P: AsRef<Path>>(dir: P, config: SearchConfig) -> Result<Self> {
        Self::open_with_embedder(dir, config, Arc::new(HistogramEmbedder::default()))
    }

    /// Open an index directory with a caller-provided embedder.
    pub fn open_with_embedder<P: AsRef<Path>>(
        dir: P,
        config: SearchConfig,
        embedder: Arc<dyn ImageEmbedder>,
    ) -> Result<Self> {
        let dir = dir.as_ref();
        let index = FlatAngularIndex::load(dir.join(INDEX_FILE))?;
        let mapping = SlotMapping::load(dir.join(MAPPING_FILE))?;
        let metadata = MemoryMetadataStore::load(dir.join(METADATA_FILE))?;
        debug!(
            "Loaded {} vectors, {} slot mappings and {} metadata records from {}",
            index.len(),
            mapping.len(),
            metadata.len(),
            dir.display()
        );

        let images = FsImageSource::new(config.preprocess_size);
        Self::new(
            config,
            SearchComponents {
                index: Arc::new(index),
                mapping: Arc::new(mapping),
                metadata: Arc::new(metadata),
                images: Arc::new(images),
                embedder,
            },
        )
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Cumulative statistics over every search run so far.
    pub fn stats(&self) -> EngineStats {
        self.stats.lock().clone()
    }

    /// Search with explicit fan-out and result count.
    pub fn search(&self, query_images: &[DecodedImage], fanout: usize, top_k: usize) -> Result<SearchResults> {
        let request = SearchRequest::new(fanout, top_k).with_pruning(self.config.scheduler.enable_pruning);
        self.search_with(query_images, &request)
    }

    /// Decode query images from paths, then search.
    ///
    /// Unreadable paths are skipped. Fails with [`PictorError::Input`] when
    /// none can be decoded.
    pub fn search_paths<P: AsRef<Path>>(&self, paths: &[P], request: &SearchRequest) -> Result<SearchResults> {
        let mut images = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.as_ref();
            match self.components.images.decode(path) {
                Ok(image) => images.push(image),
                Err(e) => warn!("Skipping query image {}: {e}", path.display()),
            }
        }
        if images.is_empty() {
            self.stats.lock().record_failure();
            return Err(PictorError::input(format!(
                "none of the {} query paths could be decoded",
                paths.len()
            )));
        }
        self.search_with(&images, request)
    }

    /// Run a search described by `request`.
    pub fn search_with(&self, query_images: &[DecodedImage], request: &SearchRequest) -> Result<SearchResults> {
        let result = self.run_search(query_images, request);
        let mut stats = self.stats.lock();
        match &result {
            Ok(results) => stats.record_success(&results.stats),
            Err(_) => stats.record_failure(),
        }
        result
    }

    fn run_search(&self, query_images: &[DecodedImage], request: &SearchRequest) -> Result<SearchResults> {
        request.validate()?;
        let start = Instant::now();

        let prepared: Vec<DecodedImage> = match self.config.preprocess_size {
            Some(size) => query_images.iter().map(|image| image.preprocessed(size)).collect(),
            None => query_images.to_vec(),
        };
        let query = QueryContext::build(&prepared, self.components.embedder.as_ref(), &self.config.histogram)?;

        let neighbors = self
            .components
            .index
            .query_nearest(&query.aggregate().data, request.fanout)?;

        let resolver = CandidateResolver::new(
            &self.components.mapping,
            self.components.metadata.as_ref(),
            self.components.images.as_ref(),
            self.config.preprocess_size,
        );
        let resolution = resolver.resolve(&neighbors)?;

        let mut top_k = TopK::new(request.top_k);
        let options = RerankOptions {
            enable_pruning: request.enable_pruning,
            cancel: request.cancel.as_ref(),
        };
        let scorer = &self.scorer;
        let outcome = self.scheduler.run(
            &resolution.candidates,
            self.scorer.weights(),
            &mut top_k,
            &options,
            |candidate| {
                let image = resolver.decode(candidate)?;
                let scores = scorer.score(candidate.clip_sim, &image, &query)?;
                Ok(ResultEntry::new(candidate.id.clone(), candidate.path().clone(), scores))
            },
        )?;

        let entries = top_k.drain();
        let stats = SearchStats {
            query_images: query.len(),
            dropped_query_images: query.dropped(),
            neighbors: neighbors.len(),
            resolved: resolution.candidates.len(),
            lookup_misses: resolution.misses,
            scored: outcome.scored,
            dropped: outcome.dropped,
            chunks: outcome.chunks,
            pruned: outcome.pruned,
            skipped: outcome.skipped,
            elapsed_ms: start.elapsed().as_secs_f64() * 1000.0,
        };
        info!(
            "Search returned {} results: {} neighbors, {} resolved, {} scored, {} dropped{} in {:.2}ms",
            entries.len(),
            stats.neighbors,
            stats.resolved,
            stats.scored,
            stats.dropped,
            if stats.pruned { ", pruned" } else { "" },
            stats.elapsed_ms
        );

        Ok(SearchResults { entries, stats })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::MemoryImageSource;
    use crate::index::{CandidateId, FlatIndexBuilder};
    use crate::metadata::ImageMetadata;
    use image::{Rgb, RgbImage};
    use std::path::PathBuf;

    fn tile(r: u8, g: u8, b: u8) -> DecodedImage {
        DecodedImage::new(RgbImage::from_fn(32, 32, |x, y| {
            if (x / 8 + y / 8) % 2 == 0 {
                Rgb([r, g, b])
            } else {
                Rgb([r / 2, g / 2, b / 2])
            }
        }))
    }

    fn engine_over(images: &[DecodedImage], config: SearchConfig) -> ImageSearchEngine {
        let embedder = HistogramEmbedder::default();
        let source = MemoryImageSource::new();
        let mut builder = FlatIndexBuilder::new(embedder.dimension());
        let mut mapping = SlotMapping::new();
        let mut metadata = MemoryMetadataStore::new();

        for (i, image) in images.iter().enumerate() {
            let path = PathBuf::from(format!("/img/{i}.png"));
            let id = CandidateId::new(format!("id-{i}"));
            let slot = builder.add_item(&embedder.embed(image).unwrap().data).unwrap();
            mapping.insert(slot, id.clone());
            metadata.insert(
                id,
                ImageMetadata {
                    path: path.clone(),
                    width: image.width(),
                    height: image.height(),
                },
            );
            source.insert(path, image.clone());
        }

        ImageSearchEngine::new(
            config,
            SearchComponents {
                index: Arc::new(builder.build().unwrap()),
                mapping: Arc::new(mapping),
                metadata: Arc::new(metadata),
                images: Arc::new(source),
                embedder: Arc::new(embedder),
            },
        )
        .unwrap()
    }

    fn small_config() -> SearchConfig {
        let mut config = SearchConfig::default();
        config.preprocess_size = None;
        config.scheduler.num_threads = Some(2);
        config
    }

    fn corpus() -> Vec<DecodedImage> {
        vec![
            tile(200, 30, 30),
            tile(30, 200, 30),
            tile(30, 30, 200),
            tile(200, 200, 30),
            tile(120, 120, 120),
        ]
    }

    #[test]
    fn test_exact_duplicate_ranks_first() {
        let engine = engine_over(&corpus(), small_config());
        let results = engine.search(&[tile(30, 200, 30)], 5, 3).unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results.entries[0].path, PathBuf::from("/img/1.png"));
        assert!(results.entries[0].combined() > 0.999);
        assert_eq!(results.entries[0].scores.color_sim, 1.0);
        assert_eq!(results.entries[0].scores.phash_sim, 1.0);
        for pair in results.entries.windows(2) {
            assert!(pair[0].combined() >= pair[1].combined());
        }
    }

    #[test]
    fn test_results_bounded_by_resolvable_candidates() {
        let engine = engine_over(&corpus(), small_config());
        let results = engine.search(&[tile(200, 30, 30)], 3, 10).unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results.stats.neighbors, 3);
    }

    #[test]
    fn test_empty_query_is_input_error() {
        let engine = engine_over(&corpus(), small_config());
        assert!(matches!(engine.search(&[], 5, 3), Err(PictorError::Input(_))));
        assert_eq!(engine.stats().failed_searches, 1);
    }

    #[test]
    fn test_empty_image_query_is_input_error() {
        let mut config = small_config();
        config.preprocess_size = Some(16);
        let engine = engine_over(&corpus(), config);
        let empty = DecodedImage::new(RgbImage::new(0, 0));

        assert!(matches!(
            engine.search(&[empty.clone()], 5, 3),
            Err(PictorError::Input(_))
        ));

        let results = engine.search(&[empty, tile(30, 200, 30)], 5, 3).unwrap();
        assert_eq!(results.stats.query_images, 1);
        assert_eq!(results.stats.dropped_query_images, 1);
    }

    #[test]
    fn test_empty_candidate_image_is_dropped() {
        let engine = engine_over(&corpus(), small_config());
        let source = MemoryImageSource::new();
        for (i, image) in corpus().into_iter().enumerate() {
            source.insert(format!("/img/{i}.png"), image);
        }
        source.insert("/img/3.png", DecodedImage::new(RgbImage::new(0, 0)));
        let components = SearchComponents {
            images: Arc::new(source),
            ..engine.components.clone()
        };
        let engine = ImageSearchEngine::new(small_config(), components).unwrap();

        let results = engine.search(&[tile(200, 200, 30)], 5, 5).unwrap();
        assert_eq!(results.len(), 4);
        assert_eq!(results.stats.dropped, 1);
        assert!(results.entries.iter().all(|e| e.path != PathBuf::from("/img/3.png")));
    }

    #[test]
    fn test_zero_top_k_is_rejected() {
        let engine = engine_over(&corpus(), small_config());
        assert!(matches!(
            engine.search(&[tile(1, 2, 3)], 5, 0),
            Err(PictorError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_dimension_mismatch_is_rejected() {
        let components = SearchComponents {
            index: Arc::new(FlatAngularIndex::from_vectors(3, vec![1.0, 0.0, 0.0]).unwrap()),
            mapping: Arc::new(SlotMapping::new()),
            metadata: Arc::new(MemoryMetadataStore::new()),
            images: Arc::new(MemoryImageSource::new()),
            embedder: Arc::new(HistogramEmbedder::default()),
        };
        assert!(matches!(
            ImageSearchEngine::new(small_config(), components),
            Err(PictorError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_cancelled_search() {
        let engine = engine_over(&corpus(), small_config());
        let token = CancellationToken::new();
        token.cancel();
        let request = SearchRequest::new(5, 3).with_cancellation(token);
        assert!(matches!(
            engine.search_with(&[tile(30, 30, 200)], &request),
            Err(PictorError::OperationCancelled(_))
        ));
    }

    #[test]
    fn test_search_paths_skips_unreadable() {
        let engine = engine_over(&corpus(), small_config());
        let request = SearchRequest::new(5, 2);

        let results = engine
            .search_paths(&["/missing.png", "/img/2.png"], &request)
            .unwrap();
        assert_eq!(results.entries[0].path, PathBuf::from("/img/2.png"));

        assert!(matches!(
            engine.search_paths(&["/missing.png"], &request),
            Err(PictorError::Input(_))
        ));
    }

    #[test]
    fn test_stats_accumulate() {
        let engine = engine_over(&corpus(), small_config());
        engine.search(&[tile(200, 30, 30)], 5, 2).unwrap();
        engine.search(&[tile(30, 30, 200)], 5, 2).unwrap();

        let stats = engine.stats();
        assert_eq!(stats.total_searches, 2);
        assert_eq!(stats.failed_searches, 0);
        assert!(stats.candidates_scored >= 4);
    }
}
