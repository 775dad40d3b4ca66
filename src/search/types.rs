//! Result and statistics types produced by a search.

use std::path::PathBuf;

use serde::Serialize;

use crate::error::{PictorError, Result};
use crate::index::CandidateId;
use crate::search::config::FusionWeights;

/// The three similarity signals of one candidate and their fused score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreVector {
    pub clip_sim: f64,
    pub color_sim: f64,
    pub phash_sim: f64,
    pub combined: f64,
}

impl ScoreVector {
    /// Fuse three similarities. Each must be a finite value in `[0, 1]`.
    pub fn new(clip_sim: f64, color_sim: f64, phash_sim: f64, weights: &FusionWeights) -> Result<Self> {
        for (name, value) in [("clip", clip_sim), ("color", color_sim), ("phash", phash_sim)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(PictorError::scoring(format!(
                    "{name} similarity {value} outside [0, 1]"
                )));
            }
        }
        Ok(Self {
            clip_sim,
            color_sim,
            phash_sim,
            combined: weights.combine(clip_sim, color_sim, phash_sim),
        })
    }
}

/// One ranked result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultEntry {
    pub id: CandidateId,
    pub path: PathBuf,
    pub scores: ScoreVector,
}

impl ResultEntry {
    pub fn new(id: CandidateId, path: PathBuf, scores: ScoreVector) -> Self {
        Self { id, path, scores }
    }

    /// Fused score used for ranking.
    pub fn combined(&self) -> f64 {
        self.scores.combined
    }
}

/// Counters describing a single search.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchStats {
    /// Query images that contributed to the aggregate embedding.
    pub query_images: usize,
    /// Query images dropped before retrieval.
    pub dropped_query_images: usize,
    /// Neighbors returned by the vector index.
    pub neighbors: usize,
    /// Neighbors resolved to a path.
    pub resolved: usize,
    /// Neighbors without a mapping or metadata record.
    pub lookup_misses: usize,
    /// Candidates that received a fused score.
    pub scored: usize,
    /// Candidates dropped during scoring.
    pub dropped: usize,
    /// Chunks dispatched to the worker pool.
    pub chunks: usize,
    /// Whether the early-termination bound stopped the rerank.
    pub pruned: bool,
    /// Candidates never scored because of pruning.
    pub skipped: usize,
    pub elapsed_ms: f64,
}

/// Ranked output of a search.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchResults {
    /// Best first. Never longer than the requested top-k.
    pub entries: Vec<ResultEntry>,
    pub stats: SearchStats,
}

impl SearchResults {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn paths(&self) -> Vec<&PathBuf> {
        self.entries.iter().map(|e| &e.path).collect()
    }
}

/// Cumulative engine statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EngineStats {
    pub total_searches: u64,
    pub failed_searches: u64,
    pub pruned_searches: u64,
    pub candidates_scored: u64,
    pub candidates_dropped: u64,
    pub avg_search_time_ms: f64,
}

impl EngineStats {
    pub(crate) fn record_success(&mut self, stats: &SearchStats) {
        self.total_searches += 1;
        if stats.pruned {
            self.pruned_searches += 1;
        }
        self.candidates_scored += stats.scored as u64;
        self.candidates_dropped += stats.dropped as u64;
        let n = self.total_searches as f64;
        self.avg_search_time_ms = (self.avg_search_time_ms * (n - 1.0) + stats.elapsed_ms) / n;
    }

    pub(crate) fn record_failure(&mut self) {
        self.failed_searches += 1;
    }
}
