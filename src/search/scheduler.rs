//! Chunked parallel reranking with early termination.
//!
//! Candidates arrive sorted by embedding similarity, best first. They are
//! scored on a long-lived worker pool one chunk at a time; every chunk is a
//! barrier after which the scored entries are offered to the [`TopK`] in
//! candidate order. Because fusion weights are convex and the color and hash
//! similarities never exceed 1, no candidate after position `i` can score
//! above `w_clip * clip_sim[i] + w_color + w_phash`. Once that bound is no
//! better than the current k-th score the remaining chunks are skipped.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context;
use log::{debug, warn};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::{PictorError, Result};
use crate::search::config::{FusionWeights, SchedulerConfig};
use crate::search::resolver::ResolvedCandidate;
use crate::search::top_k::TopK;
use crate::search::types::ResultEntry;

/// Cooperative cancellation flag, checked between chunks.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Per-run switches.
#[derive(Debug, Clone, Copy)]
pub struct RerankOptions<'a> {
    /// Allow early termination for this run. Also requires the scheduler's own setting.
    pub enable_pruning: bool,
    pub cancel: Option<&'a CancellationToken>,
}

impl Default for RerankOptions<'_> {
    fn default() -> Self {
        Self {
            enable_pruning: true,
            cancel: None,
        }
    }
}

/// What happened during one rerank.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RerankOutcome {
    /// Candidates that produced a score.
    pub scored: usize,
    /// Candidates whose scoring failed.
    pub dropped: usize,
    /// Chunks dispatched.
    pub chunks: usize,
    /// Whether the bound stopped the run early.
    pub pruned: bool,
    /// Candidates never dispatched because of pruning.
    pub skipped: usize,
    /// Whether pruning was switched off for this run.
    pub pruning_disabled: bool,
}

/// Scores candidates in parallel chunks on a dedicated thread pool.
#[derive(Debug)]
pub struct RerankScheduler {
    pool: ThreadPool,
    workers: usize,
    chunk_size: usize,
    enable_pruning: bool,
}

impl RerankScheduler {
    /// Build the worker pool. The pool lives as long as the scheduler.
    pub fn new(config: &SchedulerConfig) -> Result<Self> {
        config.validate()?;
        let workers = config.workers();
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("pictor-rerank-{i}"))
            .build()
            .with_context(|| format!("failed to create rerank pool with {workers} threads"))?;

        Ok(Self {
            pool,
            workers,
            chunk_size: workers.saturating_mul(config.chunk_multiplier),
            enable_pruning: config.enable_pruning,
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Candidates dispatched per chunk.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Score `candidates` and offer the results to `top_k`.
    ///
    /// A failing `score` call drops that candidate only. A
    /// [`PictorError::Scoring`] failure also switches pruning off, since the
    /// bound assumes every component lies in `[0, 1]`. Pruning is likewise
    /// off when `candidates` is not sorted by `clip_sim` descending.
    pub fn run<F>(
        &self,
        candidates: &[ResolvedCandidate],
        weights: &FusionWeights,
        top_k: &mut TopK,
        options: &RerankOptions<'_>,
        score: F,
    ) -> Result<RerankOutcome>
    where
        F: Fn(&ResolvedCandidate) -> Result<ResultEntry> + Sync,
    {
        let mut outcome = RerankOutcome::default();
        let mut pruning = self.enable_pruning && options.enable_pruning;
        if pruning && weights.validate().is_err() {
            warn!("Fusion weights are not convex; early termination disabled");
            pruning = false;
        }
        if pruning && !is_sorted_by_clip(candidates) {
            warn!("Candidates are not sorted by embedding similarity; early termination disabled");
            pruning = false;
        }

        let mut processed = 0;
        for chunk in candidates.chunks(self.chunk_size.max(1)) {
            if options.cancel.is_some_and(|token| token.is_cancelled()) {
                return Err(PictorError::cancelled(format!(
                    "rerank cancelled after {processed} of {} candidates",
                    candidates.len()
                )));
            }

            let results: Vec<Result<ResultEntry>> =
                self.pool.install(|| chunk.par_iter().map(&score).collect());
            outcome.chunks += 1;

            for (candidate, result) in chunk.iter().zip(results) {
                match result {
                    Ok(entry) => {
                        outcome.scored += 1;
                        top_k.offer(entry);
                    }
                    Err(e @ PictorError::Scoring(_)) => {
                        warn!("Dropping candidate {}: {e}", candidate.id);
                        outcome.dropped += 1;
                        pruning = false;
                    }
                    Err(e) if e.is_per_candidate() => {
                        debug!("Dropping candidate {}: {e}", candidate.id);
                        outcome.dropped += 1;
                    }
                    Err(e) => {
                        warn!("Dropping candidate {}: {e}", candidate.id);
                        outcome.dropped += 1;
                    }
                }
            }
            processed += chunk.len();

            if pruning && processed < candidates.len() && top_k.is_full() {
                if let Some(min) = top_k.min_score() {
                    let bound = weights.upper_bound(candidates[processed].clip_sim);
                    if bound <= min {
                        outcome.pruned = true;
                        outcome.skipped = candidates.len() - processed;
                        debug!(
                            "Early termination after {processed} candidates: bound {bound:.4} <= k-th score {min:.4}"
                        );
                        break;
                    }
                }
            }
        }

        outcome.pruning_disabled = !pruning && self.enable_pruning && options.enable_pruning;
        Ok(outcome)
    }
}

fn is_sorted_by_clip(candidates: &[ResolvedCandidate]) -> bool {
    candidates.windows(2).all(|w| w[0].clip_sim >= w[1].clip_sim)
}
