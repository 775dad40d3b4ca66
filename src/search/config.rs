//! Configuration for fused image search.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PictorError, Result};
use crate::imaging::DEFAULT_PREPROCESS_SIZE;
use crate::similarity::histogram::HistogramConfig;

/// Allowed deviation of the weight sum from 1.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// Fixed convex weights combining the three similarity signals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionWeights {
    /// Weight of the embedding similarity.
    pub clip: f64,
    /// Weight of the color histogram similarity.
    pub color: f64,
    /// Weight of the perceptual hash similarity.
    pub phash: f64,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            clip: 0.5,
            color: 0.3,
            phash: 0.2,
        }
    }
}

impl FusionWeights {
    pub fn new(clip: f64, color: f64, phash: f64) -> Self {
        Self { clip, color, phash }
    }

    /// Sum of the three weights.
    pub fn sum(&self) -> f64 {
        self.clip + self.color + self.phash
    }

    /// Weights must be finite, non-negative and sum to 1.
    pub fn validate(&self) -> Result<()> {
        let weights = [("clip", self.clip), ("color", self.color), ("phash", self.phash)];
        for (name, weight) in weights {
            if !weight.is_finite() || weight < 0.0 {
                return Err(PictorError::invalid_config(format!(
                    "{name} weight must be a non-negative number, got {weight}"
                )));
            }
        }
        if (self.sum() - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(PictorError::invalid_config(format!(
                "fusion weights must sum to 1.0, got {}",
                self.sum()
            )));
        }
        Ok(())
    }

    /// Weighted sum of the three similarities.
    pub fn combine(&self, clip_sim: f64, color_sim: f64, phash_sim: f64) -> f64 {
        self.clip * clip_sim + self.color * color_sim + self.phash * phash_sim
    }

    /// Best fused score reachable by a candidate with this `clip_sim`.
    pub fn upper_bound(&self, clip_sim: f64) -> f64 {
        self.combine(clip_sim, 1.0, 1.0)
    }
}

/// Settings for the parallel reranking scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Worker threads. If None, uses the number of CPU cores.
    pub num_threads: Option<usize>,
    /// Candidates per chunk = workers × multiplier.
    pub chunk_multiplier: usize,
    /// Stop dispatching chunks once no remaining candidate can enter the top-k.
    pub enable_pruning: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            num_threads: None,
            chunk_multiplier: 4,
            enable_pruning: true,
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.num_threads == Some(0) {
            return Err(PictorError::invalid_config("num_threads must be at least 1"));
        }
        if self.chunk_multiplier == 0 {
            return Err(PictorError::invalid_config("chunk_multiplier must be at least 1"));
        }
        Ok(())
    }

    /// Effective worker count.
    pub fn workers(&self) -> usize {
        self.num_threads.unwrap_or_else(num_cpus::get).max(1)
    }
}

/// Top-level search configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Fusion weights.
    pub weights: FusionWeights,
    /// Color histogram settings.
    pub histogram: HistogramConfig,
    /// Reranking scheduler settings.
    pub scheduler: SchedulerConfig,
    /// Nearest neighbors requested from the vector index.
    pub fanout: usize,
    /// Maximum number of results returned.
    pub top_k: usize,
    /// Edge of the square grid images are resized to. None keeps the size.
    pub preprocess_size: Option<u32>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            weights: FusionWeights::default(),
            histogram: HistogramConfig::default(),
            scheduler: SchedulerConfig::default(),
            fanout: 20,
            top_k: 5,
            preprocess_size: Some(DEFAULT_PREPROCESS_SIZE),
        }
    }
}

impl SearchConfig {
    /// Check every setting. Runs before any search.
    pub fn validate(&self) -> Result<()> {
        self.weights.validate()?;
        self.histogram.validate()?;
        self.scheduler.validate()?;
        if self.fanout == 0 {
            return Err(PictorError::invalid_config("fanout must be at least 1"));
        }
        if self.top_k == 0 {
            return Err(PictorError::invalid_config("top_k must be at least 1"));
        }
        if self.preprocess_size == Some(0) {
            return Err(PictorError::invalid_config("preprocess_size must be positive"));
        }
        Ok(())
    }

    /// Read and validate a JSON config file. Missing fields take defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let config: SearchConfig = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }
}
