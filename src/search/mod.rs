//! Fused multi-image search.
//!
//! A search flows through these stages:
//!
//! 1. [`query`]: embed the query images and precompute their fingerprints
//! 2. the vector index returns `fanout` neighbors of the mean embedding
//! 3. [`resolver`]: neighbors become candidates with paths
//! 4. [`scheduler`]: candidates are scored in parallel chunks by the
//!    [`scorer`] and collected into a bounded [`top_k`]
//!
//! [`engine`] ties the stages together behind [`ImageSearchEngine`].

pub mod config;
pub mod engine;
pub mod query;
pub mod resolver;
pub mod scheduler;
pub mod scorer;
pub mod top_k;
pub mod types;

pub use self::config::{FusionWeights, SchedulerConfig, SearchConfig};
pub use self::engine::{ImageSearchEngine, SearchComponents, SearchRequest};
pub use self::query::{QueryContext, QueryImage};
pub use self::resolver::{CandidateResolver, ResolvedCandidate, clip_similarity};
pub use self::scheduler::{CancellationToken, RerankOptions, RerankOutcome, RerankScheduler};
pub use self::scorer::FusionScorer;
pub use self::top_k::TopK;
pub use self::types::{EngineStats, ResultEntry, ScoreVector, SearchResults, SearchStats};
