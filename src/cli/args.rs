//! Command line argument parsing for the Pictor CLI using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

/// Pictor - multi-signal image similarity search
#[derive(Parser, Debug, Clone)]
#[command(name = "pictor")]
#[command(about = "Find visually similar images by fusing embedding, color and perceptual-hash similarity")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct PictorArgs {
    /// Verbosity level (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "human")]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl PictorArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1, // Default to normal
                n => n + 1,
            }
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Build an index from a directory of images
    Index(IndexArgs),

    /// Find the images most similar to one or more query images
    Search(SearchArgs),
}

/// Arguments for building an index
#[derive(Parser, Debug, Clone)]
pub struct IndexArgs {
    /// Directory scanned recursively for .jpg, .jpeg and .png files
    #[arg(value_name = "IMAGE_DIR")]
    pub image_dir: PathBuf,

    /// Directory the index files are written to
    #[arg(short, long, value_name = "INDEX_DIR")]
    pub out: PathBuf,

    /// Color histogram bins per channel used by the embedder
    #[arg(long, default_value = "8")]
    pub bins: usize,

    /// Resize images to SIZE×SIZE before embedding (0 disables resizing)
    #[arg(long, default_value = "224")]
    pub size: u32,

    /// Overwrite an existing index
    #[arg(long)]
    pub force: bool,
}

/// Arguments for searching
#[derive(Parser, Debug, Clone)]
pub struct SearchArgs {
    /// Path to the index directory
    #[arg(value_name = "INDEX_DIR")]
    pub index_dir: PathBuf,

    /// Query images
    #[arg(value_name = "IMAGE", required = true)]
    pub images: Vec<PathBuf>,

    /// Number of nearest neighbors retrieved before reranking
    #[arg(long)]
    pub fanout: Option<usize>,

    /// Maximum number of results to return
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Search configuration file (JSON)
    #[arg(short, long, value_name = "CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Color histogram bins per channel used by the embedder
    #[arg(long, default_value = "8")]
    pub bins: usize,

    /// Resize query and candidate images to SIZE×SIZE (0 disables resizing).
    /// Must match the size the index was built with.
    #[arg(long)]
    pub size: Option<u32>,

    /// Score every retrieved candidate instead of stopping early
    #[arg(long)]
    pub no_prune: bool,

    /// Number of worker threads
    #[arg(short = 't', long)]
    pub threads: Option<usize>,
}

/// Output formats
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}
