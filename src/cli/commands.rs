//! Command implementations for the Pictor CLI.

use std::sync::Arc;

use log::info;

use crate::cli::args::*;
use crate::cli::output::*;
use crate::embedding::HistogramEmbedder;
use crate::error::{PictorError, Result};
use crate::index::INDEX_FILE;
use crate::indexer::index_directory;
use crate::search::{ImageSearchEngine, SearchConfig, SearchRequest};

/// Execute a CLI command.
pub fn execute_command(args: PictorArgs) -> Result<()> {
    match &args.command {
        Command::Index(index_args) => build_index(index_args, &args),
        Command::Search(search_args) => search_images(search_args, &args),
    }
}

/// Build an index from an image directory.
fn build_index(args: &IndexArgs, cli_args: &PictorArgs) -> Result<()> {
    if args.out.join(INDEX_FILE).exists() && !args.force {
        return Err(PictorError::invalid_argument(format!(
            "{} already contains an index. Use --force to overwrite.",
            args.out.display()
        )));
    }

    let embedder = HistogramEmbedder::new(args.bins)?;
    let size = (args.size > 0).then_some(args.size);
    info!("Indexing {} into {}", args.image_dir.display(), args.out.display());

    let report = index_directory(&args.image_dir, &args.out, Arc::new(embedder), size)?;
    output_index_report(
        &IndexOutput {
            index_dir: &args.out,
            report: &report,
        },
        cli_args,
    )
}

/// Search an index with one or more query images.
fn search_images(args: &SearchArgs, cli_args: &PictorArgs) -> Result<()> {
    let config = search_config(args)?;
    let embedder = HistogramEmbedder::new(args.bins)?;
    let request = SearchRequest::from(&config);
    let engine = ImageSearchEngine::open_with_embedder(&args.index_dir, config, Arc::new(embedder))?;
    let results = engine.search_paths(&args.images, &request)?;

    output_search_results(&results, cli_args)
}

/// Load the configuration file, if any, and apply command line overrides.
fn search_config(args: &SearchArgs) -> Result<SearchConfig> {
    let mut config = match &args.config {
        Some(path) => SearchConfig::from_json_file(path)?,
        None => SearchConfig::default(),
    };
    if let Some(fanout) = args.fanout {
        config.fanout = fanout;
    }
    if let Some(top_k) = args.top_k {
        config.top_k = top_k;
    }
    if args.threads.is_some() {
        config.scheduler.num_threads = args.threads;
    }
    if args.no_prune {
        config.scheduler.enable_pruning = false;
    }
    if let Some(size) = args.size {
        config.preprocess_size = (size > 0).then_some(size);
    }
    config.validate()?;
    Ok(config)
}
