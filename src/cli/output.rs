//! Output formatting for CLI commands.

use std::path::Path;

use serde::Serialize;

use crate::cli::args::{OutputFormat, PictorArgs};
use crate::error::Result;
use crate::indexer::IndexingReport;
use crate::search::SearchResults;

/// Result structure for a finished indexing run.
#[derive(Debug, Serialize)]
pub struct IndexOutput<'a> {
    pub index_dir: &'a Path,
    #[serde(flatten)]
    pub report: &'a IndexingReport,
}

/// Print an indexing report.
pub fn output_index_report(output: &IndexOutput<'_>, args: &PictorArgs) -> Result<()> {
    match args.output_format {
        OutputFormat::Json => output_json(output, args),
        OutputFormat::Human => {
            let report = output.report;
            println!("Index written to {}", output.index_dir.display());
            println!("═══════════════");
            println!("Indexed images:  {}", report.indexed);
            println!("Skipped images:  {}", report.skipped);
            if report.duplicates > 0 {
                println!("Duplicate paths: {}", report.duplicates);
            }
            println!("Dimension:       {}", report.dimension);
            if args.verbosity() > 1 {
                println!("Elapsed:         {:.2}ms", report.elapsed_ms);
            }
            Ok(())
        }
    }
}

/// Print ranked search results.
pub fn output_search_results(results: &SearchResults, args: &PictorArgs) -> Result<()> {
    match args.output_format {
        OutputFormat::Json => output_json(results, args),
        OutputFormat::Human => {
            println!("Search Results:");
            println!("═══════════════");

            if results.is_empty() {
                println!("No similar images found.");
            }
            for (i, entry) in results.entries.iter().enumerate() {
                let scores = &entry.scores;
                println!();
                println!("Result {}: (Score: {:.4})", i + 1, scores.combined);
                println!("─────────────");
                println!("path:  {}", entry.path.display());
                println!(
                    "clip:  {:.4}  color: {:.4}  phash: {:.4}",
                    scores.clip_sim, scores.color_sim, scores.phash_sim
                );
            }

            if args.verbosity() > 1 {
                let stats = &results.stats;
                println!();
                println!(
                    "{} neighbors, {} resolved, {} scored, {} dropped, {} chunks{} in {:.2}ms",
                    stats.neighbors,
                    stats.resolved,
                    stats.scored,
                    stats.dropped,
                    stats.chunks,
                    if stats.pruned { " (pruned)" } else { "" },
                    stats.elapsed_ms
                );
            }
            Ok(())
        }
    }
}

/// Output as JSON.
fn output_json<T: Serialize>(result: &T, args: &PictorArgs) -> Result<()> {
    let json = if args.pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };
    println!("{json}");
    Ok(())
}
