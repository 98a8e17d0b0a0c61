use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use grid_rag::dataset::reduce::{reduce, target_size};
use grid_rag::search::flat::FlatIndex;

/// Shrink a dataset to its highest-priority records, keeping the record
/// file and the vector index aligned.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(long, default_value = "reduced_electrical_grid_metadata.json")]
    input_metadata: PathBuf,

    #[arg(long, default_value = "reduced_electrical_grid_index.faiss")]
    input_index: PathBuf,

    #[arg(long, default_value = "ultra_reduced_electrical_grid_metadata.json")]
    output_metadata: PathBuf,

    #[arg(long, default_value = "ultra_reduced_electrical_grid_index.faiss")]
    output_index: PathBuf,

    /// Fraction of records to keep, in (0, 1]
    #[arg(long, default_value_t = 0.4)]
    reduction_factor: f64,

    /// Seed for the score jitter; the same seed gives the same selection
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    tracing::info!(
        "Creating reduced dataset ({:.0}% of current dataset)",
        args.reduction_factor * 100.0
    );

    let file = std::fs::File::open(&args.input_metadata)
        .with_context(|| format!("Failed to open {}", args.input_metadata.display()))?;
    let records: Vec<serde_json::Value> = serde_json::from_reader(std::io::BufReader::new(file))
        .with_context(|| format!("Failed to parse {}", args.input_metadata.display()))?;
    let original_len = records.len();
    tracing::info!("Current dataset: {original_len} records");
    tracing::info!(
        "Target size: {} records",
        target_size(original_len, args.reduction_factor)
    );

    // Without a readable index only the records are reduced
    let index = match FlatIndex::read_from_path(&args.input_index) {
        Ok(index) => {
            tracing::info!("Current index vectors: {}", index.len());
            Some(index)
        }
        Err(e) => {
            tracing::warn!(
                "Skipping index reduction, cannot read {}: {e}",
                args.input_index.display()
            );
            None
        }
    };

    let mut rng = StdRng::seed_from_u64(args.seed);
    let reduction = reduce(records, index.as_ref(), args.reduction_factor, &mut rng)?;
    if reduction.dropped_without_vector > 0 {
        tracing::warn!(
            "Dropped {} selected records that have no vector in the index",
            reduction.dropped_without_vector
        );
    }
    tracing::info!("Selected {} highest priority records", reduction.records.len());

    let json = serde_json::to_string_pretty(&reduction.records)?;
    std::fs::write(&args.output_metadata, json)
        .with_context(|| format!("Failed to write {}", args.output_metadata.display()))?;
    tracing::info!("Saved reduced metadata: {}", args.output_metadata.display());

    match &reduction.index {
        Some(new_index) if !new_index.is_empty() => {
            new_index
                .write_to_path(&args.output_index)
                .with_context(|| format!("Failed to write {}", args.output_index.display()))?;
            tracing::info!(
                "Saved reduced index with {} vectors: {}",
                new_index.len(),
                args.output_index.display()
            );
        }
        Some(_) => tracing::warn!("No vectors to save"),
        None => {}
    }

    report_size("metadata", &args.output_metadata);
    if reduction.index.is_some() {
        report_size("index", &args.output_index);
    }
    tracing::info!(
        "Reduction: {original_len} -> {} records",
        reduction.records.len()
    );
    Ok(())
}

fn report_size(what: &str, path: &Path) {
    if let Ok(meta) = std::fs::metadata(path) {
        tracing::info!(
            "Reduced {what} size: {:.1} MB",
            meta.len() as f64 / (1024.0 * 1024.0)
        );
    }
}
