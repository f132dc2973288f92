// src/bin/etl_once.rs
// Process a single page from the command line, without the HTTP service.

use anyhow::{bail, Result};
use clap::Parser;
use etlpipeline::{config::EtlConfig, logging, sink::TargetTable};
use tracing::{info, warn};

#[derive(Parser, Debug)]
struct Args {
    /// Destination project
    #[arg(long)]
    project: String,

    /// Destination dataset
    #[arg(long)]
    dataset: String,

    /// Destination table
    #[arg(long)]
    table: String,

    #[command(flatten)]
    config: EtlConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(&args.config.log_level);

    let pipeline = args.config.build_pipeline().await?;
    let target = TargetTable::new(args.project, args.dataset, args.table);

    let outcome = pipeline.process_next_page(&target).await?;
    for failure in &outcome.failures {
        warn!(row = failure.row, kind = ?failure.kind, "{}", failure.reason);
    }
    info!(
        "rows [{}, {}) of {}: {} inserted, {} skipped, {} failed; next start {}",
        outcome.start,
        outcome.end,
        outcome.total_rows,
        outcome.inserted,
        outcome.skipped,
        outcome.failed,
        outcome.next_start
    );
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    if outcome.failed > 0 {
        bail!("{} rows failed to load", outcome.failed);
    }
    Ok(())
}
