//! Load a data directory, evaluate every item and write the precalc artifact.
//!
//! Run with: `costgraph-precalc <data-dir> [--output <file>]`

use anyhow::{Context, Result};
use clap::Parser;
use costgraph_data::precalc::write_precalc;
use costgraph_data::{LoadOptions, load_cost_graph_with, precompute};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "costgraph-precalc")]
#[command(about = "Precompute item costs for a data directory", long_about = None)]
struct Cli {
    /// Directory holding the data sources
    data_dir: PathBuf,

    /// Output file; a `.bin` extension writes the binary encoding
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output = cli
        .output
        .unwrap_or_else(|| cli.data_dir.join("precalc.json"));

    // A stale artifact must not feed its own replacement.
    let options = LoadOptions { use_precalc: false };
    let mut data = load_cost_graph_with(&cli.data_dir, &options)
        .with_context(|| format!("loading {}", cli.data_dir.display()))?;

    let table = precompute(&mut data.graph, &data.techs)?;
    write_precalc(&table, &output).with_context(|| format!("writing {}", output.display()))?;

    let stats = data.graph.stats();
    info!(
        output = %output.display(),
        items = table.len(),
        item_evaluations = stats.item_evaluations,
        recipe_evaluations = stats.recipe_evaluations,
        loops = stats.loops_registered,
        "precalc written"
    );
    Ok(())
}
