//! shopseg: shopping-trends insights and customer segmentation CLI
//!
//! This is the main entrypoint that parses arguments, sets up logging and
//! runs the pipeline.

use anyhow::{Context, Result};
use clap::Parser;
use shopseg::Args;
use tracing::Level;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy(),
        )
        .with_target(false)
        .init();

    if args.verbose {
        println!("shopseg - Shopping Trends & Customer Segmentation");
        println!("=================================================\n");
    }

    let config = args.into_config().context("invalid configuration")?;
    let output = shopseg::run(&config)
        .with_context(|| format!("pipeline failed for {:?}", config.input))?;

    println!("\n=== Pipeline Complete ===");
    println!("Transactions analysed: {}", output.transactions);
    if let Some(path) = &output.rfm_csv {
        println!("RFM segments: {}", path.display());
    }
    if let Some(path) = &output.chart {
        println!("Product chart: {}", path.display());
    }

    Ok(())
}
