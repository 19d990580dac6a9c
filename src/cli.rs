//! Command-line interface definitions and argument parsing

use std::path::PathBuf;

use clap::Parser;

use crate::config::{PipelineConfig, StrategyKind};

/// Shopping-trends insights and customer segmentation using K-Means on frequency/monetary data
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the input CSV file
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Directory for the RFM table and the product chart [default: outputs]
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Number of customer segments [default: 4]
    #[arg(short = 'k', long)]
    pub clusters: Option<usize>,

    /// Seed for centroid initialization [default: 42]
    #[arg(long)]
    pub seed: Option<u64>,

    /// Maximum iterations for K-Means [default: 300]
    #[arg(long)]
    pub max_iters: Option<usize>,

    /// Tolerance for K-Means convergence (linfa strategy) [default: 1e-4]
    #[arg(long)]
    pub tolerance: Option<f64>,

    /// Rows shown in each summary table [default: 10]
    #[arg(long)]
    pub top_n: Option<usize>,

    /// Clustering implementation [default: lloyd]
    #[arg(long, value_enum)]
    pub strategy: Option<StrategyKind>,

    /// TOML file providing any of the settings above; flags take precedence
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Merge the optional config file with the flags given on the command line
    pub fn into_config(self) -> crate::Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_toml_file(path)?,
            None => PipelineConfig::default(),
        };

        if let Some(input) = self.input {
            config.input = Some(input);
        }
        if let Some(dir) = self.output_dir {
            config.output_dir = dir;
        }
        if let Some(k) = self.clusters {
            config.clusters = k;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(max_iters) = self.max_iters {
            config.max_iters = max_iters;
        }
        if let Some(tolerance) = self.tolerance {
            config.tolerance = tolerance;
        }
        if let Some(top_n) = self.top_n {
            config.top_n = top_n;
        }
        if let Some(strategy) = self.strategy {
            config.strategy = strategy;
        }

        config.validate()?;
        Ok(config)
    }
}
