//! Pipeline configuration: input location, output directory and clustering parameters

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::Error;
use crate::model::{LinfaKMeans, LloydKMeans, PartitionStrategy};

pub const DEFAULT_OUTPUT_DIR: &str = "outputs";
pub const DEFAULT_CLUSTERS: usize = 4;
pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_MAX_ITERS: usize = 300;
pub const DEFAULT_TOLERANCE: f64 = 1e-4;
pub const DEFAULT_TOP_N: usize = 10;

/// Which partitioning algorithm segments customers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Built-in Lloyd iterations with k-means++ seeding
    #[default]
    Lloyd,
    /// linfa-clustering's K-Means
    Linfa,
}

/// Settings for a single pipeline run
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// CSV file with one row per purchase
    pub input: Option<PathBuf>,
    /// Directory receiving `rfm_segments.csv` and `top_products.png`
    pub output_dir: PathBuf,
    pub clusters: usize,
    pub seed: u64,
    pub max_iters: usize,
    /// Only used by the linfa strategy
    pub tolerance: f64,
    /// Rows kept in each summary table
    pub top_n: usize,
    pub strategy: StrategyKind,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input: None,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            clusters: DEFAULT_CLUSTERS,
            seed: DEFAULT_SEED,
            max_iters: DEFAULT_MAX_ITERS,
            tolerance: DEFAULT_TOLERANCE,
            top_n: DEFAULT_TOP_N,
            strategy: StrategyKind::default(),
        }
    }
}

impl PipelineConfig {
    /// Load settings from a TOML file; keys that are absent keep their defaults
    pub fn from_toml_file(path: &Path) -> crate::Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        toml::from_str(&text)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Check the settings are usable and return the input path
    pub fn validate(&self) -> crate::Result<&Path> {
        if self.clusters == 0 {
            return Err(Error::Config("clusters must be at least 1".into()));
        }
        if self.top_n == 0 {
            return Err(Error::Config("top_n must be at least 1".into()));
        }
        if self.max_iters == 0 {
            return Err(Error::Config("max_iters must be at least 1".into()));
        }
        self.input.as_deref().ok_or_else(|| {
            Error::Config(
                "no input file given (use --input or set `input` in the config file)".into(),
            )
        })
    }

    pub fn rfm_csv_path(&self) -> PathBuf {
        self.output_dir.join("rfm_segments.csv")
    }

    pub fn chart_path(&self) -> PathBuf {
        self.output_dir.join("top_products.png")
    }

    /// Build the partitioning strategy selected by this configuration
    pub fn strategy(&self) -> Box<dyn PartitionStrategy> {
        match self.strategy {
            StrategyKind::Lloyd => Box::new(LloydKMeans::new(self.seed, self.max_iters)),
            StrategyKind::Linfa => Box::new(LinfaKMeans::new(
                self.seed,
                self.max_iters,
                self.tolerance,
            )),
        }
    }
}
