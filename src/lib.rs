//! shopseg: retail transaction insights and customer segmentation
//!
//! Loads a shopping-trends CSV, summarizes spend by product, category and
//! customer, then segments customers with K-Means on standardized
//! frequency/monetary features.

pub mod aggregate;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod viz;

// Re-export public items for easier access
pub use cli::Args;
pub use config::{PipelineConfig, StrategyKind};
pub use data::{clean, load_transactions, AgeGroup, ReportSections};
pub use error::{Error, Result};
pub use model::{
    build_rfm, segment_customers, LinfaKMeans, LloydKMeans, PartitionStrategy, RfmRecord,
    RfmTable, StandardScaler,
};
pub use pipeline::{run, PipelineOutput};
