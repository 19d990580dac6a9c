//! Error types for the shopping-trends pipeline

use std::path::PathBuf;

use polars::prelude::PolarsError;
use thiserror::Error;

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

/// Failures the pipeline can report
#[derive(Error, Debug)]
pub enum Error {
    /// Input or output path could not be read or written
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Input file is not well-formed CSV
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: PolarsError,
    },

    /// A column the pipeline cannot run without is absent
    #[error("required column '{0}' not found in input")]
    MissingColumn(String),

    /// Fewer customers than requested segments
    #[error("cannot form {required} segments from {found} customers")]
    InsufficientData { required: usize, found: usize },

    #[error(transparent)]
    Polars(#[from] PolarsError),

    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),

    #[error("clustering failed: {0}")]
    Clustering(String),

    #[error("chart rendering failed: {0}")]
    Chart(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
