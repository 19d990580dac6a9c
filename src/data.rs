//! Transaction loading, cleaning and column capability detection using Polars

use std::fmt;
use std::fs::File;
use std::path::Path;

use polars::prelude::*;
use tracing::{debug, info};

use crate::error::Error;

pub const AMOUNT_COL: &str = "Purchase Amount (USD)";
pub const AGE_COL: &str = "Age";
pub const PRODUCT_COL: &str = "Item Purchased";
pub const CATEGORY_COL: &str = "Category";
pub const CUSTOMER_COL: &str = "Customer ID";

/// Numeric purchase amount derived from [`AMOUNT_COL`]
pub const TOTAL_COL: &str = "Total";
/// Age bucket label derived from [`AGE_COL`]
pub const AGE_GROUP_COL: &str = "age_group";

const AGE_BOUNDS: [f64; 6] = [0.0, 18.0, 25.0, 35.0, 50.0, 200.0];

/// Ordinal age bucket; each covers the half-open interval `[low, high)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AgeGroup {
    Under18,
    From18To24,
    From25To34,
    From35To49,
    From50,
}

impl AgeGroup {
    pub const ALL: [AgeGroup; 5] = [
        AgeGroup::Under18,
        AgeGroup::From18To24,
        AgeGroup::From25To34,
        AgeGroup::From35To49,
        AgeGroup::From50,
    ];

    /// Bucket for `age`, or `None` outside `[0, 200)`
    pub fn from_age(age: f64) -> Option<Self> {
        Self::ALL
            .iter()
            .zip(AGE_BOUNDS.windows(2))
            .find(|(_, bounds)| age >= bounds[0] && age < bounds[1])
            .map(|(group, _)| *group)
    }

    pub fn label(self) -> &'static str {
        match self {
            AgeGroup::Under18 => "<18",
            AgeGroup::From18To24 => "18-24",
            AgeGroup::From25To34 => "25-34",
            AgeGroup::From35To49 => "35-49",
            AgeGroup::From50 => "50+",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|group| group.label() == label)
    }
}

impl fmt::Display for AgeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

/// Optional report sections that the cleaned dataset has the columns for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReportSections {
    pub age_groups: bool,
    /// Top products table and the product chart
    pub top_products: bool,
    pub category_summary: bool,
    /// Customer summary table and RFM segmentation
    pub customers: bool,
}

impl ReportSections {
    pub fn detect(df: &DataFrame) -> Self {
        let has = |name: &str| df.column(name).is_ok();
        Self {
            age_groups: has(AGE_GROUP_COL),
            top_products: has(PRODUCT_COL),
            category_summary: has(CATEGORY_COL),
            customers: has(CUSTOMER_COL),
        }
    }

    /// Log one line per section that will be skipped
    pub fn log_skipped(&self) {
        let checks = [
            (self.age_groups, AGE_COL, "age groups"),
            (self.top_products, PRODUCT_COL, "top products and chart"),
            (self.category_summary, CATEGORY_COL, "category summary"),
            (self.customers, CUSTOMER_COL, "customer summary and segmentation"),
        ];
        for (available, column, section) in checks {
            if !available {
                info!("column '{}' not found, skipping {}", column, section);
            }
        }
    }
}

/// Load a CSV file with a header row into a DataFrame
///
/// # Arguments
/// * `path` - Path to the CSV file
///
/// # Returns
/// * The raw transactions, one row per input record
pub fn load_transactions(path: &Path) -> crate::Result<DataFrame> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;

    // Scan the whole file for the schema so a late non-numeric value does not fail the read
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .into_reader_with_file_handle(file)
        .finish()
        .map_err(|source| Error::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    info!(
        rows = df.height(),
        columns = df.width(),
        "loaded {}",
        path.display()
    );
    Ok(df)
}

/// Drop rows identical to an earlier row, keeping input order
pub fn deduplicate(df: &DataFrame) -> crate::Result<DataFrame> {
    Ok(df.unique_stable(None, UniqueKeepStrategy::First, None)?)
}

/// Add [`TOTAL_COL`] by parsing the purchase amount; unparseable values become null
///
/// `NaN` and infinite amounts parse as floats but are treated as missing too.
pub fn add_total(df: &mut DataFrame) -> crate::Result<()> {
    let parsed = df
        .column(AMOUNT_COL)
        .map_err(|_| Error::MissingColumn(AMOUNT_COL.to_string()))?
        .cast(&DataType::Float64)?;

    let totals: Vec<Option<f64>> = parsed
        .as_materialized_series()
        .f64()?
        .into_iter()
        .map(|amount| amount.filter(|v| v.is_finite()))
        .collect();

    df.with_column(Series::new(TOTAL_COL.into(), totals))?;
    Ok(())
}

/// Add [`AGE_GROUP_COL`] when an age column exists; returns whether it was added
pub fn add_age_group(df: &mut DataFrame) -> crate::Result<bool> {
    let Ok(age) = df.column(AGE_COL) else {
        return Ok(false);
    };

    let ages = age.cast(&DataType::Float64)?;
    let labels: Vec<Option<&'static str>> = ages
        .as_materialized_series()
        .f64()?
        .into_iter()
        .map(|age| age.and_then(AgeGroup::from_age).map(AgeGroup::label))
        .collect();

    df.with_column(Series::new(AGE_GROUP_COL.into(), labels))?;
    Ok(true)
}

/// Deduplicate and derive the `Total` and `age_group` columns
pub fn clean(df: &DataFrame) -> crate::Result<DataFrame> {
    let mut cleaned = deduplicate(df)?;
    debug!(
        removed = df.height() - cleaned.height(),
        "dropped duplicate rows"
    );

    add_total(&mut cleaned)?;
    let missing_totals = cleaned.column(TOTAL_COL)?.null_count();
    if missing_totals > 0 {
        debug!(missing_totals, "purchase amounts that did not parse as numbers");
    }

    if add_age_group(&mut cleaned)? {
        debug!("bucketed ages into {} groups", AgeGroup::ALL.len());
    }

    Ok(cleaned)
}
