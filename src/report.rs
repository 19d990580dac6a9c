//! Output artifacts and console summaries

use std::fs::{self, File};
use std::path::Path;

use polars::prelude::*;
use tracing::info;

use crate::aggregate::{AgeGroupCount, CategorySummary, CustomerSummary, ProductTotal};
use crate::data::CUSTOMER_COL;
use crate::error::Error;
use crate::model::RfmTable;

/// Create `dir` and its parents if missing
pub fn ensure_dir(dir: &Path) -> crate::Result<()> {
    if dir.as_os_str().is_empty() {
        return Ok(());
    }
    fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))
}

/// Write `Customer ID,frequency,monetary,segment`, one row per customer, overwriting `path`
pub fn write_rfm_csv(table: &RfmTable, path: &Path) -> crate::Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }

    let ids: Vec<&str> = table.records.iter().map(|r| r.customer_id.as_str()).collect();
    let frequency: Vec<u64> = table.records.iter().map(|r| r.frequency).collect();
    let monetary: Vec<f64> = table.records.iter().map(|r| r.monetary).collect();
    let segment: Vec<Option<u64>> = table
        .records
        .iter()
        .map(|r| r.segment.map(|s| s as u64))
        .collect();

    let mut df = df!(
        CUSTOMER_COL => ids,
        "frequency" => frequency,
        "monetary" => monetary,
        "segment" => segment
    )?;

    let mut file = File::create(path).map_err(|e| Error::io(path, e))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut df)?;

    info!(customers = table.len(), "saved RFM segments to {}", path.display());
    Ok(())
}

pub fn print_top_products(products: &[ProductTotal]) {
    println!("\nTop products by total spent:");
    for p in products {
        println!("  {:<24} {:>12.2}", p.product, p.total);
    }
}

pub fn print_category_summary(categories: &[CategorySummary]) {
    println!("\nCategory summary (sum, count, mean):");
    println!("  {:<16} | {:>12} | {:>6} | {:>10}", "Category", "Sum", "Count", "Mean");
    println!("  {:-<16}-|-{:->12}-|-{:->6}-|-{:->10}", "", "", "", "");
    for c in categories {
        println!(
            "  {:<16} | {:>12.2} | {:>6} | {:>10}",
            c.category,
            c.sum,
            c.count,
            format_optional(c.mean)
        );
    }
}

pub fn print_customer_summary(customers: &[CustomerSummary]) {
    println!("\nPurchase frequency per customer:");
    println!(
        "  {:<12} | {:>12} | {:>12} | {:>9}",
        "Customer ID", "Total Spent", "Avg Purchase", "Purchases"
    );
    println!("  {:-<12}-|-{:->12}-|-{:->12}-|-{:->9}", "", "", "", "");
    for c in customers {
        println!(
            "  {:<12} | {:>12.2} | {:>12} | {:>9}",
            c.customer_id,
            c.total_spent,
            format_optional(c.avg_purchase),
            c.purchases
        );
    }
}

pub fn print_age_groups(groups: &[AgeGroupCount]) {
    println!("\nCustomers by age group:");
    for g in groups {
        println!("  {:<6} {:>8}", g.group, g.count);
    }
}

/// Print the first `n` rows of the RFM table
pub fn print_rfm_head(table: &RfmTable, n: usize) {
    println!(
        "\n  {:<12} | {:>9} | {:>12} | {:>7}",
        CUSTOMER_COL, "frequency", "monetary", "segment"
    );
    for r in table.records.iter().take(n) {
        let segment = r.segment.map(|s| s.to_string()).unwrap_or_default();
        println!(
            "  {:<12} | {:>9} | {:>12.2} | {:>7}",
            r.customer_id, r.frequency, r.monetary, segment
        );
    }
}

pub fn print_segment_sizes(table: &RfmTable, n_segments: usize) {
    println!("\n=== Segment Sizes ===");
    let total = table.len().max(1) as f64;
    for (i, size) in table.segment_sizes(n_segments).into_iter().enumerate() {
        let percentage = size as f64 / total * 100.0;
        println!("Segment {}: {} customers ({:.1}%)", i, size, percentage);
    }
}

fn format_optional(value: Option<f64>) -> String {
    value.map(|v| format!("{:.2}", v)).unwrap_or_else(|| "-".to_string())
}
