//! The end-to-end run: load, clean, summarize, segment, report

use std::path::PathBuf;
use std::time::Instant;

use tracing::{debug, info};

use crate::aggregate::{self, ProductTotal};
use crate::config::PipelineConfig;
use crate::data::{self, ReportSections};
use crate::model::{self, RfmTable};
use crate::{report, viz};

/// What a run produced
#[derive(Debug, Default)]
pub struct PipelineOutput {
    /// Rows left after deduplication
    pub transactions: usize,
    pub sections: ReportSections,
    pub top_products: Vec<ProductTotal>,
    pub rfm: Option<RfmTable>,
    pub rfm_csv: Option<PathBuf>,
    pub chart: Option<PathBuf>,
}

/// Run every stage in order; optional sections are skipped when their columns are absent
pub fn run(config: &PipelineConfig) -> crate::Result<PipelineOutput> {
    let input = config.validate()?;
    let start_time = Instant::now();

    let raw = data::load_transactions(input)?;
    println!("Loaded {} rows and {} columns", raw.height(), raw.width());

    let df = data::clean(&raw)?;
    let sections = ReportSections::detect(&df);
    sections.log_skipped();

    let mut output = PipelineOutput {
        transactions: df.height(),
        sections,
        ..Default::default()
    };

    debug!(
        total = aggregate::grand_total(&df)?,
        "total spend across cleaned transactions"
    );

    if sections.age_groups {
        report::print_age_groups(&aggregate::age_group_counts(&df)?);
    }

    if sections.top_products {
        output.top_products = aggregate::top_products(&df, config.top_n)?;
        report::print_top_products(&output.top_products);
    }

    if sections.category_summary {
        report::print_category_summary(&aggregate::category_summary(&df, config.top_n)?);
    }

    if sections.customers {
        report::print_customer_summary(&aggregate::customer_summary(&df, config.top_n)?);

        let mut rfm = model::build_rfm(&df)?;
        let strategy = config.strategy();
        info!(
            customers = rfm.len(),
            segments = config.clusters,
            strategy = strategy.name(),
            "segmenting customers"
        );
        model::segment_customers(&mut rfm, strategy.as_ref(), config.clusters)?;

        let rfm_path = config.rfm_csv_path();
        report::write_rfm_csv(&rfm, &rfm_path)?;
        println!("\nSaved RFM segments to {}", rfm_path.display());
        report::print_rfm_head(&rfm, 5);
        report::print_segment_sizes(&rfm, config.clusters);

        output.rfm_csv = Some(rfm_path);
        output.rfm = Some(rfm);
    }

    if !output.top_products.is_empty() {
        let chart_path = config.chart_path();
        viz::create_top_products_chart(&output.top_products, &chart_path)?;
        println!("Saved plot to {}", chart_path.display());
        output.chart = Some(chart_path);
    }

    info!(
        elapsed_secs = start_time.elapsed().as_secs_f64(),
        "pipeline complete"
    );
    Ok(output)
}
