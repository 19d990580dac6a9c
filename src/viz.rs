//! Chart rendering using Plotters

use std::fmt::Display;
use std::path::Path;

use plotters::prelude::*;
use tracing::info;

use crate::aggregate::ProductTotal;
use crate::error::Error;
use crate::report::ensure_dir;

const CHART_SIZE: (u32, u32) = (800, 500);
const BAR_COLOR: RGBColor = RGBColor(31, 119, 180);

/// Order products for display: smallest total at the bottom, largest at the top
pub fn bars_for_display(products: &[ProductTotal]) -> Vec<&ProductTotal> {
    let mut bars: Vec<&ProductTotal> = products.iter().collect();
    bars.sort_by(|a, b| a.total.total_cmp(&b.total));
    bars
}

/// Render a horizontal bar chart of product spend to a PNG file
///
/// # Arguments
/// * `products` - Top products, in any order
/// * `output_path` - Path of the PNG to create or overwrite
pub fn create_top_products_chart(
    products: &[ProductTotal],
    output_path: &Path,
) -> crate::Result<()> {
    if products.is_empty() {
        return Err(Error::Chart("no products to plot".into()));
    }
    if let Some(parent) = output_path.parent() {
        ensure_dir(parent)?;
    }

    let bars = bars_for_display(products);
    let names: Vec<String> = bars.iter().map(|p| p.product.clone()).collect();
    let max_total = bars.iter().map(|p| p.total).fold(0.0_f64, f64::max);
    let x_max = if max_total > 0.0 { max_total * 1.05 } else { 1.0 };
    let n_bars = bars.len();

    let root = BitMapBackend::new(output_path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(chart_error)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Top Products by Total Spent", ("sans-serif", 24))
        .margin(15)
        .x_label_area_size(45)
        .y_label_area_size(110)
        .build_cartesian_2d(0f64..x_max, -0.5f64..(n_bars as f64 - 0.5))
        .map_err(chart_error)?;

    let label_for = |y: &f64| {
        let idx = y.round();
        if (y - idx).abs() < 1e-6 && idx >= 0.0 && (idx as usize) < names.len() {
            names[idx as usize].clone()
        } else {
            String::new()
        }
    };

    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_labels(n_bars)
        .y_label_formatter(&label_for)
        .x_desc("Total Spent (USD)")
        .axis_desc_style(("sans-serif", 15))
        .draw()
        .map_err(chart_error)?;

    chart
        .draw_series(bars.iter().enumerate().map(|(i, product)| {
            let y = i as f64;
            Rectangle::new([(0.0, y - 0.4), (product.total, y + 0.4)], BAR_COLOR.filled())
        }))
        .map_err(chart_error)?;

    root.present().map_err(chart_error)?;
    info!("product chart saved to {}", output_path.display());

    Ok(())
}

fn chart_error<E: Display>(e: E) -> Error {
    Error::Chart(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn products() -> Vec<ProductTotal> {
        vec![
            ProductTotal { product: "Blouse".into(), total: 120.0 },
            ProductTotal { product: "Jewelry".into(), total: 95.5 },
            ProductTotal { product: "Pants".into(), total: 101.0 },
        ]
    }

    #[test]
    fn test_bars_ascending() {
        let products = products();
        let bars = bars_for_display(&products);
        let names: Vec<&str> = bars.iter().map(|p| p.product.as_str()).collect();
        assert_eq!(names, vec!["Jewelry", "Pants", "Blouse"]);
    }

    #[test]
    fn test_create_top_products_chart() {
        let temp_dir = tempdir().unwrap();
        let output_path = temp_dir.path().join("nested").join("top_products.png");

        let result = create_top_products_chart(&products(), &output_path);
        assert!(result.is_ok());
        assert!(output_path.exists());
    }

    #[test]
    fn test_empty_products_rejected() {
        let temp_dir = tempdir().unwrap();
        let output_path = temp_dir.path().join("top_products.png");

        assert!(create_top_products_chart(&[], &output_path).is_err());
        assert!(!output_path.exists());
    }
}
