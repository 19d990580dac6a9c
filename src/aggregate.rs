//! Grouped summaries over the cleaned transactions
//!
//! Every summary drops rows whose group key is null before grouping, keeps
//! groups in first-appearance order and sorts stably, so ties keep their
//! input order.

use polars::prelude::*;

use crate::data::{AgeGroup, AGE_GROUP_COL, CATEGORY_COL, CUSTOMER_COL, PRODUCT_COL, TOTAL_COL};

/// Total spend for one product
#[derive(Debug, Clone, PartialEq)]
pub struct ProductTotal {
    pub product: String,
    pub total: f64,
}

/// Spend statistics for one category
#[derive(Debug, Clone, PartialEq)]
pub struct CategorySummary {
    pub category: String,
    pub sum: f64,
    /// Purchases with a numeric amount
    pub count: u64,
    /// `None` when no purchase in the category has a numeric amount
    pub mean: Option<f64>,
}

/// Purchase statistics for one customer
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerSummary {
    pub customer_id: String,
    pub total_spent: f64,
    pub avg_purchase: Option<f64>,
    pub purchases: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgeGroupCount {
    pub group: AgeGroup,
    pub count: u64,
}

/// Top `top_n` products by summed `Total`, highest first
pub fn top_products(df: &DataFrame, top_n: usize) -> crate::Result<Vec<ProductTotal>> {
    let out = ranked(
        df,
        PRODUCT_COL,
        vec![col(TOTAL_COL).sum().alias("total")],
        "total",
        top_n,
    )?;

    let products = str_values(&out, PRODUCT_COL)?;
    let totals = f64_values(&out, "total")?;

    Ok(products
        .into_iter()
        .zip(totals)
        .map(|(product, total)| ProductTotal {
            product,
            total: total.unwrap_or(0.0),
        })
        .collect())
}

/// Top `top_n` categories by summed `Total`, with count and mean
pub fn category_summary(df: &DataFrame, top_n: usize) -> crate::Result<Vec<CategorySummary>> {
    let out = ranked(
        df,
        CATEGORY_COL,
        vec![
            col(TOTAL_COL).sum().alias("sum"),
            col(TOTAL_COL).count().alias("count"),
            col(TOTAL_COL).mean().alias("mean"),
        ],
        "sum",
        top_n,
    )?;

    let categories = str_values(&out, CATEGORY_COL)?;
    let sums = f64_values(&out, "sum")?;
    let counts = u64_values(&out, "count")?;
    let means = f64_values(&out, "mean")?;

    Ok(categories
        .into_iter()
        .zip(sums)
        .zip(counts)
        .zip(means)
        .map(|(((category, sum), count), mean)| CategorySummary {
            category,
            sum: sum.unwrap_or(0.0),
            count: count.unwrap_or(0),
            mean,
        })
        .collect())
}

/// Top `top_n` customers by number of purchases
pub fn customer_summary(df: &DataFrame, top_n: usize) -> crate::Result<Vec<CustomerSummary>> {
    let out = ranked(
        df,
        CUSTOMER_COL,
        vec![
            col(TOTAL_COL).sum().alias("total_spent"),
            col(TOTAL_COL).mean().alias("avg_purchase"),
            col(TOTAL_COL).count().alias("purchases"),
        ],
        "purchases",
        top_n,
    )?;

    let customers = str_values(&out, CUSTOMER_COL)?;
    let spent = f64_values(&out, "total_spent")?;
    let averages = f64_values(&out, "avg_purchase")?;
    let purchases = u64_values(&out, "purchases")?;

    Ok(customers
        .into_iter()
        .zip(spent)
        .zip(averages)
        .zip(purchases)
        .map(|(((customer_id, total_spent), avg_purchase), purchases)| CustomerSummary {
            customer_id,
            total_spent: total_spent.unwrap_or(0.0),
            avg_purchase,
            purchases: purchases.unwrap_or(0),
        })
        .collect())
}

/// Rows per age bucket, youngest first; unassigned ages are not counted
pub fn age_group_counts(df: &DataFrame) -> crate::Result<Vec<AgeGroupCount>> {
    let out = df
        .clone()
        .lazy()
        .filter(col(AGE_GROUP_COL).is_not_null())
        .group_by_stable([col(AGE_GROUP_COL)])
        .agg([len().alias("count")])
        .collect()?;

    let labels = str_values(&out, AGE_GROUP_COL)?;
    let counts = u64_values(&out, "count")?;

    let mut groups: Vec<AgeGroupCount> = labels
        .iter()
        .zip(counts)
        .filter_map(|(label, count)| {
            AgeGroup::from_label(label).map(|group| AgeGroupCount {
                group,
                count: count.unwrap_or(0),
            })
        })
        .collect();
    groups.sort_by_key(|g| g.group);
    Ok(groups)
}

/// Sum of `Total` over all rows; missing amounts count as zero
pub fn grand_total(df: &DataFrame) -> crate::Result<f64> {
    Ok(df
        .column(TOTAL_COL)?
        .as_materialized_series()
        .f64()?
        .sum()
        .unwrap_or(0.0))
}

/// Group by `key` (as strings), aggregate, then keep the `top_n` largest by `sort_by`
fn ranked(
    df: &DataFrame,
    key: &str,
    aggs: Vec<Expr>,
    sort_by: &str,
    top_n: usize,
) -> crate::Result<DataFrame> {
    let out = df
        .clone()
        .lazy()
        .filter(col(key).is_not_null())
        .with_column(col(key).cast(DataType::String))
        .group_by_stable([col(key)])
        .agg(aggs)
        .sort(
            [sort_by],
            SortMultipleOptions::default()
                .with_order_descending(true)
                .with_maintain_order(true),
        )
        .limit(IdxSize::try_from(top_n).unwrap_or(IdxSize::MAX))
        .collect()?;
    Ok(out)
}

pub(crate) fn str_values(df: &DataFrame, name: &str) -> crate::Result<Vec<String>> {
    let column = df.column(name)?.cast(&DataType::String)?;
    let values = column
        .as_materialized_series()
        .str()?
        .into_iter()
        .map(|v| v.unwrap_or_default().to_string())
        .collect();
    Ok(values)
}

pub(crate) fn f64_values(df: &DataFrame, name: &str) -> crate::Result<Vec<Option<f64>>> {
    let column = df.column(name)?.cast(&DataType::Float64)?;
    let values = column.as_materialized_series().f64()?.into_iter().collect();
    Ok(values)
}

pub(crate) fn u64_values(df: &DataFrame, name: &str) -> crate::Result<Vec<Option<u64>>> {
    let column = df.column(name)?.cast(&DataType::UInt64)?;
    let values = column.as_materialized_series().u64()?.into_iter().collect();
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> DataFrame {
        df!(
            CUSTOMER_COL => [1i64, 2, 1, 3, 2, 1],
            PRODUCT_COL => ["Hat", "Shoes", "Scarf", "Hat", "Shoes", "Belt"],
            CATEGORY_COL => [
                Some("Accessories"),
                Some("Footwear"),
                Some("Accessories"),
                Some("Accessories"),
                Some("Footwear"),
                None
            ],
            TOTAL_COL => [Some(10.0), Some(40.0), None, Some(15.0), Some(20.0), Some(5.0)],
            AGE_GROUP_COL => [Some("50+"), Some("<18"), Some("50+"), None, Some("<18"), Some("50+")]
        )
        .unwrap()
    }

    #[test]
    fn test_top_products() {
        let products = top_products(&sample_frame(), 10).unwrap();
        assert_eq!(
            products,
            vec![
                ProductTotal { product: "Shoes".into(), total: 60.0 },
                ProductTotal { product: "Hat".into(), total: 25.0 },
                ProductTotal { product: "Belt".into(), total: 5.0 },
                ProductTotal { product: "Scarf".into(), total: 0.0 },
            ]
        );

        // A limit beyond the index range keeps every group
        let all = top_products(&sample_frame(), usize::MAX).unwrap();
        assert_eq!(all.len(), 4);

        let top_two = top_products(&sample_frame(), 2).unwrap();
        assert_eq!(top_two.len(), 2);
        assert_eq!(top_two[1].product, "Hat");
    }

    #[test]
    fn test_category_summary_drops_null_keys() {
        let categories = category_summary(&sample_frame(), 10).unwrap();
        assert_eq!(categories.len(), 2);

        assert_eq!(categories[0].category, "Footwear");
        assert_eq!(categories[0].sum, 60.0);
        assert_eq!(categories[0].count, 2);
        assert_eq!(categories[0].mean, Some(30.0));

        // The unparsed amount is excluded from count and mean
        assert_eq!(categories[1].category, "Accessories");
        assert_eq!(categories[1].sum, 25.0);
        assert_eq!(categories[1].count, 2);
        assert_eq!(categories[1].mean, Some(12.5));
    }

    #[test]
    fn test_category_sums_match_grand_total() {
        let df = df!(
            CATEGORY_COL => ["A", "B", "C", "A", "B"],
            TOTAL_COL => [Some(1.5), Some(2.0), None, Some(4.25), Some(3.0)]
        )
        .unwrap();

        let summed: f64 = category_summary(&df, 100).unwrap().iter().map(|c| c.sum).sum();
        assert_eq!(summed, grand_total(&df).unwrap());
        assert_eq!(summed, 10.75);
    }

    #[test]
    fn test_customer_summary_ties_keep_input_order() {
        let customers = customer_summary(&sample_frame(), 10).unwrap();
        let ids: Vec<&str> = customers.iter().map(|c| c.customer_id.as_str()).collect();
        // Customer 1 has two numeric amounts, tying with customer 2
        assert_eq!(ids, vec!["1", "2", "3"]);

        assert_eq!(customers[0].purchases, 2);
        assert_eq!(customers[0].total_spent, 15.0);
        assert_eq!(customers[0].avg_purchase, Some(7.5));
        assert_eq!(customers[1].total_spent, 60.0);
    }

    #[test]
    fn test_age_group_counts_ordered() {
        let counts = age_group_counts(&sample_frame()).unwrap();
        assert_eq!(
            counts,
            vec![
                AgeGroupCount { group: AgeGroup::Under18, count: 2 },
                AgeGroupCount { group: AgeGroup::From50, count: 3 },
            ]
        );
    }
}
