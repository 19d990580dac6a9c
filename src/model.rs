//! Customer segmentation: frequency/monetary features, scaling and K-Means partitioning

use linfa::prelude::*;
use linfa_clustering::KMeans;
use linfa_nn::distance::L2Dist;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::aggregate::{f64_values, str_values, u64_values};
use crate::data::{CUSTOMER_COL, TOTAL_COL};
use crate::error::Error;

/// Per-customer frequency and monetary values with an optional segment label
#[derive(Debug, Clone, PartialEq)]
pub struct RfmRecord {
    pub customer_id: String,
    /// Number of transactions
    pub frequency: u64,
    /// Sum of `Total`, missing amounts counted as zero
    pub monetary: f64,
    pub segment: Option<usize>,
}

/// One record per distinct customer, in order of first appearance
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RfmTable {
    pub records: Vec<RfmRecord>,
}

impl RfmTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Raw `(frequency, monetary)` matrix, shape `(n_customers, 2)`
    pub fn features(&self) -> crate::Result<Array2<f64>> {
        let values = self
            .records
            .iter()
            .flat_map(|r| [r.frequency as f64, r.monetary])
            .collect();
        Ok(Array2::from_shape_vec((self.records.len(), 2), values)?)
    }

    /// Customers per segment for segments `0..n_segments`
    pub fn segment_sizes(&self, n_segments: usize) -> Vec<usize> {
        let mut sizes = vec![0; n_segments];
        for segment in self.records.iter().filter_map(|r| r.segment) {
            if segment < n_segments {
                sizes[segment] += 1;
            }
        }
        sizes
    }
}

/// Group transactions by customer into frequency (row count) and monetary (spend) values
pub fn build_rfm(df: &DataFrame) -> crate::Result<RfmTable> {
    if df.column(CUSTOMER_COL).is_err() {
        return Err(Error::MissingColumn(CUSTOMER_COL.to_string()));
    }

    let out = df
        .clone()
        .lazy()
        .filter(col(CUSTOMER_COL).is_not_null())
        .with_column(col(CUSTOMER_COL).cast(DataType::String))
        .group_by_stable([col(CUSTOMER_COL)])
        .agg([
            len().alias("frequency"),
            col(TOTAL_COL).sum().alias("monetary"),
        ])
        .collect()?;

    let customers = str_values(&out, CUSTOMER_COL)?;
    let frequencies = u64_values(&out, "frequency")?;
    let monetary = f64_values(&out, "monetary")?;

    let records = customers
        .into_iter()
        .zip(frequencies)
        .zip(monetary)
        .map(|((customer_id, frequency), monetary)| RfmRecord {
            customer_id,
            frequency: frequency.unwrap_or(0),
            monetary: monetary.unwrap_or(0.0),
            segment: None,
        })
        .collect();

    Ok(RfmTable { records })
}

/// Column-wise standardization fitted on the data it will transform
///
/// Columns are divided by the sample standard deviation (`n - 1` denominator).
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    pub mean: Array1<f64>,
    /// Sample standard deviation per column, 1.0 where it is zero or undefined
    pub scale: Array1<f64>,
}

impl StandardScaler {
    pub fn fit(data: &Array2<f64>) -> crate::Result<Self> {
        let mean = data
            .mean_axis(Axis(0))
            .ok_or(Error::InsufficientData {
                required: 1,
                found: 0,
            })?;
        let scale = data
            .std_axis(Axis(0), 1.0)
            .mapv(|s| if s > 0.0 && s.is_finite() { s } else { 1.0 });
        Ok(Self { mean, scale })
    }

    pub fn transform(&self, data: &Array2<f64>) -> Array2<f64> {
        (data - &self.mean) / &self.scale
    }
}

/// Splits points into `k` groups, returning one label in `0..k` per row
pub trait PartitionStrategy {
    fn name(&self) -> &'static str;

    fn partition(&self, points: ArrayView2<f64>, k: usize) -> crate::Result<Array1<usize>>;
}

/// Lloyd's algorithm with k-means++ seeding from a fixed RNG seed
#[derive(Debug, Clone, Copy)]
pub struct LloydKMeans {
    pub seed: u64,
    pub max_iters: usize,
}

impl LloydKMeans {
    pub fn new(seed: u64, max_iters: usize) -> Self {
        Self { seed, max_iters }
    }
}

impl PartitionStrategy for LloydKMeans {
    fn name(&self) -> &'static str {
        "lloyd"
    }

    fn partition(&self, points: ArrayView2<f64>, k: usize) -> crate::Result<Array1<usize>> {
        check_point_count(points.nrows(), k)?;

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut centroids = kmeans_plus_plus(points, k, &mut rng);
        let mut labels = assign_to_nearest(points, &centroids);

        for iteration in 1..=self.max_iters {
            update_centroids(points, &labels, &mut centroids);
            let next = assign_to_nearest(points, &centroids);
            if next == labels {
                debug!(iteration, "assignments stable");
                break;
            }
            labels = next;
        }

        Ok(labels)
    }
}

/// K-Means from linfa-clustering, seeded for reproducible runs
#[derive(Debug, Clone, Copy)]
pub struct LinfaKMeans {
    pub seed: u64,
    pub max_iters: usize,
    pub tolerance: f64,
}

impl LinfaKMeans {
    pub fn new(seed: u64, max_iters: usize, tolerance: f64) -> Self {
        Self {
            seed,
            max_iters,
            tolerance,
        }
    }
}

impl PartitionStrategy for LinfaKMeans {
    fn name(&self) -> &'static str {
        "linfa"
    }

    fn partition(&self, points: ArrayView2<f64>, k: usize) -> crate::Result<Array1<usize>> {
        check_point_count(points.nrows(), k)?;

        let records = points.to_owned();
        // Dummy targets for unsupervised learning
        let targets: Array1<usize> = Array1::zeros(records.nrows());
        let dataset = Dataset::new(records.clone(), targets);

        let rng = StdRng::seed_from_u64(self.seed);
        let model = KMeans::params_with(k, rng, L2Dist)
            .max_n_iterations(self.max_iters as u64)
            .tolerance(self.tolerance)
            .fit(&dataset)
            .map_err(|e| Error::Clustering(e.to_string()))?;

        let labels: Array1<usize> = model.predict(&records);
        Ok(labels)
    }
}

/// Standardize frequency/monetary and label every record with a segment in `0..k`
///
/// # Arguments
/// * `table` - RFM table to label in place
/// * `strategy` - Partitioning algorithm
/// * `k` - Number of segments
pub fn segment_customers(
    table: &mut RfmTable,
    strategy: &dyn PartitionStrategy,
    k: usize,
) -> crate::Result<()> {
    check_point_count(table.len(), k)?;

    let raw = table.features()?;
    let scaler = StandardScaler::fit(&raw)?;
    let scaled = scaler.transform(&raw);
    debug!(
        strategy = strategy.name(),
        mean = ?scaler.mean,
        scale = ?scaler.scale,
        "standardized features"
    );

    let labels = strategy.partition(scaled.view(), k)?;
    if labels.len() != table.len() {
        return Err(Error::Clustering(format!(
            "{} returned {} labels for {} customers",
            strategy.name(),
            labels.len(),
            table.len()
        )));
    }
    if let Some(&bad) = labels.iter().find(|&&label| label >= k) {
        return Err(Error::Clustering(format!(
            "{} produced label {} outside 0..{}",
            strategy.name(),
            bad,
            k
        )));
    }

    for (record, &label) in table.records.iter_mut().zip(labels.iter()) {
        record.segment = Some(label);
    }
    Ok(())
}

fn check_point_count(n_points: usize, k: usize) -> crate::Result<()> {
    if k == 0 {
        return Err(Error::Clustering("number of segments must be positive".into()));
    }
    if n_points < k {
        return Err(Error::InsufficientData {
            required: k,
            found: n_points,
        });
    }
    Ok(())
}

/// Pick `k` starting centroids, each chosen with probability proportional to
/// its squared distance from the nearest centroid picked so far
fn kmeans_plus_plus(points: ArrayView2<f64>, k: usize, rng: &mut StdRng) -> Array2<f64> {
    let n = points.nrows();
    let mut centroids = Array2::zeros((k, points.ncols()));

    let first = rng.gen_range(0..n);
    centroids.row_mut(0).assign(&points.row(first));

    let mut closest: Vec<f64> = points
        .outer_iter()
        .map(|p| squared_distance(p, centroids.row(0)))
        .collect();

    for c in 1..k {
        let total: f64 = closest.iter().sum();
        let chosen = if total > 0.0 {
            let mut target = rng.gen::<f64>() * total;
            let mut chosen = None;
            let mut last_positive = 0;
            for (i, &d) in closest.iter().enumerate() {
                if d > 0.0 {
                    last_positive = i;
                    if target < d {
                        chosen = Some(i);
                        break;
                    }
                    target -= d;
                }
            }
            chosen.unwrap_or(last_positive)
        } else {
            // All points coincide with existing centroids
            rng.gen_range(0..n)
        };

        centroids.row_mut(c).assign(&points.row(chosen));
        for (i, p) in points.outer_iter().enumerate() {
            let d = squared_distance(p, centroids.row(c));
            if d < closest[i] {
                closest[i] = d;
            }
        }
    }

    centroids
}

/// Index of the nearest centroid for every point; ties go to the lower index
fn assign_to_nearest(points: ArrayView2<f64>, centroids: &Array2<f64>) -> Array1<usize> {
    points
        .outer_iter()
        .map(|point| {
            let mut best = 0;
            let mut best_distance = f64::INFINITY;
            for (idx, centroid) in centroids.outer_iter().enumerate() {
                let d = squared_distance(point, centroid);
                if d < best_distance {
                    best_distance = d;
                    best = idx;
                }
            }
            best
        })
        .collect()
}

/// Move each centroid to the mean of its points; empty clusters stay put
fn update_centroids(points: ArrayView2<f64>, labels: &Array1<usize>, centroids: &mut Array2<f64>) {
    let mut sums = Array2::<f64>::zeros(centroids.raw_dim());
    let mut counts = vec![0usize; centroids.nrows()];

    for (point, &label) in points.outer_iter().zip(labels.iter()) {
        let mut sum = sums.row_mut(label);
        sum += &point;
        counts[label] += 1;
    }

    for (idx, &count) in counts.iter().enumerate() {
        if count > 0 {
            let mean = &sums.row(idx) / count as f64;
            centroids.row_mut(idx).assign(&mean);
        }
    }
}

fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Relabel so the first point seen gets 0, the next new cluster 1, and so on
    fn canonical(labels: &Array1<usize>) -> Vec<usize> {
        let mut seen: Vec<usize> = Vec::new();
        labels
            .iter()
            .map(|label| match seen.iter().position(|s| s == label) {
                Some(pos) => pos,
                None => {
                    seen.push(*label);
                    seen.len() - 1
                }
            })
            .collect()
    }

    fn four_blobs() -> Array2<f64> {
        Array2::from_shape_vec(
            (12, 2),
            vec![
                0.0, 0.0, 0.1, 0.2, 0.2, 0.1, // blob A
                10.0, 10.0, 10.1, 10.2, 9.9, 10.1, // blob B
                0.0, 10.0, 0.2, 10.1, -0.1, 9.9, // blob C
                10.0, 0.0, 10.2, 0.1, 9.8, -0.1, // blob D
            ],
        )
        .unwrap()
    }

    fn table_from(rows: &[(&str, u64, f64)]) -> RfmTable {
        RfmTable {
            records: rows
                .iter()
                .map(|&(id, frequency, monetary)| RfmRecord {
                    customer_id: id.to_string(),
                    frequency,
                    monetary,
                    segment: None,
                })
                .collect(),
        }
    }

    #[test]
    fn test_build_rfm() {
        let df = df!(
            CUSTOMER_COL => ["C1", "C1", "C2"],
            TOTAL_COL => [10.0, 20.0, 5.0]
        )
        .unwrap();

        let table = build_rfm(&df).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.records[0].customer_id, "C1");
        assert_eq!(table.records[0].frequency, 2);
        assert_eq!(table.records[0].monetary, 30.0);
        assert_eq!(table.records[1].customer_id, "C2");
        assert_eq!(table.records[1].frequency, 1);
        assert_eq!(table.records[1].monetary, 5.0);
    }

    #[test]
    fn test_build_rfm_counts_rows_with_missing_totals() {
        let df = df!(
            CUSTOMER_COL => [Some(7i64), Some(7), None, Some(8)],
            TOTAL_COL => [Some(1.0), None, Some(3.0), None]
        )
        .unwrap();

        let table = build_rfm(&df).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.records[0].frequency, 2);
        assert_eq!(table.records[0].monetary, 1.0);
        assert_eq!(table.records[1].customer_id, "8");
        assert_eq!(table.records[1].monetary, 0.0);
    }

    #[test]
    fn test_standard_scaler() {
        let data =
            Array2::from_shape_vec((4, 2), vec![1.0, 5.0, 2.0, 5.0, 3.0, 5.0, 4.0, 5.0]).unwrap();
        let scaler = StandardScaler::fit(&data).unwrap();
        let scaled = scaler.transform(&data);

        let mean = scaled.mean_axis(Axis(0)).unwrap();
        assert!(mean[0].abs() < 1e-12);
        // Sample variance of 1..=4 is 5/3
        assert!((scaler.scale[0] - (5.0f64 / 3.0).sqrt()).abs() < 1e-12);
        assert!((scaled.std_axis(Axis(0), 1.0)[0] - 1.0).abs() < 1e-12);

        // Constant column is centered but not scaled
        assert_eq!(scaler.scale[1], 1.0);
        assert!(scaled.column(1).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_standard_scaler_single_row() {
        let data = Array2::from_shape_vec((1, 2), vec![3.0, 40.0]).unwrap();
        let scaler = StandardScaler::fit(&data).unwrap();

        assert_eq!(scaler.scale, Array1::from(vec![1.0, 1.0]));
        assert!(scaler.transform(&data).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_lloyd_separates_blobs() {
        let points = four_blobs();
        let labels = LloydKMeans::new(42, 300).partition(points.view(), 4).unwrap();

        assert!(labels.iter().all(|&l| l < 4));
        assert_eq!(
            canonical(&labels),
            vec![0, 0, 0, 1, 1, 1, 2, 2, 2, 3, 3, 3]
        );
    }

    #[test]
    fn test_lloyd_is_deterministic() {
        let points = four_blobs();
        let strategy = LloydKMeans::new(7, 300);
        let first = strategy.partition(points.view(), 3).unwrap();
        let second = strategy.partition(points.view(), 3).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_lloyd_with_duplicate_points() {
        let points = Array2::from_shape_vec(
            (5, 2),
            vec![1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 2.0],
        )
        .unwrap();
        let labels = LloydKMeans::new(42, 300).partition(points.view(), 4).unwrap();
        assert_eq!(labels.len(), 5);
        assert!(labels.iter().all(|&l| l < 4));
        assert_eq!(labels[0], labels[1]);
        assert_ne!(labels[0], labels[3]);
    }

    #[test]
    fn test_insufficient_points() {
        let points = Array2::from_shape_vec((3, 2), vec![0.0, 0.0, 1.0, 1.0, 2.0, 2.0]).unwrap();
        let result = LloydKMeans::new(42, 300).partition(points.view(), 4);
        assert!(matches!(
            result,
            Err(Error::InsufficientData { required: 4, found: 3 })
        ));
    }

    #[test]
    fn test_linfa_strategy() {
        let points = four_blobs();
        let labels = LinfaKMeans::new(42, 300, 1e-4).partition(points.view(), 4).unwrap();

        assert_eq!(labels.len(), 12);
        assert!(labels.iter().all(|&l| l < 4));
        assert_eq!(
            canonical(&labels),
            vec![0, 0, 0, 1, 1, 1, 2, 2, 2, 3, 3, 3]
        );
    }

    #[test]
    fn test_segment_customers() {
        let mut table = table_from(&[
            ("a", 1, 10.0),
            ("b", 1, 12.0),
            ("c", 10, 10.0),
            ("d", 10, 12.0),
            ("e", 1, 1000.0),
            ("f", 1, 1010.0),
            ("g", 10, 1000.0),
            ("h", 10, 1010.0),
        ]);

        segment_customers(&mut table, &LloydKMeans::new(42, 300), 4).unwrap();

        let segments: Vec<usize> = table.records.iter().map(|r| r.segment.unwrap()).collect();
        assert!(segments.iter().all(|&s| s < 4));
        for pair in segments.chunks(2) {
            assert_eq!(pair[0], pair[1]);
        }
        assert_eq!(table.segment_sizes(4), vec![2, 2, 2, 2]);
    }

    #[test]
    fn test_segment_customers_needs_enough_customers() {
        let mut table = table_from(&[("a", 1, 1.0), ("b", 2, 2.0), ("c", 3, 3.0)]);
        let result = segment_customers(&mut table, &LloydKMeans::new(42, 300), 4);

        assert!(matches!(result, Err(Error::InsufficientData { .. })));
        assert!(table.records.iter().all(|r| r.segment.is_none()));
    }
}
