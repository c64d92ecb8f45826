//! Statistical outlier removal.
//!
//! For every point the mean distance to its `mean_k` nearest neighbours is
//! computed. Points whose mean distance exceeds `mean + std_dev_mul * stddev`
//! (statistics taken over the evaluated points) are treated as sparse sensor
//! noise and removed.

use rstar::RTree;
use serde::Deserialize;

use super::point_cloud::PointCloud;

/// Configuration for statistical outlier removal.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct OutlierFilterConfig {
    /// Number of nearest neighbours used for the mean distance.
    pub mean_k: usize,

    /// Multiplier on the standard deviation of mean distances.
    pub std_dev_mul: f64,
}

impl Default for OutlierFilterConfig {
    fn default() -> Self {
        Self {
            mean_k: 50,
            std_dev_mul: 1.0,
        }
    }
}

/// Statistical outlier filter backed by an R-tree neighbour index.
#[derive(Debug, Clone)]
pub struct StatisticalOutlierFilter {
    config: OutlierFilterConfig,
}

impl StatisticalOutlierFilter {
    pub fn new(config: OutlierFilterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OutlierFilterConfig {
        &self.config
    }

    /// Filter the whole cloud.
    pub fn filter(&self, cloud: &PointCloud) -> PointCloud {
        self.filter_region(cloud, 0)
    }

    /// Filter only the points at indices `start..`, keeping `..start` as is.
    ///
    /// Neighbours are searched in the whole cloud, so freshly appended points that
    /// are supported by existing map structure survive. The rejection threshold is
    /// computed from the region's own distance statistics.
    pub fn filter_region(&self, cloud: &PointCloud, start: usize) -> PointCloud {
        let start = start.min(cloud.len());
        let region_len = cloud.len() - start;
        if self.config.mean_k == 0 || region_len == 0 || cloud.len() < 2 {
            return cloud.clone();
        }

        let positions = cloud.positions();
        let tree = RTree::bulk_load(positions.clone());

        let mean_distances: Vec<f64> = positions[start..]
            .iter()
            .map(|query| self.mean_neighbour_distance(&tree, query))
            .collect();

        let (mean, std_dev) = mean_and_std_dev(&mean_distances);
        let threshold = mean + self.config.std_dev_mul * std_dev;

        let mut out = PointCloud::with_capacity(cloud.len());
        out.points.extend_from_slice(&cloud.points[..start]);
        out.points.extend(
            cloud.points[start..]
                .iter()
                .zip(&mean_distances)
                .filter(|(_, d)| **d <= threshold)
                .map(|(p, _)| *p),
        );
        out
    }

    /// Mean Euclidean distance from `query` to its `mean_k` nearest neighbours,
    /// excluding the query point itself.
    fn mean_neighbour_distance(&self, tree: &RTree<[f32; 3]>, query: &[f32; 3]) -> f64 {
        let mut sum = 0.0;
        let mut count = 0usize;
        // The first hit is the query point itself (or an exact duplicate of it).
        for neighbour in tree.nearest_neighbor_iter(query).skip(1).take(self.config.mean_k) {
            sum += distance(query, neighbour);
            count += 1;
        }
        if count == 0 { 0.0 } else { sum / count as f64 }
    }
}

fn distance(a: &[f32; 3], b: &[f32; 3]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = f64::from(*x) - f64::from(*y);
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

/// Sample mean and standard deviation.
fn mean_and_std_dev(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if values.len() < 2 {
        return (mean, 0.0);
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, variance.sqrt())
}
