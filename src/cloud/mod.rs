//! Point-cloud primitives used by the fusion pipeline.
//!
//! - [`PointCloud`] / [`ColorPoint`] - colored, unorganized point sets
//! - [`VoxelGrid`] - one centroid per occupied cubic cell
//! - [`StatisticalOutlierFilter`] - k-nearest-neighbour distance based noise removal
//!
//! All operations are pure: they take a cloud by reference and return a new one.

pub mod outlier;
pub mod point_cloud;
pub mod voxel_grid;

pub use outlier::{OutlierFilterConfig, StatisticalOutlierFilter};
pub use point_cloud::{ColorPoint, PointCloud};
pub use voxel_grid::VoxelGrid;
