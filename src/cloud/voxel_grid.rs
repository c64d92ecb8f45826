//! Voxel grid downsampling.
//!
//! Space is partitioned into cubic cells of side `leaf_size`. Every occupied cell
//! is replaced by one representative point: the centroid of its points, carrying
//! their mean color. Because a centroid always falls inside its own cell, running
//! the filter again with the same leaf size keeps the point count.

use std::collections::HashMap;

use nalgebra::{Point3, Vector3};

use super::point_cloud::{ColorPoint, PointCloud};

/// Running sums for one occupied cell.
#[derive(Default)]
struct CellAccumulator {
    position: Vector3<f64>,
    color: [u32; 3],
    count: u32,
}

impl CellAccumulator {
    fn add(&mut self, point: &ColorPoint) {
        self.position += point.position.coords.map(f64::from);
        for (sum, c) in self.color.iter_mut().zip(point.color) {
            *sum += u32::from(c);
        }
        self.count += 1;
    }

    fn centroid(&self) -> ColorPoint {
        let n = f64::from(self.count);
        let mean = self.position / n;
        let half = self.count / 2;
        let color = self.color.map(|sum| ((sum + half) / self.count) as u8);
        ColorPoint {
            position: Point3::from(mean.map(|v| v as f32)),
            color,
        }
    }
}

/// Voxel grid filter with a uniform leaf size.
#[derive(Debug, Clone, Copy)]
pub struct VoxelGrid {
    leaf_size: f32,
}

impl VoxelGrid {
    pub fn new(leaf_size: f32) -> Self {
        Self { leaf_size }
    }

    pub fn leaf_size(&self) -> f32 {
        self.leaf_size
    }

    /// Integer cell coordinates of a position.
    fn cell_of(&self, p: &Point3<f32>) -> (i64, i64, i64) {
        let inv = 1.0 / f64::from(self.leaf_size);
        (
            (f64::from(p.x) * inv).floor() as i64,
            (f64::from(p.y) * inv).floor() as i64,
            (f64::from(p.z) * inv).floor() as i64,
        )
    }

    /// Downsample `cloud`. Cells are emitted in the order they are first seen,
    /// so the output is deterministic for a given input order.
    ///
    /// Non-finite points are dropped. A non-positive leaf size disables the
    /// filter and returns the finite points unchanged.
    pub fn filter(&self, cloud: &PointCloud) -> PointCloud {
        if self.leaf_size.is_nan() || self.leaf_size <= 0.0 {
            return cloud.iter().filter(|p| p.is_finite()).copied().collect();
        }

        let mut index: HashMap<(i64, i64, i64), usize> = HashMap::with_capacity(cloud.len());
        let mut cells: Vec<CellAccumulator> = Vec::new();

        for point in cloud.iter().filter(|p| p.is_finite()) {
            let slot = *index.entry(self.cell_of(&point.position)).or_insert_with(|| {
                cells.push(CellAccumulator::default());
                cells.len() - 1
            });
            cells[slot].add(point);
        }

        cells.iter().map(CellAccumulator::centroid).collect()
    }
}
