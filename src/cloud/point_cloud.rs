//! Colored point cloud container.

use nalgebra::{Matrix3, Point3, Vector3};

use crate::geometry::SE3;

/// A 3D point with an 8-bit RGB color.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorPoint {
    pub position: Point3<f32>,
    pub color: [u8; 3],
}

impl ColorPoint {
    pub fn new(x: f32, y: f32, z: f32, color: [u8; 3]) -> Self {
        Self {
            position: Point3::new(x, y, z),
            color,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.position.iter().all(|v| v.is_finite())
    }
}

/// An unorganized set of colored points.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    pub points: Vec<ColorPoint>,
}

impl PointCloud {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
        }
    }

    pub fn from_points(points: Vec<ColorPoint>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn push(&mut self, point: ColorPoint) {
        self.points.push(point);
    }

    /// Append all points of `other`.
    pub fn extend_from(&mut self, other: &PointCloud) {
        self.points.extend_from_slice(&other.points);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ColorPoint> {
        self.points.iter()
    }

    /// Positions as plain arrays, in point order.
    pub fn positions(&self) -> Vec<[f32; 3]> {
        self.points
            .iter()
            .map(|p| [p.position.x, p.position.y, p.position.z])
            .collect()
    }

    /// Return a copy with every point mapped through `transform`.
    pub fn transformed(&self, transform: &SE3) -> PointCloud {
        let mut out = self.clone();
        out.transform_in_place(transform);
        out
    }

    /// Map every point through `transform`.
    ///
    /// The transform is evaluated in f32, matching the precision of the stored points.
    pub fn transform_in_place(&mut self, transform: &SE3) {
        let r: Matrix3<f32> = transform.rotation_matrix().map(|v| v as f32);
        let t: Vector3<f32> = transform.translation.map(|v| v as f32);
        for p in &mut self.points {
            p.position = Point3::from(r * p.position.coords + t);
        }
    }

    /// Axis-aligned bounds as (min, max), or None for an empty cloud.
    pub fn bounds(&self) -> Option<(Point3<f32>, Point3<f32>)> {
        let first = self.points.first()?.position;
        let (mut min, mut max) = (first, first);
        for p in &self.points[1..] {
            min = min.inf(&p.position);
            max = max.sup(&p.position);
        }
        Some((min, max))
    }
}

impl FromIterator<ColorPoint> for PointCloud {
    fn from_iter<I: IntoIterator<Item = ColorPoint>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a PointCloud {
    type Item = &'a ColorPoint;
    type IntoIter = std::slice::Iter<'a, ColorPoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}
