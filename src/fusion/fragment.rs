//! Fragment generation: one posed RGB-D keyframe → colored world-frame points.
//!
//! Steps:
//! 1. Walk the pixel grid with a fixed stride
//! 2. Keep pixels whose depth is strictly inside the trusted sensor range
//! 3. Back-project with the pinhole model and attach the pixel color
//! 4. Statistical outlier removal in the camera frame
//! 5. Transform into the world with T_wc = T_cw⁻¹
//!
//! The camera-frame result is also returned as a [`PointCloudFragment`] so a loop
//! rebuild can place it again under a corrected pose.

use anyhow::{Result, bail};
use serde::Deserialize;
use tracing::debug;

use crate::cloud::{ColorPoint, OutlierFilterConfig, PointCloud, StatisticalOutlierFilter};
use crate::map::{CameraIntrinsics, ColorImage, DepthImage, KeyFrame, PointCloudFragment};

/// Configuration for fragment generation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FragmentConfig {
    /// Sample every `pixel_stride`-th row and column.
    pub pixel_stride: u32,

    /// Depths at or below this (metres) are rejected.
    pub min_depth: f32,

    /// Depths at or above this (metres) are rejected.
    pub max_depth: f32,

    /// Outlier removal applied to each fragment in the camera frame.
    pub outlier: OutlierFilterConfig,
}

impl Default for FragmentConfig {
    fn default() -> Self {
        Self {
            pixel_stride: 5,
            min_depth: 0.3,
            max_depth: 8.5,
            outlier: OutlierFilterConfig::default(),
        }
    }
}

impl FragmentConfig {
    /// True when `depth` lies strictly inside (min_depth, max_depth). NaN is rejected.
    pub fn accepts_depth(&self, depth: f32) -> bool {
        depth > self.min_depth && depth < self.max_depth
    }
}

/// Output of [`FragmentGenerator::generate`].
pub struct GeneratedFragment {
    /// Points in world coordinates, ready to be fused.
    pub world_points: PointCloud,

    /// Camera-frame copy kept for loop rebuilds.
    pub fragment: PointCloudFragment,
}

/// Converts keyframes into point fragments. Stateless and deterministic.
#[derive(Debug, Clone)]
pub struct FragmentGenerator {
    config: FragmentConfig,
    outlier_filter: StatisticalOutlierFilter,
}

impl FragmentGenerator {
    pub fn new(config: FragmentConfig) -> Self {
        let outlier_filter = StatisticalOutlierFilter::new(config.outlier);
        Self {
            config,
            outlier_filter,
        }
    }

    pub fn config(&self) -> &FragmentConfig {
        &self.config
    }

    /// Back-project the sampled, depth-filtered pixels into the camera frame.
    pub fn back_project(
        &self,
        intrinsics: &CameraIntrinsics,
        color: &ColorImage,
        depth: &DepthImage,
    ) -> Result<PointCloud> {
        if color.dimensions() != depth.dimensions() {
            bail!(
                "color image is {:?} but depth image is {:?}",
                color.dimensions(),
                depth.dimensions()
            );
        }

        let (width, height) = depth.dimensions();
        let stride = self.config.pixel_stride.max(1) as usize;
        let (fx, fy) = (intrinsics.fx as f32, intrinsics.fy as f32);
        let (cx, cy) = (intrinsics.cx as f32, intrinsics.cy as f32);

        let mut cloud = PointCloud::new();
        for v in (0..height).step_by(stride) {
            for u in (0..width).step_by(stride) {
                let z = depth.get_pixel(u, v)[0];
                if !self.config.accepts_depth(z) {
                    continue;
                }
                let x = (u as f32 - cx) * z / fx;
                let y = (v as f32 - cy) * z / fy;
                cloud.push(ColorPoint::new(x, y, z, color.get_pixel(u, v).0));
            }
        }
        Ok(cloud)
    }

    /// Generate the world-frame points and the loop-eligible fragment for `keyframe`.
    ///
    /// `intrinsics` are the session intrinsics latched by the caller, which may differ
    /// from the ones carried by this keyframe.
    pub fn generate(
        &self,
        keyframe: &KeyFrame,
        intrinsics: &CameraIntrinsics,
        color: &ColorImage,
        depth: &DepthImage,
    ) -> Result<GeneratedFragment> {
        let raw = self.back_project(intrinsics, color, depth)?;
        let local_points = self.outlier_filter.filter(&raw);

        debug!(
            "{}: {} sampled points, {} after outlier removal",
            keyframe.id,
            raw.len(),
            local_points.len()
        );

        let fragment = PointCloudFragment {
            keyframe_id: keyframe.id,
            pose_cw: keyframe.pose_cw,
            local_points,
        };

        Ok(GeneratedFragment {
            world_points: fragment.to_world(),
            fragment,
        })
    }
}
