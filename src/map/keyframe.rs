//! KeyFrame - a posed camera observation handed over by the tracker.
//!
//! The fusion stage does not own keyframes. It copies the few fields it needs
//! (id, pose, intrinsics) together with the color and depth images at ingestion.

use image::{ImageBuffer, Luma, RgbImage};

use crate::geometry::SE3;

use super::types::KeyFrameId;

/// 8-bit RGB color image.
pub type ColorImage = RgbImage;

/// Depth image in metres, pixel-aligned with the color image.
pub type DepthImage = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Pinhole camera intrinsics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraIntrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl CameraIntrinsics {
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self { fx, fy, cx, cy }
    }

    /// All four parameters set (non-zero and finite).
    pub fn is_valid(&self) -> bool {
        [self.fx, self.fy, self.cx, self.cy]
            .iter()
            .all(|v| v.is_finite() && *v != 0.0)
    }
}

/// A keyframe as seen by the fusion stage.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyFrame {
    pub id: KeyFrameId,

    /// World to camera (T_cw). Fragments are placed in the world with its inverse.
    pub pose_cw: SE3,

    pub intrinsics: CameraIntrinsics,
}

impl KeyFrame {
    pub fn new(id: KeyFrameId, pose_cw: SE3, intrinsics: CameraIntrinsics) -> Self {
        Self {
            id,
            pose_cw,
            intrinsics,
        }
    }

    pub fn to_pose(&self) -> KeyFramePose {
        KeyFramePose {
            id: self.id,
            pose_cw: self.pose_cw,
        }
    }
}

/// Id and current pose of one keyframe, as listed by the tracker.
///
/// A list of these is the "all known keyframes" snapshot used by loop rebuilds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyFramePose {
    pub id: KeyFrameId,
    pub pose_cw: SE3,
}

impl KeyFramePose {
    pub fn new(id: KeyFrameId, pose_cw: SE3) -> Self {
        Self { id, pose_cw }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    #[test]
    fn test_intrinsics_validity() {
        assert!(CameraIntrinsics::new(525.0, 525.0, 319.5, 239.5).is_valid());
        assert!(!CameraIntrinsics::new(0.0, 525.0, 319.5, 239.5).is_valid());
        assert!(!CameraIntrinsics::new(525.0, f64::NAN, 319.5, 239.5).is_valid());
    }

    #[test]
    fn test_to_pose_keeps_id_and_pose() {
        let kf = KeyFrame::new(
            KeyFrameId::new(3),
            SE3::from_translation(Vector3::new(0.0, 0.0, -1.0)),
            CameraIntrinsics::new(1.0, 1.0, 1.0, 1.0),
        );

        let pose = kf.to_pose();
        assert_eq!(pose.id, KeyFrameId::new(3));
        assert_relative_eq!(pose.pose_cw.translation, Vector3::new(0.0, 0.0, -1.0));
    }
}
