//! Coordinate frame conventions for exported maps.
//!
//! The fused map lives in the SLAM world frame, which is the camera frame of the
//! first keyframe and therefore follows the **camera convention (RDF)**:
//!
//! ```text
//!        +Y (down)
//!         |
//!         +------ +X (right)
//!        /
//!      +Z (forward, optical axis)
//! ```
//!
//! Most point-cloud viewers and robotics tools expect a Z-up frame. The **FLU**
//! convention (X-forward, Y-left, Z-up) is offered as an export option:
//!
//! ```text
//!        +Z (up)
//!         |
//!         +------ +Y (left)
//!        /
//!      +X (forward)
//! ```
//!
//! Only snapshot files are converted. The in-memory map always stays in the
//! SLAM world frame so that loop rebuilds compose with tracker poses directly.

use nalgebra::{Matrix3, Rotation3, UnitQuaternion, Vector3};
use serde::Deserialize;

use super::SE3;

/// Frame in which a point-cloud snapshot is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotFrame {
    /// SLAM world frame (camera convention, RDF).
    #[default]
    World,
    /// X-forward, Y-left, Z-up.
    Flu,
}

impl SnapshotFrame {
    /// Transform taking SLAM world coordinates into this frame.
    pub fn transform_from_world(&self) -> SE3 {
        match self {
            SnapshotFrame::World => SE3::identity(),
            SnapshotFrame::Flu => SE3::new(
                UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(
                    rotation_flu_cam(),
                )),
                Vector3::zeros(),
            ),
        }
    }
}

/// Fixed rotation from Camera frame (RDF) to FLU.
///
/// Maps:
/// - Camera +Z (forward) → FLU +X (forward)
/// - Camera +X (right)   → FLU -Y (left)
/// - Camera +Y (down)    → FLU -Z (up)
#[rustfmt::skip]
pub fn rotation_flu_cam() -> Matrix3<f64> {
    Matrix3::new(
        0.0,  0.0, 1.0,  // FLU X = Camera Z
       -1.0,  0.0, 0.0,  // FLU Y = -Camera X
        0.0, -1.0, 0.0,  // FLU Z = -Camera Y
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_forward_becomes_x() {
        let p = rotation_flu_cam() * Vector3::new(0.0, 0.0, 2.0);
        assert_relative_eq!(p, Vector3::new(2.0, 0.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_down_becomes_minus_z() {
        let p = rotation_flu_cam() * Vector3::new(0.0, 1.0, 0.0);
        assert_relative_eq!(p, Vector3::new(0.0, 0.0, -1.0), epsilon = 1e-12);
    }

    #[test]
    fn test_rotation_is_proper() {
        let r = rotation_flu_cam();
        assert_relative_eq!(r.determinant(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(r * r.transpose(), Matrix3::identity(), epsilon = 1e-12);
    }

    #[test]
    fn test_snapshot_frame_transform() {
        let p = Vector3::new(1.0, 2.0, 3.0);
        let world = SnapshotFrame::World.transform_from_world();
        let flu = SnapshotFrame::Flu.transform_from_world();

        assert_relative_eq!(world.rotation_matrix() * p, p);
        assert_relative_eq!(flu.rotation_matrix() * p, rotation_flu_cam() * p, epsilon = 1e-12);
        assert_relative_eq!(flu.translation, Vector3::zeros());
    }
}
