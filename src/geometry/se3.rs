//! SE3: 6-DOF rigid body transformation (rotation + translation).
//!
//! Keyframe poses arrive from the tracker as `T_cw` (world → camera). Fusing a
//! fragment into the map applies the inverse, `T_wc`, to camera-frame points.

use nalgebra::{Matrix3, Quaternion, UnitQuaternion, Vector3};

/// Rigid transformation: p' = R * p + t.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SE3 {
    pub rotation: UnitQuaternion<f64>,
    pub translation: Vector3<f64>,
}

impl SE3 {
    /// Identity transformation.
    pub fn identity() -> Self {
        Self {
            rotation: UnitQuaternion::identity(),
            translation: Vector3::zeros(),
        }
    }

    pub fn new(rotation: UnitQuaternion<f64>, translation: Vector3<f64>) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// Pure translation.
    pub fn from_translation(translation: Vector3<f64>) -> Self {
        Self {
            rotation: UnitQuaternion::identity(),
            translation,
        }
    }

    /// Construct from quaternion (w, x, y, z) and translation.
    ///
    /// The quaternion is normalized, so slightly denormalized values read from
    /// text files are accepted.
    pub fn from_quaternion(qw: f64, qx: f64, qy: f64, qz: f64, translation: Vector3<f64>) -> Self {
        Self {
            rotation: UnitQuaternion::from_quaternion(Quaternion::new(qw, qx, qy, qz)),
            translation,
        }
    }

    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        self.rotation.to_rotation_matrix().into_inner()
    }

    /// Inverse: [R^T | -R^T t].
    pub fn inverse(&self) -> Self {
        let rot_inv = self.rotation.inverse();
        Self {
            rotation: rot_inv,
            translation: -(rot_inv * self.translation),
        }
    }
}

impl Default for SE3 {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Unit;

    fn apply(pose: &SE3, p: &Vector3<f64>) -> Vector3<f64> {
        pose.rotation_matrix() * p + pose.translation
    }

    fn sample_pose() -> SE3 {
        SE3::new(
            UnitQuaternion::from_axis_angle(
                &Unit::new_normalize(Vector3::new(0.3, -1.0, 0.5)),
                0.7,
            ),
            Vector3::new(1.0, -2.0, 0.5),
        )
    }

    #[test]
    fn test_inverse_undoes_transform() {
        let pose = sample_pose();
        let p = Vector3::new(0.2, 0.4, 3.0);

        let back = apply(&pose.inverse(), &apply(&pose, &p));
        assert_relative_eq!(back, p, epsilon = 1e-10);
    }

    #[test]
    fn test_from_quaternion_normalizes() {
        let pose = SE3::from_quaternion(2.0, 0.0, 0.0, 0.0, Vector3::zeros());
        assert_relative_eq!(pose.rotation.angle(), 0.0, epsilon = 1e-12);
    }
}
