//! Append-only store of fused fragments.
//!
//! Any keyframe may be referenced by a later loop rebuild, so fragments are never
//! removed. The log is owned by the fusion worker and needs no lock.

use std::collections::HashMap;

use tracing::warn;

use crate::cloud::PointCloud;
use crate::geometry::SE3;

use super::types::KeyFrameId;

/// Points generated from one keyframe, kept in that keyframe's camera frame.
#[derive(Debug, Clone, PartialEq)]
pub struct PointCloudFragment {
    pub keyframe_id: KeyFrameId,

    /// T_cw the fragment was fused with.
    pub pose_cw: SE3,

    /// Filtered points in the camera frame.
    pub local_points: PointCloud,
}

impl PointCloudFragment {
    /// Place the fragment in the world with an arbitrary (e.g. corrected) T_cw.
    pub fn to_world_with(&self, pose_cw: &SE3) -> PointCloud {
        self.local_points.transformed(&pose_cw.inverse())
    }

    /// Place the fragment in the world with the pose it was fused with.
    pub fn to_world(&self) -> PointCloud {
        self.to_world_with(&self.pose_cw)
    }

    pub fn len(&self) -> usize {
        self.local_points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.local_points.is_empty()
    }
}

/// Arena of fragments indexed by keyframe id.
#[derive(Debug, Default)]
pub struct FragmentLog {
    fragments: Vec<PointCloudFragment>,
    by_id: HashMap<KeyFrameId, usize>,
}

impl FragmentLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment. A repeated id shadows the earlier entry for lookups;
    /// the earlier entry stays in the arena.
    pub fn append(&mut self, fragment: PointCloudFragment) {
        let id = fragment.keyframe_id;
        self.fragments.push(fragment);
        if self.by_id.insert(id, self.fragments.len() - 1).is_some() {
            warn!("Fragment for {} appended twice; using the newest", id);
        }
    }

    pub fn get(&self, id: KeyFrameId) -> Option<&PointCloudFragment> {
        self.by_id.get(&id).map(|&idx| &self.fragments[idx])
    }

    /// Number of stored fragments (including shadowed ones).
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Fragments in append order.
    pub fn iter(&self) -> impl Iterator<Item = &PointCloudFragment> {
        self.fragments.iter()
    }

    /// Total number of local points across all fragments.
    pub fn total_points(&self) -> usize {
        self.fragments.iter().map(PointCloudFragment::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::ColorPoint;
    use approx::assert_relative_eq;
    use nalgebra::{Point3, Vector3};

    fn fragment(id: u64, n: usize) -> PointCloudFragment {
        PointCloudFragment {
            keyframe_id: KeyFrameId::new(id),
            pose_cw: SE3::from_translation(Vector3::new(0.0, 0.0, -2.0)),
            local_points: (0..n)
                .map(|i| ColorPoint::new(i as f32, 0.0, 1.0, [0; 3]))
                .collect(),
        }
    }

    #[test]
    fn test_append_and_lookup() {
        let mut log = FragmentLog::new();
        log.append(fragment(0, 3));
        log.append(fragment(5, 2));

        assert_eq!(log.len(), 2);
        assert_eq!(log.total_points(), 5);
        assert_eq!(log.get(KeyFrameId::new(5)).map(|f| f.len()), Some(2));
        assert!(log.get(KeyFrameId::new(1)).is_none());
    }

    #[test]
    fn test_duplicate_id_shadows_but_keeps() {
        let mut log = FragmentLog::new();
        log.append(fragment(5, 2));
        log.append(fragment(5, 7));

        assert_eq!(log.len(), 2);
        assert_eq!(log.get(KeyFrameId::new(5)).map(|f| f.len()), Some(7));
    }

    #[test]
    fn test_world_placement_uses_inverse_pose() {
        let frag = fragment(0, 1);

        // T_cw translates by -2 in z, so the world point is 2 further along z.
        let world = frag.to_world();
        assert_relative_eq!(world.points[0].position, Point3::new(0.0, 0.0, 3.0), epsilon = 1e-6);

        let corrected = frag.to_world_with(&SE3::identity());
        assert_relative_eq!(corrected.points[0].position, Point3::new(0.0, 0.0, 1.0), epsilon = 1e-6);
    }
}
