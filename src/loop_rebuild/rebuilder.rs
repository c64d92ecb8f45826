//! Rebuild the global map from stored fragments under corrected poses.

use std::path::PathBuf;
use std::time::Instant;

use serde::Deserialize;
use tracing::{info, warn};

use crate::cloud::{PointCloud, VoxelGrid};
use crate::geometry::SnapshotFrame;
use crate::io::pcd::save_snapshot;
use crate::map::{FragmentLog, GlobalMap};
use crate::system::messages::LoopEvent;

/// Configuration for loop rebuilds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoopRebuildConfig {
    /// Rebuilt maps with fewer points than this are discarded.
    pub min_viable_points: usize,

    /// Snapshot written after each accepted rebuild.
    pub snapshot_path: PathBuf,
}

impl Default for LoopRebuildConfig {
    fn default() -> Self {
        Self {
            min_viable_points: 10_000,
            snapshot_path: PathBuf::from("dense_map_loop.pcd"),
        }
    }
}

/// Result of one rebuild attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildOutcome {
    /// The global map was replaced.
    Accepted {
        loop_count: usize,
        map_points: usize,
        fragments_used: usize,
    },

    /// Candidate too small; the global map is unchanged.
    Rejected { candidate_points: usize },
}

/// Owned by the fusion worker; counts accepted rebuilds.
#[derive(Debug)]
pub struct LoopRebuilder {
    config: LoopRebuildConfig,
    voxel: VoxelGrid,
    snapshot_frame: SnapshotFrame,
    loop_count: usize,
}

impl LoopRebuilder {
    pub fn new(config: LoopRebuildConfig, resolution: f32, snapshot_frame: SnapshotFrame) -> Self {
        Self {
            config,
            voxel: VoxelGrid::new(resolution),
            snapshot_frame,
            loop_count: 0,
        }
    }

    pub fn config(&self) -> &LoopRebuildConfig {
        &self.config
    }

    /// Accepted rebuilds so far.
    pub fn loop_count(&self) -> usize {
        self.loop_count
    }

    /// Rebuild `global_map` from `fragments` with the poses listed in `event`.
    ///
    /// Keyframes without a stored fragment are skipped, and fragments whose keyframe
    /// is not listed do not contribute.
    pub fn rebuild(
        &mut self,
        event: &LoopEvent,
        fragments: &FragmentLog,
        global_map: &GlobalMap,
    ) -> RebuildOutcome {
        let start = Instant::now();
        let mut writer = global_map.write();

        let mut candidate = PointCloud::new();
        let mut fragments_used = 0;
        for kf in &event.keyframes {
            let Some(fragment) = fragments.get(kf.id) else {
                continue;
            };
            candidate.extend_from(&fragment.to_world_with(&kf.pose_cw));
            fragments_used += 1;
        }
        let candidate = self.voxel.filter(&candidate);

        if candidate.len() < self.config.min_viable_points {
            info!(
                "Loop rebuild discarded: {} points from {} fragments (< {}), map kept at {} points",
                candidate.len(),
                fragments_used,
                self.config.min_viable_points,
                writer.current().len()
            );
            return RebuildOutcome::Rejected {
                candidate_points: candidate.len(),
            };
        }

        let map_points = candidate.len();
        writer.replace(candidate);
        self.loop_count += 1;
        let snapshot = writer.snapshot();
        drop(writer);

        info!(
            "Loop {}: {} keyframes adjusted, {} fragments used, {} points, {:.1} ms",
            self.loop_count,
            event.keyframes.len(),
            fragments_used,
            map_points,
            start.elapsed().as_secs_f64() * 1000.0
        );

        if let Err(e) = save_snapshot(&self.config.snapshot_path, &snapshot, self.snapshot_frame) {
            warn!("Failed to save loop snapshot: {e:#}");
        }

        RebuildOutcome::Accepted {
            loop_count: self.loop_count,
            map_points,
            fragments_used,
        }
    }
}
