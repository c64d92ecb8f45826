//! Fusion worker thread.
//!
//! Processes mapping jobs strictly in FIFO order:
//! 1. Wait on the ingestion queue (no polling)
//! 2. Loop events, explicit or from the legacy trigger, run a rebuild
//! 3. Keyframes are validated, decimated and fused into the global map
//!
//! On shutdown the remaining queue is drained, the final snapshot is written and
//! the worker reports `Finished`.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::cloud::{PointCloud, StatisticalOutlierFilter, VoxelGrid};
use crate::io::pcd::save_snapshot;
use crate::loop_rebuild::{LoopRebuilder, RebuildOutcome};
use crate::map::{CameraIntrinsics, FragmentLog};
use crate::system::config::DenseMappingConfig;
use crate::system::messages::{LoopEvent, MapUpdate, MappingJob, PendingKeyFrame};
use crate::system::shared_state::{SharedState, WorkerState};

use super::fragment::FragmentGenerator;

/// State owned by the fusion thread.
pub struct FusionWorker {
    config: DenseMappingConfig,
    shared: Arc<SharedState>,
    generator: FragmentGenerator,
    map_outlier_filter: StatisticalOutlierFilter,
    voxel: VoxelGrid,
    fragments: FragmentLog,
    rebuilder: LoopRebuilder,

    /// Intrinsics of the first keyframe, used for the whole session.
    intrinsics: Option<CameraIntrinsics>,

    /// Keyframes fused so far (drives the legacy loop trigger).
    fused_count: usize,
}

impl FusionWorker {
    pub fn new(config: DenseMappingConfig, shared: Arc<SharedState>) -> Self {
        let generator = FragmentGenerator::new(config.fragment.clone());
        let map_outlier_filter = StatisticalOutlierFilter::new(config.map_outlier);
        let voxel = VoxelGrid::new(config.resolution);
        let rebuilder = LoopRebuilder::new(
            config.loop_rebuild.clone(),
            config.resolution,
            config.snapshot_frame,
        );

        Self {
            config,
            shared,
            generator,
            map_outlier_filter,
            voxel,
            fragments: FragmentLog::new(),
            rebuilder,
            intrinsics: None,
            fused_count: 0,
        }
    }

    pub fn fragments(&self) -> &FragmentLog {
        &self.fragments
    }

    /// Worker loop. Returns after the queue was drained following a shutdown request.
    pub fn run(&mut self) {
        info!(
            "Dense mapping started (resolution {} m, every {} keyframes)",
            self.config.resolution, self.config.decimation_modulus
        );

        while let Some(job) = self.next_job() {
            match job {
                MappingJob::KeyFrame(pending) => self.process_keyframe(*pending),
                MappingJob::LoopClosure(event) => self.process_loop(&event),
            }
        }

        self.finalize();
    }

    /// Wait for the next job and report `Draining` when it is part of the backlog
    /// left after a shutdown request.
    fn next_job(&self) -> Option<MappingJob> {
        let job = self.shared.queue.wait_next(self.fused_count)?;
        if self.shared.queue.is_shutdown_requested()
            && self.shared.worker_state() != WorkerState::Draining
        {
            debug!(
                "Shutdown requested, draining {} queued jobs",
                self.shared.queue.len() + 1
            );
            self.shared.set_worker_state(WorkerState::Draining);
        }
        Some(job)
    }

    fn process_keyframe(&mut self, pending: PendingKeyFrame) {
        let PendingKeyFrame {
            keyframe,
            color,
            depth,
        } = pending;

        let intrinsics = match self.intrinsics {
            Some(intrinsics) => intrinsics,
            None if keyframe.intrinsics.is_valid() => {
                debug!("Intrinsics latched from {}: {:?}", keyframe.id, keyframe.intrinsics);
                self.intrinsics = Some(keyframe.intrinsics);
                keyframe.intrinsics
            }
            None => {
                warn!("{}: invalid camera intrinsics, skipped", keyframe.id);
                return;
            }
        };

        if color.dimensions() != depth.dimensions() {
            warn!(
                "{}: color {:?} and depth {:?} differ in size, skipped",
                keyframe.id,
                color.dimensions(),
                depth.dimensions()
            );
            return;
        }

        if !keyframe.id.is_multiple_of(self.config.decimation_modulus) {
            debug!("{}: decimated", keyframe.id);
            return;
        }

        let generated = match self.generator.generate(&keyframe, &intrinsics, &color, &depth) {
            Ok(generated) => generated,
            Err(e) => {
                warn!("{}: fragment generation failed: {e:#}", keyframe.id);
                return;
            }
        };
        self.fragments.append(generated.fragment);

        let map_points = self.fuse(&generated.world_points);
        self.fused_count += 1;
        self.shared.record_fused();

        debug!(
            "{}: fused {} points, map has {} points",
            keyframe.id,
            generated.world_points.len(),
            map_points
        );
        self.shared.publish(MapUpdate::Fused {
            keyframe_id: keyframe.id,
            map_points,
        });
    }

    /// Append `world_points`, filter the new region and downsample, all under the
    /// global map write lock. Returns the new map size.
    fn fuse(&self, world_points: &PointCloud) -> usize {
        let mut writer = self.shared.global_map.write();

        let mut combined = PointCloud::with_capacity(writer.current().len() + world_points.len());
        combined.extend_from(writer.current());
        let start = combined.len();
        combined.extend_from(world_points);

        let filtered = self.map_outlier_filter.filter_region(&combined, start);
        let downsampled = self.voxel.filter(&filtered);
        let map_points = downsampled.len();
        writer.replace(downsampled);
        map_points
    }

    fn process_loop(&mut self, event: &LoopEvent) {
        debug!(
            "Loop event ({:?}) with {} keyframes after {} fused",
            event.trigger,
            event.keyframes.len(),
            self.fused_count
        );

        match self
            .rebuilder
            .rebuild(event, &self.fragments, &self.shared.global_map)
        {
            RebuildOutcome::Accepted { map_points, .. } => {
                let loop_count = self.shared.record_loop_closed();
                self.shared.publish(MapUpdate::LoopRebuilt {
                    loop_count,
                    map_points,
                });
            }
            RebuildOutcome::Rejected { candidate_points } => {
                self.shared
                    .publish(MapUpdate::LoopRejected { candidate_points });
            }
        }
    }

    fn finalize(&mut self) {
        self.shared.set_worker_state(WorkerState::Finalizing);

        let snapshot = self.shared.global_map.snapshot();
        match save_snapshot(&self.config.snapshot_path, &snapshot, self.config.snapshot_frame) {
            Ok(()) => info!(
                "Saved {} points to {}",
                snapshot.len(),
                self.config.snapshot_path.display()
            ),
            Err(e) => warn!("Failed to save final snapshot: {e:#}"),
        }

        info!(
            "Dense mapping finished: {} keyframes fused, {} fragments ({} points), {} loops closed",
            self.fused_count,
            self.fragments.len(),
            self.fragments.total_points(),
            self.rebuilder.loop_count()
        );
        self.shared.set_worker_state(WorkerState::Finished);
    }
}

/// Spawn the fusion worker on its own named thread.
pub fn spawn_fusion_worker(
    config: DenseMappingConfig,
    shared: Arc<SharedState>,
) -> Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("dense-mapping".to_string())
        .spawn(move || {
            let mut worker = FusionWorker::new(config, shared);
            worker.run();
        })
        .context("Failed to spawn dense mapping thread")
}
